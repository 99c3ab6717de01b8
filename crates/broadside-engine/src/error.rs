use broadside_protocol::PlayerIndex;

use crate::ship::Position;

/// Errors raised by the rules engine.
///
/// Both variants describe calls the session layer should never make:
/// attacks are only accepted once both fleets exist, and targets are
/// bounds-checked before they get here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no enemy fleet for attacker {attacker}")]
    MissingEnemyFleet { attacker: PlayerIndex },

    #[error("target ({}, {}) is outside the board", .0.x, .0.y)]
    OutOfBounds(Position),
}
