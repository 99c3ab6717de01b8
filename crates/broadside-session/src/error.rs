//! Error types for the session layer.
//!
//! The `Display` text of each variant is what the player sees in the
//! `error` frame, so it is short and human-readable. Details stay in the
//! fields for logging.

use broadside_engine::{EngineError, FleetViolation, Position};
use broadside_protocol::{GameId, PlayerIndex};

use crate::GameStatus;

/// Errors that can occur during session operations.
///
/// None of these are fatal. Each one is reported back to the connection
/// that caused it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Game not found")]
    SessionNotFound(GameId),

    #[error("Not your turn")]
    NotYourTurn {
        expected: PlayerIndex,
        got: PlayerIndex,
    },

    /// The action is not valid in the game's current status, e.g. shooting
    /// before both fleets are placed.
    #[error("Action not allowed while the game is {0}")]
    InvalidState(GameStatus),

    #[error("Ships already placed")]
    FleetAlreadySubmitted(PlayerIndex),

    #[error("Player not in this game")]
    NotInGame(PlayerIndex),

    #[error("Target ({}, {}) is outside the board", .0.x, .0.y)]
    InvalidTarget(Position),

    /// Only raised when strict fleet checking is enabled.
    #[error("Invalid fleet: {0}")]
    InvalidFleet(#[from] FleetViolation),

    /// The session actor has stopped or its channel is closed.
    #[error("Game {0} is unavailable")]
    Unavailable(GameId),

    /// An engine invariant was broken. Logged at error level.
    #[error("Internal game error")]
    Engine(#[from] EngineError),
}
