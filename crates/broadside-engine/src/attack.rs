//! Resolving a single shot.

use broadside_protocol::PlayerIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::EngineError;
use crate::board::{Board, Cell};
use crate::ship::{Position, ShipSet};

/// Result class of one attack, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackStatus {
    Miss,
    Shot,
    Killed,
}

/// What happened when `attacker` fired at `position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub position: Position,
    pub status: AttackStatus,
    pub game_over: bool,
    pub winner: Option<PlayerIndex>,
}

impl AttackOutcome {
    /// Whether the attacker keeps the turn. Only a miss hands it over.
    pub fn keeps_turn(&self) -> bool {
        self.status != AttackStatus::Miss
    }
}

/// Fires `attacker`'s shot at `target`.
///
/// The enemy fleet is the first one in `fleets` not owned by `attacker`.
/// Ships are scanned in order and the first one covering `target` takes the
/// hit. Sinking a ship floods its empty neighbours with `Miss`, and sinking
/// the last ship of a non-empty fleet ends the game.
///
/// # Errors
/// - [`EngineError::OutOfBounds`] if `target` is off the board.
/// - [`EngineError::MissingEnemyFleet`] if no fleet other than the
///   attacker's has been submitted.
pub fn process_attack(
    board: &mut Board,
    fleets: &mut [ShipSet],
    attacker: PlayerIndex,
    target: Position,
) -> Result<AttackOutcome, EngineError> {
    if !target.is_valid() {
        return Err(EngineError::OutOfBounds(target));
    }

    let enemy = fleets
        .iter_mut()
        .find(|set| set.player != attacker)
        .ok_or(EngineError::MissingEnemyFleet { attacker })?;

    let mut outcome = AttackOutcome {
        position: target,
        status: AttackStatus::Miss,
        game_over: false,
        winner: None,
    };

    let Some(ship) = enemy.ships.iter_mut().find(|ship| ship.occupies(target)) else {
        board.set(target, Cell::Miss);
        trace!(%attacker, x = target.x, y = target.y, "miss");
        return Ok(outcome);
    };

    board.set(target, Cell::Hit);
    let positions = ship.positions();
    if let Some(index) = positions.iter().position(|p| *p == target) {
        if let Some(flag) = ship.hits.get_mut(index) {
            *flag = true;
        }
    }

    if !ship.is_sunk() {
        outcome.status = AttackStatus::Shot;
        trace!(%attacker, x = target.x, y = target.y, "shot");
        return Ok(outcome);
    }

    outcome.status = AttackStatus::Killed;
    for neighbour in positions.iter().flat_map(|p| p.neighborhood()) {
        if board.get(neighbour) == Some(Cell::Empty) {
            board.set(neighbour, Cell::Miss);
        }
    }
    debug!(%attacker, kind = ?ship.kind, x = target.x, y = target.y, "ship sunk");

    if enemy.is_defeated() {
        outcome.game_over = true;
        outcome.winner = Some(attacker);
        debug!(winner = %attacker, loser = %enemy.player, "fleet destroyed");
    }

    Ok(outcome)
}
