//! Normalizing client-submitted fleets.
//!
//! [`validate_ships`] is deliberately forgiving: it clamps every ship onto
//! the board and never rejects anything. [`check_fleet`] is the strict
//! counterpart, used only when a server opts into rejecting bad fleets.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::board::BOARD_SIZE;
use crate::ship::{Position, Ship, ShipKind};

/// Longest ship a client may submit.
pub const MAX_SHIP_LENGTH: i64 = 4;

/// A ship exactly as the client sent it.
///
/// `direction` is in the client's sense, which is the inverse of
/// [`Ship::direction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawShip {
    pub position: Position,
    pub direction: bool,
    pub length: i64,
    #[serde(rename = "type")]
    pub kind: ShipKind,
}

/// Turns client ships into in-bounds [`Ship`]s.
///
/// For each ship: clamp the anchor into `[0, 9]`, flip the direction flag,
/// clamp the length into `[1, 4]`, pull the anchor back to `10 - length`
/// if the ship would run off the board, and reset all hits. Overlap and
/// fleet composition are not checked.
pub fn validate_ships(raw: &[RawShip]) -> Vec<Ship> {
    let max = BOARD_SIZE as i64;
    raw.iter()
        .map(|ship| {
            let mut position = Position::new(
                ship.position.x.clamp(0, max - 1),
                ship.position.y.clamp(0, max - 1),
            );
            let direction = !ship.direction;
            let length = ship.length.clamp(1, MAX_SHIP_LENGTH);

            if direction {
                if position.x + length > max {
                    position.x = max - length;
                }
            } else if position.y + length > max {
                position.y = max - length;
            }

            trace!(
                kind = ?ship.kind,
                from_x = ship.position.x,
                from_y = ship.position.y,
                x = position.x,
                y = position.y,
                horizontal = direction,
                length,
                "ship normalized"
            );

            Ship {
                position,
                direction,
                length: length as usize,
                kind: ship.kind,
                hits: vec![false; length as usize],
            }
        })
        .collect()
}

/// Why a fleet was refused by [`check_fleet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FleetViolation {
    #[error("expected {expected} {kind:?} ships, found {found}")]
    Composition {
        kind: ShipKind,
        expected: usize,
        found: usize,
    },

    #[error("ship {index} is a {kind:?} but has length {length}")]
    Length {
        index: usize,
        kind: ShipKind,
        length: usize,
    },

    #[error("ship {index} does not fit on the board")]
    OffBoard { index: usize },

    #[error("ships {first} and {second} overlap or touch")]
    Touching { first: usize, second: usize },
}

/// Checks that `ships` form a standard fleet: the right count of every
/// class, each ship the length of its class, fully on the board, and no two
/// ships sharing or touching a cell.
///
/// # Errors
/// Returns the first [`FleetViolation`] found.
pub fn check_fleet(ships: &[Ship]) -> Result<(), FleetViolation> {
    for kind in ShipKind::ALL {
        let found = ships.iter().filter(|s| s.kind == kind).count();
        if found != kind.count() {
            return Err(FleetViolation::Composition {
                kind,
                expected: kind.count(),
                found,
            });
        }
    }

    for (index, ship) in ships.iter().enumerate() {
        if ship.length != ship.kind.length() {
            return Err(FleetViolation::Length {
                index,
                kind: ship.kind,
                length: ship.length,
            });
        }
        if ship.positions().len() != ship.length {
            return Err(FleetViolation::OffBoard { index });
        }
    }

    for (first, a) in ships.iter().enumerate() {
        let halo: Vec<Position> = a
            .positions()
            .into_iter()
            .flat_map(Position::neighborhood)
            .collect();
        for (second, b) in ships.iter().enumerate().skip(first + 1) {
            if b.positions().iter().any(|p| halo.contains(p)) {
                return Err(FleetViolation::Touching { first, second });
            }
        }
    }

    Ok(())
}
