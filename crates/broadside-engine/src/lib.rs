//! Game rules for Broadside.
//!
//! Everything in this crate is synchronous and deterministic given an RNG:
//!
//! - [`ship`]: positions, ship classes, fleets.
//! - [`board`]: the 10×10 attack log and per-player views of it.
//! - [`attack`]: resolving one shot against the enemy fleet.
//! - [`placement`]: normalizing client-submitted fleets.
//! - [`bot`]: random targets and random non-touching fleets.
//!
//! Timing, turn order, and notifications live one layer up, in
//! `broadside-session`.

pub mod attack;
pub mod board;
pub mod bot;
mod error;
pub mod placement;
pub mod ship;

pub use attack::{AttackOutcome, AttackStatus, process_attack};
pub use board::{BOARD_SIZE, Board, Cell};
pub use bot::{generate_bot_ships, random_attack_position, random_coordinates};
pub use error::EngineError;
pub use placement::{FleetViolation, RawShip, check_fleet, validate_ships};
pub use ship::{Position, Ship, ShipKind, ShipSet, is_valid_position};
