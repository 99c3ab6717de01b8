//! Game sessions for Broadside.
//!
//! Each game runs as an isolated Tokio task (actor) that owns its state,
//! its turn timer, and its RNG. Nothing about a game is shared or locked.
//!
//! # Key types
//!
//! - [`Game`]: the turn state machine. Pure, synchronous, and directly
//!   testable. Every operation returns a [`Step`]: the events to send and
//!   what to do with the timer.
//! - [`SessionHandle`]: send commands to a running session actor.
//! - [`SessionManager`]: creates, routes to, and sweeps sessions.
//! - [`ConnectionRegistry`]: which connection belongs to which player.
//! - [`SessionConfig`]: timeouts, strictness, channel size, seed.

mod actor;
mod config;
mod error;
mod game;
mod manager;
mod messages;
mod registry;

pub use actor::{SessionHandle, SessionInfo};
pub use config::{GameStatus, GameType, SessionConfig};
pub use error::SessionError;
pub use game::{Game, GameView, Schedule, Step, TimerAction};
pub use manager::SessionManager;
pub use messages::{ClientAction, ServerEvent};
pub use registry::{ConnectionRegistry, PlayerSender};
