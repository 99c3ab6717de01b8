//! # Broadside
//!
//! An authoritative Battleship server for browser clients.
//!
//! Clients connect over WebSocket, identify themselves with a handshake,
//! and then ask for a game against the bot or a quick match against
//! another player. Every game runs in its own session actor (see
//! [`broadside_session`]); this crate wires those actors to the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use broadside::prelude::*;
//!
//! # async fn run() -> Result<(), BroadsideError> {
//! broadside::init_tracing();
//!
//! let server = BroadsideServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(GuestAuthenticator::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod error;
mod handler;
mod server;

pub use auth::{AuthError, Authenticator, GuestAuthenticator};
pub use error::BroadsideError;
pub use server::{BroadsideServer, BroadsideServerBuilder, HANDSHAKE_TIMEOUT};

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that honours `RUST_LOG`, falling back to
/// `info`. Safe to call more than once; later calls do nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything a server binary or client test usually needs.
pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, BroadsideError, BroadsideServer, BroadsideServerBuilder,
        GuestAuthenticator,
    };
    pub use broadside_engine::{AttackStatus, Position, RawShip, Ship, ShipKind};
    pub use broadside_protocol::{Codec, Frame, GameId, JsonCodec, PlayerIndex, SystemMessage};
    pub use broadside_session::{ClientAction, ServerEvent, SessionConfig, SessionError};
}
