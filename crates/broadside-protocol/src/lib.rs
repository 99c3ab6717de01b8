//! Wire protocol for Broadside.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Frame`], [`SystemMessage`], [`PlayerIndex`], [`GameId`],
//!   [`Recipient`]): the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw bytes) and the game
//! sessions. It knows nothing about connections or games, only how to turn
//! frames into bytes and back.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame) → Session (ClientAction / ServerEvent)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Frame, GameId, PlayerIndex, Recipient, SystemMessage};
