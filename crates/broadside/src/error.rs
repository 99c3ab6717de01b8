//! Unified error type for the Broadside server.

use broadside_engine::EngineError;
use broadside_protocol::ProtocolError;
use broadside_session::SessionError;
use broadside_transport::TransportError;

use crate::AuthError;

/// Top-level error wrapping every crate-specific error, so `?` works
/// across layers.
#[derive(Debug, thiserror::Error)]
pub enum BroadsideError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
