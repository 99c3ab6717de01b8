//! Authentication hook for mapping a handshake token to a player.
//!
//! Broadside does not keep accounts. The server calls an [`Authenticator`]
//! once per connection with the token from the `handshake` frame and binds
//! the connection to the [`PlayerIndex`] it returns.

use std::sync::atomic::{AtomicI64, Ordering};

use broadside_protocol::PlayerIndex;

/// A rejected handshake token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("authentication failed: {0}")]
pub struct AuthError(pub String);

/// Validates a client's token and returns their identity.
///
/// # Example
///
/// ```rust
/// use broadside::{AuthError, Authenticator};
/// use broadside_protocol::PlayerIndex;
///
/// /// Uses the token itself as the player index.
/// struct NumericToken;
///
/// impl Authenticator for NumericToken {
///     async fn authenticate(&self, token: Option<&str>) -> Result<PlayerIndex, AuthError> {
///         let id: i64 = token
///             .unwrap_or_default()
///             .parse()
///             .map_err(|_| AuthError("token must be a number".into()))?;
///         if id < 0 {
///             return Err(AuthError("negative indices are reserved".into()));
///         }
///         Ok(PlayerIndex(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the player for `token`. Must never return
    /// [`PlayerIndex::BOT`].
    fn authenticate(
        &self,
        token: Option<&str>,
    ) -> impl std::future::Future<Output = Result<PlayerIndex, AuthError>> + Send;
}

/// Hands every connection the next free index, ignoring the token.
///
/// Indices start at 0, so the first two guests are players 0 and 1.
#[derive(Debug, Default)]
pub struct GuestAuthenticator {
    next: AtomicI64,
}

impl GuestAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Authenticator for GuestAuthenticator {
    async fn authenticate(&self, _token: Option<&str>) -> Result<PlayerIndex, AuthError> {
        Ok(PlayerIndex(self.next.fetch_add(1, Ordering::Relaxed)))
    }
}
