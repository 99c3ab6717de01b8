//! Which connection speaks for which player.
//!
//! Session actors only know player indices. To deliver an event they ask
//! the registry for the player's outbound channel; the connection handler
//! on the other end writes it to the socket.

use std::collections::HashMap;

use broadside_protocol::{Frame, PlayerIndex};
use broadside_transport::ConnectionId;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

/// Channel for delivering frames to one player's connection handler.
pub type PlayerSender = mpsc::UnboundedSender<Frame>;

#[derive(Default)]
struct Bindings {
    by_connection: HashMap<ConnectionId, (PlayerIndex, PlayerSender)>,
    by_player: HashMap<PlayerIndex, ConnectionId>,
}

/// Two-way map between live connections and players.
///
/// A player is bound to at most one connection: registering again from a
/// new connection takes over, and the old connection stops receiving.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Bindings>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `conn` to `player`.
    pub async fn register(&self, conn: ConnectionId, player: PlayerIndex, sender: PlayerSender) {
        let mut inner = self.inner.write().await;
        if let Some(previous) = inner.by_player.insert(player, conn) {
            if previous != conn {
                inner.by_connection.remove(&previous);
                info!(%player, old = %previous, new = %conn, "player moved to new connection");
            }
        }
        inner.by_connection.insert(conn, (player, sender));
        debug!(%conn, %player, "connection registered");
    }

    /// Drops `conn`. Returns the player it was bound to.
    pub async fn unregister(&self, conn: ConnectionId) -> Option<PlayerIndex> {
        let mut inner = self.inner.write().await;
        let (player, _) = inner.by_connection.remove(&conn)?;
        if inner.by_player.get(&player) == Some(&conn) {
            inner.by_player.remove(&player);
        }
        debug!(%conn, %player, "connection unregistered");
        Some(player)
    }

    /// The outbound channel of `player`'s current connection.
    pub async fn find_connection_for_player(&self, player: PlayerIndex) -> Option<PlayerSender> {
        let inner = self.inner.read().await;
        let conn = inner.by_player.get(&player)?;
        inner
            .by_connection
            .get(conn)
            .map(|(_, sender)| sender.clone())
    }

    /// The player bound to `conn`.
    pub async fn current_player_for(&self, conn: ConnectionId) -> Option<PlayerIndex> {
        let inner = self.inner.read().await;
        inner.by_connection.get(&conn).map(|(player, _)| *player)
    }

    /// Sends `frame` to `player` if they are connected. Returns whether it
    /// was handed to a live connection.
    pub async fn send_to(&self, player: PlayerIndex, frame: Frame) -> bool {
        match self.find_connection_for_player(player).await {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Number of bound connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_connection.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
