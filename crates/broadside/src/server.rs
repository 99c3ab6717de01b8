//! `BroadsideServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → registry → sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use broadside_protocol::{Codec, JsonCodec};
use broadside_session::{ConnectionRegistry, SessionConfig, SessionManager};
use broadside_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{Authenticator, BroadsideError, GuestAuthenticator};

/// How long a new connection has to send its `handshake` frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Broadside server.
pub struct BroadsideServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl BroadsideServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind to. Port 0 picks a free one.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and builds the server with `auth`.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<BroadsideServer<A, JsonCodec>, BroadsideError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let registry = Arc::new(ConnectionRegistry::new());

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(
                self.session_config,
                Arc::clone(&registry),
            )),
            registry,
            auth,
            codec: JsonCodec,
        });

        Ok(BroadsideServer { transport, state })
    }
}

impl Default for BroadsideServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Broadside server. Call [`run()`](Self::run) to start serving.
pub struct BroadsideServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl BroadsideServer<GuestAuthenticator, JsonCodec> {
    /// Shorthand for [`BroadsideServerBuilder::new()`]. The authenticator
    /// passed to `build` still decides the server's type.
    pub fn builder() -> BroadsideServerBuilder {
        BroadsideServerBuilder::new()
    }
}

impl<A: Authenticator, C: Codec> BroadsideServer<A, C> {
    pub fn local_addr(&self) -> Result<SocketAddr, BroadsideError> {
        Ok(self.transport.local_addr()?)
    }

    /// Accepts connections until the process ends, spawning a handler task
    /// for each and a background task that sweeps stale sessions.
    pub async fn run(mut self) -> Result<(), BroadsideError> {
        let sweep_every = self.state.sessions.lock().await.config().sweep_interval;
        tokio::spawn(sweep_loop(Arc::clone(&self.state), sweep_every));
        tracing::info!("Broadside server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn sweep_loop<A: Authenticator, C: Codec>(state: Arc<ServerState<A, C>>, every: Duration) {
    let mut interval = tokio::time::interval(every.max(Duration::from_millis(1)));
    interval.tick().await;
    loop {
        interval.tick().await;

        // Query the actors without holding the manager lock.
        let (snapshot, stale_after) = {
            let sessions = state.sessions.lock().await;
            (sessions.snapshot(), sessions.config().stale_after)
        };
        let stale = SessionManager::find_stale(&snapshot, stale_after).await;
        drop(snapshot);
        if stale.is_empty() {
            continue;
        }

        let detached = state.sessions.lock().await.detach(&stale);
        for handle in detached {
            let _ = handle.shutdown().await;
        }
        tracing::debug!(count = stale.len(), "sweep finished");
    }
}
