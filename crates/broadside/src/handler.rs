//! Per-connection handler: handshake, registration, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `handshake` → authenticate → send `handshake_ack`
//!   2. Bind the connection to the player in the registry
//!   3. Loop: forward frames pushed by sessions, and route frames from the
//!      client to the server or to a game

use std::sync::Arc;

use broadside_protocol::{Codec, Frame, PlayerIndex, ProtocolError, SystemMessage};
use broadside_session::{ClientAction, SessionError};
use broadside_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::{HANDSHAKE_TIMEOUT, ServerState};
use crate::{Authenticator, BroadsideError};

/// Drop guard that unbinds the connection when the handler exits, even on
/// panic. `Drop` is synchronous, so the async cleanup is spawned.
struct RegistrationGuard<A: Authenticator, C: Codec> {
    conn_id: ConnectionId,
    player: PlayerIndex,
    state: Arc<ServerState<A, C>>,
}

impl<A: Authenticator, C: Codec> Drop for RegistrationGuard<A, C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let player = self.player;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            // Only the connection still bound to the player may drop it
            // from the quick-match queue.
            if state.registry.unregister(conn_id).await.is_some()
                && state.registry.find_connection_for_player(player).await.is_none()
            {
                state.sessions.lock().await.leave_queue(player);
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A: Authenticator, C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), BroadsideError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let player = perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, %player, "player connected");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    state.registry.register(conn_id, player, outbound_tx).await;
    let _guard = RegistrationGuard {
        conn_id,
        player,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%player, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%player, error = %e, "recv error");
                        break;
                    }
                };
                handle_frame(&conn, &state, player, &data).await?;
            }
            pushed = outbound_rx.recv() => {
                let Some(frame) = pushed else {
                    // The registry dropped our sender: the player reconnected
                    // somewhere else.
                    tracing::info!(%conn_id, %player, "connection superseded");
                    let _ = conn.close().await;
                    break;
                };
                send_frame(&conn, &state.codec, &frame).await?;
            }
        }
    }

    Ok(())
}

/// Receives the `handshake` frame, authenticates, and acknowledges.
async fn perform_handshake<A: Authenticator, C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C>>,
) -> Result<PlayerIndex, BroadsideError> {
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let frame: Frame = state.codec.decode(&data)?;
    let token = match SystemMessage::from_frame(&frame) {
        Ok(Some(SystemMessage::Handshake { token })) => token,
        _ => {
            send_frame(conn, &state.codec, &Frame::error("expected handshake", frame.id)).await?;
            return Err(ProtocolError::InvalidMessage(
                "first frame must be a handshake".into(),
            )
            .into());
        }
    };

    let player = match state.auth.authenticate(token.as_deref()).await {
        Ok(player) if !player.is_bot() => player,
        Ok(player) => {
            send_frame(conn, &state.codec, &Frame::error("unauthorized", frame.id)).await?;
            return Err(ProtocolError::InvalidMessage(format!(
                "authenticator returned reserved index {player}"
            ))
            .into());
        }
        Err(e) => {
            send_frame(conn, &state.codec, &Frame::error("unauthorized", frame.id)).await?;
            return Err(e.into());
        }
    };

    let ack = SystemMessage::HandshakeAck { id_player: player }.to_frame(frame.id)?;
    send_frame(conn, &state.codec, &ack).await?;
    Ok(player)
}

/// Handles one frame from an identified client.
///
/// Bad frames and game errors are reported back as `error` frames and do
/// not end the connection. Only transport failures do.
async fn handle_frame<A: Authenticator, C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C>>,
    player: PlayerIndex,
    data: &[u8],
) -> Result<(), BroadsideError> {
    let frame: Frame = match state.codec.decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%player, error = %e, "undecodable frame");
            return send_frame(conn, &state.codec, &Frame::error("invalid frame", 0)).await;
        }
    };

    match SystemMessage::from_frame(&frame) {
        Ok(Some(msg)) => return handle_system_message(conn, state, player, msg, frame.id).await,
        Ok(None) => {}
        Err(e) => {
            tracing::debug!(%player, kind = %frame.kind, error = %e, "bad system message");
            return send_frame(conn, &state.codec, &Frame::error(&e.to_string(), frame.id)).await;
        }
    }

    let action = match ClientAction::from_frame(&frame) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!(%player, kind = %frame.kind, error = %e, "unknown action");
            let message = format!("invalid message: {}", frame.kind);
            return send_frame(conn, &state.codec, &Frame::error(&message, frame.id)).await;
        }
    };

    // Release the manager before waiting on the session.
    let game_id = action.game_id();
    let handle = state.sessions.lock().await.handle(game_id);
    let result = match handle {
        Some(handle) => handle.submit(player, action).await,
        None => Err(SessionError::SessionNotFound(game_id)),
    };

    if let Err(e) = result {
        tracing::debug!(%player, game_id = %game_id, error = ?e, "action refused");
        send_frame(conn, &state.codec, &Frame::error(&e.to_string(), frame.id)).await?;
    }
    Ok(())
}

async fn handle_system_message<A: Authenticator, C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C>>,
    player: PlayerIndex,
    msg: SystemMessage,
    request_id: u64,
) -> Result<(), BroadsideError> {
    let created = match msg {
        SystemMessage::SinglePlay => {
            let mut sessions = state.sessions.lock().await;
            Some(sessions.create_single_player_game(player))
        }
        SystemMessage::QuickMatch => state.sessions.lock().await.quick_match(player).await,
        other => {
            tracing::debug!(%player, kind = other.kind(), "ignoring unexpected system message");
            None
        }
    };

    if let Some(id_game) = created {
        let reply = SystemMessage::CreateGame {
            id_game,
            id_player: player,
        }
        .to_frame(request_id)?;
        send_frame(conn, &state.codec, &reply).await?;
    }
    Ok(())
}

async fn send_frame<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    frame: &Frame,
) -> Result<(), BroadsideError> {
    let bytes = codec.encode(frame)?;
    conn.send(&bytes).await?;
    Ok(())
}
