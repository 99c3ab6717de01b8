//! A ready-to-run Battleship server for browser clients.
//!
//! Every connection is a guest: the handshake token is ignored and players
//! are numbered in connection order. Set `BROADSIDE_BIND` to change the
//! listen address and `RUST_LOG` to change verbosity.

use broadside::prelude::*;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

fn bind_addr() -> String {
    std::env::var("BROADSIDE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string())
}

type DuelServer = BroadsideServer<GuestAuthenticator, JsonCodec>;

async fn build(addr: &str) -> Result<DuelServer, BroadsideError> {
    BroadsideServerBuilder::new()
        .bind(addr)
        .session_config(SessionConfig::default())
        .build(GuestAuthenticator::new())
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    broadside::init_tracing();

    let server = build(&bind_addr()).await?;
    tracing::info!(addr = %server.local_addr()?, "duel server listening");

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start() -> String {
        let server = build("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        addr
    }

    async fn ws(addr: &str) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        ws
    }

    async fn send(ws: &mut Ws, frame: &Frame) {
        let text = serde_json::to_string(frame).unwrap();
        ws.send(Message::Text(text.into())).await.unwrap();
    }

    async fn recv(ws: &mut Ws) -> Frame {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout")
            .unwrap()
            .unwrap();
        serde_json::from_slice(&msg.into_data()).unwrap()
    }

    async fn join_as_guest(ws: &mut Ws) -> PlayerIndex {
        let hs = SystemMessage::Handshake { token: None }.to_frame(0).unwrap();
        send(ws, &hs).await;
        match SystemMessage::from_frame(&recv(ws).await).unwrap() {
            Some(SystemMessage::HandshakeAck { id_player }) => id_player,
            other => panic!("expected handshake_ack, got {other:?}"),
        }
    }

    /// The standard fleet, laid out in rows two apart so nothing touches.
    fn standard_fleet(game_id: GameId) -> Frame {
        let mut ships = Vec::new();
        let mut y = 0;
        for kind in [ShipKind::Huge, ShipKind::Large, ShipKind::Medium, ShipKind::Small] {
            let mut x = 0;
            for _ in 0..kind.count() {
                ships.push(RawShip {
                    position: Position::new(x, y),
                    // Client `false` is horizontal on the server.
                    direction: false,
                    length: kind.length() as i64,
                    kind,
                });
                x += kind.length() as i64 + 1;
            }
            y += 2;
        }
        ClientAction::AddShips { game_id, ships }.to_frame(1).unwrap()
    }

    #[tokio::test]
    async fn test_guests_are_numbered_in_order() {
        let addr = start().await;
        let mut p1 = ws(&addr).await;
        let mut p2 = ws(&addr).await;

        let first = join_as_guest(&mut p1).await;
        let second = join_as_guest(&mut p2).await;
        assert_eq!(second.0, first.0 + 1);
    }

    #[tokio::test]
    async fn test_single_play_with_standard_fleet() {
        let addr = start().await;
        let mut p = ws(&addr).await;
        let me = join_as_guest(&mut p).await;

        send(&mut p, &Frame::empty("single_play", 0)).await;
        let game_id = match SystemMessage::from_frame(&recv(&mut p).await).unwrap() {
            Some(SystemMessage::CreateGame { id_game, id_player }) => {
                assert_eq!(id_player, me);
                id_game
            }
            other => panic!("expected create_game, got {other:?}"),
        };

        send(&mut p, &standard_fleet(game_id)).await;
        match ServerEvent::from_frame(&recv(&mut p).await).unwrap() {
            ServerEvent::StartGame { ships, .. } => {
                assert_eq!(ships.len(), 10);
                assert!(ships.iter().all(|s| s.direction));
            }
            other => panic!("expected start_game, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_random_attack_is_answered() {
        let addr = start().await;
        let mut p = ws(&addr).await;
        let me = join_as_guest(&mut p).await;

        send(&mut p, &Frame::empty("single_play", 0)).await;
        let Some(SystemMessage::CreateGame { id_game, .. }) =
            SystemMessage::from_frame(&recv(&mut p).await).unwrap()
        else {
            panic!("expected create_game");
        };
        send(&mut p, &standard_fleet(id_game)).await;
        let _start = recv(&mut p).await;

        // Wait for our turn; the bot may move first.
        loop {
            if let ServerEvent::Turn { current_player } =
                ServerEvent::from_frame(&recv(&mut p).await).unwrap()
            {
                if current_player == me {
                    break;
                }
            }
        }

        let shot = ClientAction::RandomAttack { game_id: id_game }.to_frame(2).unwrap();
        send(&mut p, &shot).await;
        assert!(matches!(
            ServerEvent::from_frame(&recv(&mut p).await).unwrap(),
            ServerEvent::Attack { .. }
        ));
    }
}
