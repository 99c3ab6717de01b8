use std::sync::Arc;
use std::time::Duration;

use broadside_engine::{AttackStatus, Position, RawShip, ShipKind};
use broadside_protocol::{Frame, GameId, PlayerIndex, SystemMessage};
use broadside_session::{
    ClientAction, ConnectionRegistry, GameStatus, ServerEvent, SessionConfig, SessionError,
    SessionManager,
};
use broadside_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::time::Instant;

const A: PlayerIndex = PlayerIndex(3);
const B: PlayerIndex = PlayerIndex(4);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn manager() -> (SessionManager, Arc<ConnectionRegistry>) {
    let registry = Arc::new(ConnectionRegistry::new());
    let config = SessionConfig {
        seed: Some(7),
        ..SessionConfig::default()
    };
    (SessionManager::new(config, Arc::clone(&registry)), registry)
}

async fn connect(
    registry: &ConnectionRegistry,
    player: PlayerIndex,
) -> mpsc::UnboundedReceiver<Frame> {
    let (tx, rx) = mpsc::unbounded_channel();
    registry
        .register(ConnectionId::new(player.0 as u64), player, tx)
        .await;
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Frame>) -> ServerEvent {
    let frame = rx.recv().await.expect("connection channel closed");
    ServerEvent::from_frame(&frame).expect("frame is a server event")
}

fn one_small_ship(x: i64, y: i64) -> Vec<RawShip> {
    vec![RawShip {
        position: Position::new(x, y),
        direction: false,
        length: 1,
        kind: ShipKind::Small,
    }]
}

fn add_ships(game_id: GameId, ships: Vec<RawShip>) -> ClientAction {
    ClientAction::AddShips { game_id, ships }
}

/// Creates an A-vs-B game where each side has one small ship: A at (0, 0),
/// B at (9, 9). Returns the id and the player who moves first.
async fn started_duel(
    manager: &mut SessionManager,
    rx_a: &mut mpsc::UnboundedReceiver<Frame>,
    rx_b: &mut mpsc::UnboundedReceiver<Frame>,
) -> (GameId, PlayerIndex) {
    let id = manager.create_game([A, B]);
    manager.route(A, add_ships(id, one_small_ship(0, 0))).await.unwrap();
    assert_eq!(next_event(rx_a).await, ServerEvent::wait_for_opponent());

    manager.route(B, add_ships(id, one_small_ship(9, 9))).await.unwrap();
    let ServerEvent::StartGame {
        current_player_index: first,
        ..
    } = next_event(rx_a).await
    else {
        panic!("expected start_game for A");
    };
    assert!(matches!(next_event(rx_b).await, ServerEvent::StartGame { .. }));
    assert_eq!(next_event(rx_a).await, ServerEvent::Turn { current_player: first });
    assert_eq!(next_event(rx_b).await, ServerEvent::Turn { current_player: first });
    (id, first)
}

fn other(player: PlayerIndex) -> PlayerIndex {
    if player == A { B } else { A }
}

// ===========================================================================
// Two-player games
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_game_carries_own_fleet_only() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;
    let mut rx_b = connect(&registry, B).await;

    let id = manager.create_game([A, B]);
    manager.route(A, add_ships(id, one_small_ship(0, 0))).await.unwrap();
    let _wait = next_event(&mut rx_a).await;
    manager.route(B, add_ships(id, one_small_ship(9, 9))).await.unwrap();

    let ServerEvent::StartGame { ships, .. } = next_event(&mut rx_b).await else {
        panic!("expected start_game");
    };
    assert_eq!(ships.len(), 1);
    assert_eq!(ships[0].position, Position::new(9, 9));
    // Client `false` is horizontal on the server.
    assert!(ships[0].direction);
}

#[tokio::test(start_paused = true)]
async fn test_sinking_last_ship_finishes_and_freezes_game() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;
    let mut rx_b = connect(&registry, B).await;
    let (id, first) = started_duel(&mut manager, &mut rx_a, &mut rx_b).await;

    let target = if first == B {
        Position::new(0, 0)
    } else {
        Position::new(9, 9)
    };
    manager
        .route(first, ClientAction::Attack {
            game_id: id,
            x: target.x,
            y: target.y,
        })
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        assert_eq!(
            next_event(rx).await,
            ServerEvent::Attack {
                position: target,
                current_player: first,
                status: AttackStatus::Killed,
            }
        );
        assert_eq!(next_event(rx).await, ServerEvent::Finish { win_player: first });
    }

    let info = manager.info(id).await.unwrap();
    assert_eq!(info.status, GameStatus::Finished);
    assert_eq!(info.winner, Some(first));
    assert!(!info.timer_armed);

    // Anything after the finish is a silent no-op.
    manager
        .route(other(first), ClientAction::Attack { game_id: id, x: 5, y: 5 })
        .await
        .unwrap();
    manager
        .route(first, ClientAction::RandomAttack { game_id: id })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_miss_passes_turn_and_marks_board() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;
    let mut rx_b = connect(&registry, B).await;
    let (id, first) = started_duel(&mut manager, &mut rx_a, &mut rx_b).await;

    manager
        .route(first, ClientAction::Attack { game_id: id, x: 5, y: 5 })
        .await
        .unwrap();

    let next = other(first);
    assert_eq!(
        next_event(&mut rx_a).await,
        ServerEvent::Attack {
            position: Position::new(5, 5),
            current_player: next,
            status: AttackStatus::Miss,
        }
    );
    assert_eq!(next_event(&mut rx_a).await, ServerEvent::Turn { current_player: next });

    let view = manager.handle(id).unwrap().view(first).await.unwrap();
    assert_eq!(view.current_player, next);
    assert_eq!(
        view.board.get(Position::new(5, 5)),
        Some(broadside_engine::Cell::Miss)
    );
}

#[tokio::test(start_paused = true)]
async fn test_out_of_turn_attack_is_rejected() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;
    let mut rx_b = connect(&registry, B).await;
    let (id, first) = started_duel(&mut manager, &mut rx_a, &mut rx_b).await;

    let result = manager
        .route(other(first), ClientAction::Attack { game_id: id, x: 1, y: 1 })
        .await;
    assert_eq!(
        result,
        Err(SessionError::NotYourTurn {
            expected: first,
            got: other(first),
        })
    );
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_second_fleet_from_same_player_is_rejected() {
    let (mut manager, registry) = manager();
    let _rx_a = connect(&registry, A).await;

    let id = manager.create_game([A, B]);
    manager.route(A, add_ships(id, one_small_ship(0, 0))).await.unwrap();
    assert_eq!(
        manager.route(A, add_ships(id, one_small_ship(5, 5))).await,
        Err(SessionError::FleetAlreadySubmitted(A))
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_game_is_not_found() {
    let (manager, _registry) = manager();
    assert_eq!(
        manager
            .route(A, ClientAction::RandomAttack { game_id: GameId(999_999) })
            .await,
        Err(SessionError::SessionNotFound(GameId(999_999)))
    );
}

// ===========================================================================
// Turn timer
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_player_gets_one_forced_shot_after_timeout() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;
    let mut rx_b = connect(&registry, B).await;
    let (id, first) = started_duel(&mut manager, &mut rx_a, &mut rx_b).await;

    let started = Instant::now();
    let ServerEvent::Attack { status, .. } = next_event(&mut rx_a).await else {
        panic!("expected a forced attack");
    };
    assert_eq!(started.elapsed(), Duration::from_secs(15));

    let info = manager.info(id).await.unwrap();
    assert_eq!(info.timer.fired, 1);
    if status == AttackStatus::Miss {
        assert_eq!(info.current_player, other(first));
    } else {
        assert_eq!(info.current_player, first);
    }
    // The forced shot re-arms the clock for whoever moves next.
    assert!(info.timer_armed || info.status == GameStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_acting_in_time_resets_the_clock() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;
    let mut rx_b = connect(&registry, B).await;
    let (id, first) = started_duel(&mut manager, &mut rx_a, &mut rx_b).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    manager
        .route(first, ClientAction::Attack { game_id: id, x: 5, y: 5 })
        .await
        .unwrap();
    let _miss = next_event(&mut rx_a).await;
    let _turn = next_event(&mut rx_a).await;

    // The first player's old deadline (5 s away) must not fire.
    let acted = Instant::now();
    let _forced = next_event(&mut rx_a).await;
    assert_eq!(acted.elapsed(), Duration::from_secs(15));

    let info = manager.info(id).await.unwrap();
    assert_eq!(info.timer.fired, 1);
}

// ===========================================================================
// Single-player games
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_bot_moves_on_its_own_after_short_delay() {
    let (mut manager, registry) = manager();
    let mut rx = connect(&registry, A).await;

    let id = manager.create_single_player_game(A);
    manager.route(A, add_ships(id, one_small_ship(0, 0))).await.unwrap();
    let ServerEvent::StartGame { .. } = next_event(&mut rx).await else {
        panic!("expected start_game");
    };

    // Sweep the board in order until the turn passes to the bot.
    let mut sweep = (0..100).map(|i| Position::new(i % 10, i / 10));
    for _ in 0..400 {
        match next_event(&mut rx).await {
            ServerEvent::Turn { current_player } if current_player == A => {
                let target = sweep.next().expect("board swept without a miss");
                manager
                    .route(A, ClientAction::Attack {
                        game_id: id,
                        x: target.x,
                        y: target.y,
                    })
                    .await
                    .unwrap();
            }
            ServerEvent::Turn { current_player } => {
                assert!(current_player.is_bot());
                let waited = Instant::now();
                let ServerEvent::Attack { .. } = next_event(&mut rx).await else {
                    panic!("expected the bot to fire");
                };
                assert_eq!(waited.elapsed(), Duration::from_secs(1));
                return;
            }
            ServerEvent::Finish { .. } => panic!("game ended before the bot moved"),
            _ => {}
        }
    }
    panic!("bot never got the turn");
}

/// Ships covering every cell of the board, so any shot at this fleet hits.
fn fleet_covering_board() -> Vec<RawShip> {
    let mut ships = Vec::new();
    for y in 0..10 {
        let row = [
            (0, 4, ShipKind::Huge),
            (4, 4, ShipKind::Huge),
            (8, 2, ShipKind::Medium),
        ];
        for (x, length, kind) in row {
            ships.push(RawShip {
                position: Position::new(x, y),
                // Client sense: `false` is horizontal.
                direction: false,
                length,
                kind,
            });
        }
    }
    ships
}

#[tokio::test(start_paused = true)]
async fn test_bot_fires_again_after_short_delay_on_hit() {
    let (mut manager, registry) = manager();
    let mut rx = connect(&registry, A).await;

    let id = manager.create_single_player_game(A);
    manager.route(A, add_ships(id, fleet_covering_board())).await.unwrap();
    let ServerEvent::StartGame { .. } = next_event(&mut rx).await else {
        panic!("expected start_game");
    };

    // Sweep the board in order until the turn passes to the bot.
    let mut sweep = (0..100).map(|i| Position::new(i % 10, i / 10));
    let mut bot_to_move = false;
    let mut first_bot_shot = None;
    for _ in 0..400 {
        match next_event(&mut rx).await {
            ServerEvent::Turn { current_player } if current_player == A => {
                let target = sweep.next().expect("board swept without a miss");
                manager
                    .route(A, ClientAction::Attack {
                        game_id: id,
                        x: target.x,
                        y: target.y,
                    })
                    .await
                    .unwrap();
            }
            ServerEvent::Turn { .. } => bot_to_move = true,
            ServerEvent::Attack { status, .. } if bot_to_move => match first_bot_shot {
                None => {
                    // Every cell left is one of A's, so the bot hits and keeps the turn.
                    assert_ne!(status, AttackStatus::Miss);
                    first_bot_shot = Some(Instant::now());
                }
                Some(first) => {
                    assert_eq!(first.elapsed(), Duration::from_secs(1));
                    return;
                }
            },
            ServerEvent::Finish { .. } => panic!("game ended before the bot fired twice"),
            _ => {}
        }
    }
    panic!("bot never fired twice");
}

#[tokio::test(start_paused = true)]
async fn test_bot_fleet_is_a_full_legal_fleet() {
    let (mut manager, registry) = manager();
    let _rx = connect(&registry, A).await;

    let id = manager.create_single_player_game(A);
    let info = manager.info(id).await.unwrap();
    assert_eq!(info.players, [A, PlayerIndex::BOT]);
    assert_eq!(info.status, GameStatus::Waiting);

    // The bot's fleet is already in, so one human fleet starts the game.
    manager.route(A, add_ships(id, one_small_ship(0, 0))).await.unwrap();
    assert_eq!(manager.info(id).await.unwrap().status, GameStatus::Playing);
}

// ===========================================================================
// Matchmaking and cleanup
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_quick_match_pairs_and_notifies_waiting_player() {
    let (mut manager, registry) = manager();
    let mut rx_a = connect(&registry, A).await;

    assert_eq!(manager.quick_match(A).await, None);
    // Asking again while parked changes nothing.
    assert_eq!(manager.quick_match(A).await, None);
    assert_eq!(manager.waiting_player(), Some(A));

    let id = manager.quick_match(B).await.expect("B is paired with A");
    assert_eq!(manager.waiting_player(), None);
    assert_eq!(manager.session_count(), 1);

    let frame = rx_a.try_recv().expect("A is told about the game");
    assert_eq!(
        SystemMessage::from_frame(&frame).unwrap(),
        Some(SystemMessage::CreateGame {
            id_game: id,
            id_player: A,
        })
    );
    assert_eq!(manager.info(id).await.unwrap().players, [A, B]);
}

#[tokio::test(start_paused = true)]
async fn test_leave_queue_unparks_player() {
    let (mut manager, _registry) = manager();
    assert_eq!(manager.quick_match(A).await, None);
    manager.leave_queue(B);
    assert_eq!(manager.waiting_player(), Some(A));
    manager.leave_queue(A);
    assert_eq!(manager.waiting_player(), None);
    assert_eq!(manager.quick_match(B).await, None);
    assert_eq!(manager.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_stale_reclaims_idle_sessions() {
    let (mut manager, _registry) = manager();
    let old = manager.create_game([A, B]);

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    let fresh = manager.create_game([PlayerIndex(5), PlayerIndex(6)]);
    assert!(manager.sweep_stale().await.is_empty());

    tokio::time::sleep(Duration::from_secs(11 * 60)).await;
    assert_eq!(manager.sweep_stale().await, vec![old]);
    assert_eq!(manager.game_ids(), vec![fresh]);
    assert_eq!(
        manager.info(old).await.unwrap_err(),
        SessionError::SessionNotFound(old)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_sessions_found_from_snapshot_without_manager() {
    let (mut manager, _registry) = manager();
    let old = manager.create_game([A, B]);
    tokio::time::sleep(Duration::from_secs(31 * 60)).await;

    let snapshot = manager.snapshot();
    let stale_after = manager.config().stale_after;

    // The manager stays usable while the actors are queried.
    let query =
        tokio::spawn(async move { SessionManager::find_stale(&snapshot, stale_after).await });
    let fresh = manager.create_game([PlayerIndex(5), PlayerIndex(6)]);
    assert!(manager.handle(old).is_some());
    let stale = query.await.unwrap();
    assert_eq!(stale, vec![old]);

    let detached = manager.detach(&stale);
    assert_eq!(detached.len(), 1);
    assert_eq!(manager.game_ids(), vec![fresh]);
    detached[0].shutdown().await.unwrap();
    assert_eq!(detached[0].info().await.unwrap_err(), SessionError::Unavailable(old));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_game_stops_actor() {
    let (mut manager, _registry) = manager();
    let id = manager.create_game([A, B]);
    let handle = manager.handle(id).unwrap();

    manager.destroy_game(id).await.unwrap();
    assert_eq!(manager.session_count(), 0);
    assert_eq!(handle.info().await.unwrap_err(), SessionError::Unavailable(id));
    assert_eq!(
        manager.destroy_game(id).await,
        Err(SessionError::SessionNotFound(id))
    );
}
