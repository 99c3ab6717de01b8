//! Session actor: an isolated Tokio task that owns one game.
//!
//! The actor is the only owner of its [`Game`], [`TurnTimer`], and RNG.
//! Commands arrive over a bounded channel and timer fires arrive through
//! the same `select!`, so each one runs to completion, notifications
//! included, before the next is looked at.

use std::sync::Arc;
use std::time::Duration;

use broadside_engine::Position;
use broadside_protocol::{GameId, PlayerIndex, Recipient};
use broadside_timer::{TimerStats, TurnTimer};
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{
    ClientAction, ConnectionRegistry, Game, GameStatus, GameType, GameView, Schedule,
    ServerEvent, SessionConfig, SessionError, Step, TimerAction,
};

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    /// A player action. The reply carries the gating error, if any.
    Action {
        player: PlayerIndex,
        action: ClientAction,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    View {
        player: PlayerIndex,
        reply: oneshot::Sender<GameView>,
    },

    Info {
        reply: oneshot::Sender<SessionInfo>,
    },

    Shutdown,
}

/// A snapshot of session metadata.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub game_id: GameId,
    pub kind: GameType,
    pub status: GameStatus,
    pub players: [PlayerIndex; 2],
    pub current_player: PlayerIndex,
    pub winner: Option<PlayerIndex>,
    /// Time since the game last changed.
    pub idle_for: Duration,
    pub timer_armed: bool,
    pub timer: TimerStats,
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    game_id: GameId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Delivers `action` from `player` and waits until it has been applied.
    pub async fn submit(
        &self,
        player: PlayerIndex,
        action: ClientAction,
    ) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Action {
                player,
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))?
    }

    /// The board as `player` sees it.
    pub async fn view(&self, player: PlayerIndex) -> Result<GameView, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::View {
                player,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))
    }

    /// Tells the session to stop. Any pending timer dies with it.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Unavailable(self.game_id))
    }

    /// `true` once the actor task has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor {
    game: Game,
    config: SessionConfig,
    timer: TurnTimer<TimerAction>,
    rng: StdRng,
    registry: Arc<ConnectionRegistry>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        info!(game_id = %self.game.id, kind = ?self.game.kind, "session actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd).await {
                        break;
                    }
                }
                action = self.timer.fired() => {
                    let step = self.game.on_timer(action, &mut self.rng);
                    self.apply(step).await;
                }
            }
        }

        self.timer.cancel();
        info!(game_id = %self.game.id, "session actor stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Action {
                player,
                action,
                reply,
            } => {
                let result = match self.handle_action(player, action) {
                    Ok(step) => {
                        self.apply(step).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            SessionCommand::View { player, reply } => {
                let _ = reply.send(self.game.view_for(player));
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Shutdown => {
                info!(game_id = %self.game.id, "session shutting down");
                return false;
            }
        }
        true
    }

    fn handle_action(
        &mut self,
        player: PlayerIndex,
        action: ClientAction,
    ) -> Result<Step, SessionError> {
        debug!(game_id = %self.game.id, %player, kind = action.kind(), "action received");
        let result = match action {
            ClientAction::AddShips { ships, .. } => self.game.submit_fleet(
                player,
                &ships,
                self.config.reject_invalid_fleets,
                &mut self.rng,
            ),
            ClientAction::Attack { x, y, .. } => self.game.attack(player, Position::new(x, y)),
            ClientAction::RandomAttack { .. } => {
                self.game.random_attack(player, &mut self.rng)
            }
        };
        if let Err(e) = &result {
            match e {
                SessionError::Engine(_) => {
                    error!(game_id = %self.game.id, %player, error = %e, "action failed")
                }
                _ => debug!(game_id = %self.game.id, %player, error = ?e, "action rejected"),
            }
        }
        result
    }

    /// Applies the timer instruction, then delivers the events.
    async fn apply(&mut self, step: Step) {
        match step.schedule {
            Schedule::Keep => {}
            Schedule::TurnTimer(player) => {
                self.timer
                    .arm(self.config.turn_timeout, TimerAction::TurnTimeout(player));
            }
            Schedule::BotMove => {
                self.timer.arm(self.config.bot_delay, TimerAction::BotMove);
            }
            Schedule::Cancel => {
                self.timer.cancel();
            }
        }
        self.dispatch(step.events).await;
    }

    /// Delivers each event to every human participant it addresses.
    async fn dispatch(&self, events: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in events {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(game_id = %self.game.id, error = %e, "failed to encode event");
                    continue;
                }
            };
            for player in self.game.players {
                if player.is_bot() || !recipient.includes(player) {
                    continue;
                }
                if !self.registry.send_to(player, frame.clone()).await {
                    warn!(
                        game_id = %self.game.id,
                        %player,
                        kind = %frame.kind,
                        "player not connected, event dropped"
                    );
                }
            }
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            game_id: self.game.id,
            kind: self.game.kind,
            status: self.game.status,
            players: self.game.players,
            current_player: self.game.current_player,
            winner: self.game.winner,
            idle_for: self.game.last_update.elapsed(),
            timer_armed: self.timer.is_armed(),
            timer: self.timer.stats(),
        }
    }
}

/// Spawns a session actor for `game` and returns a handle to it.
pub(crate) fn spawn_session(
    game: Game,
    config: SessionConfig,
    rng: StdRng,
    registry: Arc<ConnectionRegistry>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let game_id = game.id;

    let actor = SessionActor {
        game,
        config,
        timer: TurnTimer::new(),
        rng,
        registry,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        game_id,
        sender: tx,
    }
}
