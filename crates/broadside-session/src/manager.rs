//! Session manager: creates, tracks, routes to, and reclaims sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use broadside_engine::{ShipSet, generate_bot_ships};
use broadside_protocol::{GameId, PlayerIndex, SystemMessage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::actor::spawn_session;
use crate::{
    ClientAction, ConnectionRegistry, Game, SessionConfig, SessionError, SessionHandle,
    SessionInfo,
};

/// Counter for generating unique game IDs.
static NEXT_GAME_ID: AtomicU64 = AtomicU64::new(1);

/// Owns every running session.
///
/// This is the entry point for session operations from the server layer.
pub struct SessionManager {
    sessions: HashMap<GameId, SessionHandle>,
    /// Player parked by [`SessionManager::quick_match`].
    waiting: Option<PlayerIndex>,
    registry: Arc<ConnectionRegistry>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            sessions: HashMap::new(),
            waiting: None,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    fn next_id() -> GameId {
        GameId(NEXT_GAME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// A fresh RNG for one session: derived from the configured seed and the
    /// game id when seeded, from the OS otherwise.
    fn session_rng(&self, id: GameId) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ id.0.rotate_left(32)),
            None => StdRng::from_os_rng(),
        }
    }

    fn spawn(&mut self, game: Game, rng: StdRng) -> GameId {
        let id = game.id;
        let handle = spawn_session(game, self.config.clone(), rng, Arc::clone(&self.registry));
        self.sessions.insert(id, handle);
        id
    }

    /// Starts a two-player game. Both sides still have to submit fleets.
    pub fn create_game(&mut self, players: [PlayerIndex; 2]) -> GameId {
        let id = Self::next_id();
        let rng = self.session_rng(id);
        self.spawn(Game::new(id, players), rng);
        info!(game_id = %id, first = %players[0], second = %players[1], "game created");
        id
    }

    /// Starts a game against the bot, whose fleet is generated up front.
    pub fn create_single_player_game(&mut self, player: PlayerIndex) -> GameId {
        let id = Self::next_id();
        let mut rng = self.session_rng(id);
        let bot_fleet = ShipSet::new(PlayerIndex::BOT, generate_bot_ships(&mut rng));
        self.spawn(Game::single_player(id, player, bot_fleet), rng);
        info!(game_id = %id, %player, "single-player game created");
        id
    }

    /// Pairs `player` with the player already waiting, or parks them.
    ///
    /// On a match the parked player is told about the new game directly
    /// through the registry; the caller gets the id back and replies to its
    /// own connection. Returns `None` when `player` was parked.
    pub async fn quick_match(&mut self, player: PlayerIndex) -> Option<GameId> {
        let opponent = match self.waiting.take() {
            Some(waiting) if waiting != player => waiting,
            _ => {
                self.waiting = Some(player);
                debug!(%player, "waiting for a quick match");
                return None;
            }
        };

        let id = self.create_game([opponent, player]);
        let notice = SystemMessage::CreateGame {
            id_game: id,
            id_player: opponent,
        };
        match notice.to_frame(0) {
            Ok(frame) => {
                if !self.registry.send_to(opponent, frame).await {
                    warn!(game_id = %id, %opponent, "matched player is no longer connected");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode create_game"),
        }
        Some(id)
    }

    /// Forgets `player` if they are parked for a quick match.
    pub fn leave_queue(&mut self, player: PlayerIndex) {
        if self.waiting == Some(player) {
            self.waiting = None;
            debug!(%player, "left the quick-match queue");
        }
    }

    /// The player currently parked for a quick match.
    pub fn waiting_player(&self) -> Option<PlayerIndex> {
        self.waiting
    }

    /// Handle to a session, for callers that want to talk to it without
    /// holding the manager.
    pub fn handle(&self, id: GameId) -> Option<SessionHandle> {
        self.sessions.get(&id).cloned()
    }

    /// Forwards `action` to the session named by its game id.
    pub async fn route(
        &self,
        player: PlayerIndex,
        action: ClientAction,
    ) -> Result<(), SessionError> {
        let id = action.game_id();
        let handle = self
            .sessions
            .get(&id)
            .ok_or(SessionError::SessionNotFound(id))?;
        handle.submit(player, action).await
    }

    pub async fn info(&self, id: GameId) -> Result<SessionInfo, SessionError> {
        let handle = self
            .sessions
            .get(&id)
            .ok_or(SessionError::SessionNotFound(id))?;
        handle.info().await
    }

    /// Shuts down and removes a session.
    pub async fn destroy_game(&mut self, id: GameId) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .remove(&id)
            .ok_or(SessionError::SessionNotFound(id))?;
        let _ = handle.shutdown().await;
        info!(game_id = %id, "game destroyed");
        Ok(())
    }

    /// Reclaims sessions idle for longer than `stale_after`, and sessions
    /// whose actor has already gone. Returns the ids removed.
    ///
    /// Holds `&mut self` while every actor is queried. A manager shared
    /// behind a lock should use [`snapshot`](Self::snapshot),
    /// [`find_stale`](Self::find_stale) and [`detach`](Self::detach) instead.
    pub async fn sweep_stale(&mut self) -> Vec<GameId> {
        let snapshot = self.snapshot();
        let stale = Self::find_stale(&snapshot, self.config.stale_after).await;
        for handle in self.detach(&stale) {
            let _ = handle.shutdown().await;
        }
        stale
    }

    /// Copies out every session handle so the actors can be queried without
    /// the manager.
    pub fn snapshot(&self) -> Vec<(GameId, SessionHandle)> {
        self.sessions
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    /// Returns the ids in `sessions` idle for at least `stale_after`, or
    /// whose actor no longer answers.
    pub async fn find_stale(
        sessions: &[(GameId, SessionHandle)],
        stale_after: Duration,
    ) -> Vec<GameId> {
        let mut stale = Vec::new();
        for (id, handle) in sessions {
            match handle.info().await {
                Ok(info) if info.idle_for < stale_after => {}
                Ok(info) => {
                    debug!(game_id = %id, idle_secs = info.idle_for.as_secs(), "session is stale");
                    stale.push(*id);
                }
                Err(_) => stale.push(*id),
            }
        }
        stale
    }

    /// Removes `ids` from the manager and hands back their handles, so the
    /// caller can shut the actors down after releasing the manager.
    pub fn detach(&mut self, ids: &[GameId]) -> Vec<SessionHandle> {
        let detached: Vec<SessionHandle> =
            ids.iter().filter_map(|id| self.sessions.remove(id)).collect();
        if !detached.is_empty() {
            info!(
                removed = detached.len(),
                remaining = self.sessions.len(),
                "stale sessions swept"
            );
        }
        detached
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        self.sessions.keys().copied().collect()
    }
}
