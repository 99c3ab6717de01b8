//! The turn orchestration state machine.
//!
//! [`Game`] holds everything about one match and decides what happens next.
//! It never touches channels or clocks directly: each operation returns a
//! [`Step`] listing the events to deliver and what the owning actor should
//! do with its turn timer. That keeps every rule here testable without a
//! runtime.

use broadside_engine::{
    AttackOutcome, Board, Position, RawShip, ShipSet, check_fleet, process_attack,
    random_attack_position, validate_ships,
};
use broadside_protocol::{GameId, PlayerIndex, Recipient};
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::{GameStatus, GameType, ServerEvent, SessionError};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// What the turn timer should yield when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// `player` ran out of time.
    TurnTimeout(PlayerIndex),
    /// The bot's thinking pause is over.
    BotMove,
}

/// What the session actor must do with its timer after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Leave the timer as it is.
    Keep,
    /// Arm a fresh turn timeout for this player.
    TurnTimer(PlayerIndex),
    /// Arm the short bot delay.
    BotMove,
    /// The game is over: cancel whatever is pending.
    Cancel,
}

/// Outcome of one game operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub events: Vec<(Recipient, ServerEvent)>,
    pub schedule: Schedule,
}

impl Step {
    /// No events, no timer change.
    pub fn idle() -> Self {
        Self {
            events: Vec::new(),
            schedule: Schedule::Keep,
        }
    }

    fn after_turn(next: PlayerIndex, events: Vec<(Recipient, ServerEvent)>) -> Self {
        let schedule = if next.is_bot() {
            Schedule::BotMove
        } else {
            Schedule::TurnTimer(next)
        };
        Self { events, schedule }
    }
}

/// The board as one player is allowed to see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub board: Board,
    pub current_player: PlayerIndex,
    pub status: GameStatus,
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One match between two sides.
#[derive(Debug, Clone)]
pub struct Game {
    pub id: GameId,
    pub players: [PlayerIndex; 2],
    pub ships: Vec<ShipSet>,
    pub current_player: PlayerIndex,
    /// Attack history shared by both sides.
    pub board: Board,
    pub status: GameStatus,
    pub winner: Option<PlayerIndex>,
    pub last_update: Instant,
    pub kind: GameType,
}

impl Game {
    /// A two-player game waiting for both fleets.
    pub fn new(id: GameId, players: [PlayerIndex; 2]) -> Self {
        Self {
            id,
            players,
            ships: Vec::with_capacity(2),
            current_player: players[0],
            board: Board::new(),
            status: GameStatus::Waiting,
            winner: None,
            last_update: Instant::now(),
            kind: GameType::Multi,
        }
    }

    /// A game against the bot whose fleet is already in place.
    pub fn single_player(id: GameId, player: PlayerIndex, bot_fleet: ShipSet) -> Self {
        let mut game = Self::new(id, [player, PlayerIndex::BOT]);
        game.kind = GameType::Single;
        game.ships.push(bot_fleet);
        game
    }

    /// The participant who is not `player`.
    pub fn opponent_of(&self, player: PlayerIndex) -> PlayerIndex {
        if self.players[0] == player {
            self.players[1]
        } else {
            self.players[0]
        }
    }

    pub fn fleet_of(&self, player: PlayerIndex) -> Option<&ShipSet> {
        self.ships.iter().find(|set| set.player == player)
    }

    /// The board as `player` may see it: their own fleet painted in, the
    /// opponent's hidden.
    pub fn view_for(&self, player: PlayerIndex) -> GameView {
        GameView {
            board: self.board.player_view(self.fleet_of(player)),
            current_player: self.current_player,
            status: self.status,
        }
    }

    fn advance_to(&mut self, target: GameStatus) {
        debug_assert!(self.status.can_transition_to(target));
        if self.status.can_transition_to(target) {
            info!(game_id = %self.id, from = %self.status, to = %target, "game status changed");
            self.status = target;
        }
    }

    // -----------------------------------------------------------------------
    // Fleet submission
    // -----------------------------------------------------------------------

    /// Accepts `player`'s fleet. Starts the game once both fleets are in.
    ///
    /// # Errors
    /// - [`SessionError::InvalidState`] outside `Waiting`.
    /// - [`SessionError::NotInGame`] for a non-participant.
    /// - [`SessionError::FleetAlreadySubmitted`] on a second submission.
    /// - [`SessionError::InvalidFleet`] if `strict` and the fleet is not a
    ///   standard one.
    pub fn submit_fleet<R: Rng + ?Sized>(
        &mut self,
        player: PlayerIndex,
        raw: &[RawShip],
        strict: bool,
        rng: &mut R,
    ) -> Result<Step, SessionError> {
        if self.status != GameStatus::Waiting {
            return Err(SessionError::InvalidState(self.status));
        }
        if !self.players.contains(&player) {
            return Err(SessionError::NotInGame(player));
        }
        if self.fleet_of(player).is_some() {
            return Err(SessionError::FleetAlreadySubmitted(player));
        }

        let ships = validate_ships(raw);
        if strict {
            check_fleet(&ships)?;
        }
        debug!(game_id = %self.id, %player, ships = ships.len(), "fleet submitted");
        self.ships.push(ShipSet::new(player, ships));
        self.last_update = Instant::now();

        let all_ready = self.players.iter().all(|p| self.fleet_of(*p).is_some());
        if !all_ready {
            return Ok(Step {
                events: vec![(Recipient::Player(player), ServerEvent::wait_for_opponent())],
                schedule: Schedule::Keep,
            });
        }

        Ok(self.start(rng))
    }

    fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Step {
        let first = self.players[rng.random_range(0..self.players.len())];
        self.board = Board::new();
        self.current_player = first;
        self.advance_to(GameStatus::Playing);
        info!(game_id = %self.id, first = %first, "game started");

        let mut events = Vec::with_capacity(3);
        for set in &self.ships {
            if set.player.is_bot() {
                continue;
            }
            events.push((
                Recipient::Player(set.player),
                ServerEvent::StartGame {
                    ships: set.ships.clone(),
                    current_player_index: first,
                },
            ));
        }
        events.push((
            Recipient::All,
            ServerEvent::Turn {
                current_player: first,
            },
        ));

        Step::after_turn(first, events)
    }

    // -----------------------------------------------------------------------
    // Attacks
    // -----------------------------------------------------------------------

    /// Checks that `player` may shoot now. `Ok(false)` means the game is
    /// finished and the call must be a silent no-op.
    fn gate(&self, player: PlayerIndex) -> Result<bool, SessionError> {
        match self.status {
            GameStatus::Finished => Ok(false),
            GameStatus::Waiting => Err(SessionError::InvalidState(self.status)),
            GameStatus::Playing if player != self.current_player => {
                Err(SessionError::NotYourTurn {
                    expected: self.current_player,
                    got: player,
                })
            }
            GameStatus::Playing => Ok(true),
        }
    }

    /// `player` fires at `target`.
    ///
    /// # Errors
    /// [`SessionError::InvalidState`] while waiting,
    /// [`SessionError::NotYourTurn`], or [`SessionError::InvalidTarget`].
    /// A finished game returns an idle step instead.
    pub fn attack(&mut self, player: PlayerIndex, target: Position) -> Result<Step, SessionError> {
        if !self.gate(player)? {
            debug!(game_id = %self.id, %player, "attack on finished game ignored");
            return Ok(Step::idle());
        }
        if !target.is_valid() {
            return Err(SessionError::InvalidTarget(target));
        }
        self.resolve(player, target)
    }

    /// `player` fires at a random unexplored cell. Same gating as
    /// [`Game::attack`]. A fully explored board is a silent no-op.
    pub fn random_attack<R: Rng + ?Sized>(
        &mut self,
        player: PlayerIndex,
        rng: &mut R,
    ) -> Result<Step, SessionError> {
        if !self.gate(player)? {
            return Ok(Step::idle());
        }
        self.random_shot_for(player, rng)
    }

    /// Runs a timer action. Stale actions, for a player who no longer holds
    /// the turn or a game that is no longer playing, do nothing.
    pub fn on_timer<R: Rng + ?Sized>(&mut self, action: TimerAction, rng: &mut R) -> Step {
        let shooter = match action {
            TimerAction::TurnTimeout(player) => player,
            TimerAction::BotMove => PlayerIndex::BOT,
        };
        if self.status != GameStatus::Playing || self.current_player != shooter {
            debug!(game_id = %self.id, ?action, status = %self.status, "stale timer ignored");
            return Step::idle();
        }
        if let TimerAction::TurnTimeout(player) = action {
            info!(game_id = %self.id, %player, "turn timed out, firing at random");
        }

        match self.random_shot_for(shooter, rng) {
            Ok(step) => step,
            Err(e) => {
                error!(game_id = %self.id, player = %shooter, error = %e, "timer shot failed");
                Step::idle()
            }
        }
    }

    fn random_shot_for<R: Rng + ?Sized>(
        &mut self,
        player: PlayerIndex,
        rng: &mut R,
    ) -> Result<Step, SessionError> {
        match random_attack_position(&self.board, rng) {
            Some(target) => self.resolve(player, target),
            None => {
                debug!(game_id = %self.id, %player, "no unexplored cell left");
                Ok(Step::idle())
            }
        }
    }

    fn resolve(&mut self, attacker: PlayerIndex, target: Position) -> Result<Step, SessionError> {
        let outcome = process_attack(&mut self.board, &mut self.ships, attacker, target)
            .inspect_err(|e| {
                error!(game_id = %self.id, %attacker, error = %e, "engine invariant broken");
            })?;
        self.last_update = Instant::now();

        let AttackOutcome {
            position, status, ..
        } = outcome;
        debug!(
            game_id = %self.id,
            %attacker,
            x = position.x,
            y = position.y,
            status = ?status,
            "attack resolved"
        );

        if outcome.game_over {
            let winner = outcome.winner.unwrap_or(attacker);
            self.winner = Some(winner);
            self.advance_to(GameStatus::Finished);
            info!(game_id = %self.id, %winner, "game finished");
            return Ok(Step {
                events: vec![
                    (
                        Recipient::All,
                        ServerEvent::Attack {
                            position,
                            current_player: attacker,
                            status,
                        },
                    ),
                    (Recipient::All, ServerEvent::Finish { win_player: winner }),
                ],
                schedule: Schedule::Cancel,
            });
        }

        let next = if outcome.keeps_turn() {
            attacker
        } else {
            self.opponent_of(attacker)
        };
        self.current_player = next;

        Ok(Step::after_turn(
            next,
            vec![
                (
                    Recipient::All,
                    ServerEvent::Attack {
                        position,
                        current_player: next,
                        status,
                    },
                ),
                (Recipient::All, ServerEvent::Turn { current_player: next }),
            ],
        ))
    }
}
