//! Session configuration and the game status state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings shared by every session a manager spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a player may think before a random shot is fired for them.
    pub turn_timeout: Duration,

    /// Pause before each bot shot.
    pub bot_delay: Duration,

    /// Sessions idle for longer than this are reclaimed by the sweep.
    pub stale_after: Duration,

    /// How often the server runs the stale-session sweep.
    pub sweep_interval: Duration,

    /// Reject fleets that are not a standard, non-touching fleet. Off by
    /// default: submitted fleets are only clamped onto the board.
    pub reject_invalid_fleets: bool,

    /// Capacity of each session actor's command channel.
    pub channel_size: usize,

    /// Seed for every session RNG. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(15),
            bot_delay: Duration::from_secs(1),
            stale_after: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            reject_invalid_fleets: false,
            channel_size: 64,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a game. Transitions only move forward:
///
/// ```text
/// Waiting → Playing → Finished
/// ```
///
/// - **Waiting**: fewer than two fleets submitted.
/// - **Playing**: both fleets in, shots are accepted from the current player.
/// - **Finished**: one fleet is sunk. Nothing mutates the game any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

impl GameStatus {
    /// The only state reachable from this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Whether the second seat is a human or the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Single,
    Multi,
}
