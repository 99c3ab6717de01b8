//! In-game messages: what players send to a session and what it sends back.
//!
//! Both enums are adjacently tagged, so a variant maps one-to-one onto a
//! wire frame: the tag is the frame `type` and the fields are its `data`.

use broadside_engine::{AttackStatus, Position, RawShip, Ship};
use broadside_protocol::{Frame, GameId, PlayerIndex, ProtocolError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A player action addressed to one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum ClientAction {
    /// Submit a fleet. Directions are in the client's sense.
    #[serde(rename = "add_ships")]
    AddShips { game_id: GameId, ships: Vec<RawShip> },

    #[serde(rename = "attack")]
    Attack { game_id: GameId, x: i64, y: i64 },

    /// Fire at a random unexplored cell.
    #[serde(rename = "randomAttack")]
    RandomAttack { game_id: GameId },
}

impl ClientAction {
    /// The game this action is for.
    pub fn game_id(&self) -> GameId {
        match self {
            Self::AddShips { game_id, .. }
            | Self::Attack { game_id, .. }
            | Self::RandomAttack { game_id } => *game_id,
        }
    }

    /// Wire name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddShips { .. } => "add_ships",
            Self::Attack { .. } => "attack",
            Self::RandomAttack { .. } => "randomAttack",
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        frame.to_tagged()
    }

    pub fn to_frame(&self, id: u64) -> Result<Frame, ProtocolError> {
        Frame::from_tagged(self, id)
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Text sent to a player whose fleet is in while the opponent's is not.
pub const WAIT_FOR_OPPONENT: &str = "Waiting for opponent to place ships";

/// Events a session pushes to its players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Result of a shot. `current_player` is who moves next.
    Attack {
        position: Position,
        current_player: PlayerIndex,
        status: AttackStatus,
    },

    Turn { current_player: PlayerIndex },

    Finish { win_player: PlayerIndex },

    WaitForOpponent { message: String },

    /// The recipient's own fleet and the player who shoots first.
    StartGame {
        ships: Vec<Ship>,
        current_player_index: PlayerIndex,
    },

    Error { message: String },
}

impl ServerEvent {
    pub fn wait_for_opponent() -> Self {
        Self::WaitForOpponent {
            message: WAIT_FOR_OPPONENT.to_string(),
        }
    }

    /// Encodes the event as a push frame (id 0).
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        Frame::from_tagged(self, 0)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        frame.to_tagged()
    }
}
