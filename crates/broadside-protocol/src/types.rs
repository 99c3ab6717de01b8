//! Core protocol types for Broadside's wire format.
//!
//! Every message on the wire is a [`Frame`]: a JSON object with a string
//! `type`, a `data` field that holds the payload as a JSON-encoded *string*,
//! and a numeric `id` that the server echoes back on direct replies.
//!
//! ```text
//! { "type": "attack", "data": "{\"gameId\":1,\"x\":3,\"y\":4}", "id": 0 }
//! ```
//!
//! The double encoding of `data` is what existing browser clients speak, so
//! it is kept as-is. On input, `data` may also arrive as an inline JSON
//! value; it is re-encoded to a string when the frame is decoded.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "json")]
use serde::de::DeserializeOwned;

#[cfg(feature = "json")]
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Index of a participant in a game.
///
/// Human players get non-negative indices from the registration layer.
/// The computer opponent is the reserved sentinel [`PlayerIndex::BOT`].
///
/// `#[serde(transparent)]` keeps it a plain number on the wire, so
/// `PlayerIndex(3)` is `3` and the bot is `-1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerIndex(pub i64);

impl PlayerIndex {
    /// The bot sentinel.
    pub const BOT: PlayerIndex = PlayerIndex(-1);

    /// Returns `true` for the bot sentinel.
    pub fn is_bot(self) -> bool {
        self == Self::BOT
    }
}

impl fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bot() {
            write!(f, "bot")
        } else {
            write!(f, "P-{}", self.0)
        }
    }
}

/// A unique identifier for one game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// The session state machine returns `(Recipient, event)` pairs and the
/// session actor resolves them to connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every participant of the game.
    All,
    /// One participant.
    Player(PlayerIndex),
}

impl Recipient {
    /// Returns `true` if `player` is addressed by this recipient.
    pub fn includes(&self, player: PlayerIndex) -> bool {
        match *self {
            Self::All => true,
            Self::Player(p) => p == player,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// The top-level wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Message kind, e.g. `"attack"` or `"start_game"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// JSON-encoded payload. Empty payloads are sent as `""`.
    #[serde(default)]
    #[cfg_attr(feature = "json", serde(deserialize_with = "lenient_data"))]
    pub data: String,

    /// Request id. Replies echo the request's id; pushes use 0.
    #[serde(default)]
    pub id: u64,
}

/// Accepts `data` as a JSON-encoded string or as any inline JSON value.
#[cfg(feature = "json")]
fn lenient_data<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        inline => serde_json::to_string(&inline).map_err(serde::de::Error::custom),
    }
}

#[cfg(feature = "json")]
impl Frame {
    /// Builds a frame whose `data` is `payload` encoded as a JSON string.
    pub fn with_payload<T: Serialize>(
        kind: &str,
        payload: &T,
        id: u64,
    ) -> Result<Self, ProtocolError> {
        let data = serde_json::to_string(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            kind: kind.to_string(),
            data,
            id,
        })
    }

    /// Builds a frame without a payload.
    pub fn empty(kind: &str, id: u64) -> Self {
        Self {
            kind: kind.to_string(),
            data: String::new(),
            id,
        }
    }

    /// Decodes the `data` string into `T`.
    ///
    /// An empty `data` string is treated as JSON `null`, so unit-like
    /// payloads and `Option`s decode cleanly.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let raw = if self.data.trim().is_empty() {
            "null"
        } else {
            self.data.as_str()
        };
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }

    /// Builds a frame from a value serialized in serde's adjacently tagged
    /// form, `{"type": .., "data": ..}`.
    ///
    /// Game enums derive `#[serde(tag = "type", content = "data")]`, so
    /// each variant maps straight onto a frame kind.
    pub fn from_tagged<T: Serialize>(value: &T, id: u64) -> Result<Self, ProtocolError> {
        let mut tagged = serde_json::to_value(value).map_err(ProtocolError::Encode)?;
        let kind = tagged
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidMessage("value has no type tag".into()))?
            .to_string();
        let data = match tagged.get_mut("data") {
            Some(data) => serde_json::to_string(&data.take()).map_err(ProtocolError::Encode)?,
            None => String::new(),
        };
        Ok(Self { kind, data, id })
    }

    /// Decodes this frame into an adjacently tagged enum.
    pub fn to_tagged<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let data: serde_json::Value = self.payload()?;
        let tagged = serde_json::json!({ "type": self.kind, "data": data });
        serde_json::from_value(tagged).map_err(ProtocolError::Decode)
    }

    /// Builds an `error` frame carrying a human-readable message.
    pub fn error(message: &str, id: u64) -> Self {
        #[derive(Serialize)]
        struct ErrorData<'a> {
            message: &'a str,
        }
        // Serializing a struct with one string field cannot fail.
        let data = serde_json::to_string(&ErrorData { message }).unwrap_or_default();
        Self {
            kind: "error".to_string(),
            data,
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Messages handled by the server itself rather than by a game session:
/// identification and session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMessage {
    /// Client → Server: first frame on every connection.
    Handshake { token: Option<String> },

    /// Server → Client: the connection is bound to `id_player`.
    HandshakeAck { id_player: PlayerIndex },

    /// Client → Server: start a game against the bot.
    SinglePlay,

    /// Client → Server: pair me with the next waiting player.
    QuickMatch,

    /// Server → Client: a game was created for you.
    CreateGame {
        id_game: GameId,
        id_player: PlayerIndex,
    },
}

#[cfg(feature = "json")]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeData {
    #[serde(default)]
    token: Option<String>,
}

#[cfg(feature = "json")]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeAckData {
    id_player: PlayerIndex,
}

#[cfg(feature = "json")]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGameData {
    id_game: GameId,
    id_player: PlayerIndex,
}

#[cfg(feature = "json")]
impl SystemMessage {
    /// Wire name of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "handshake",
            Self::HandshakeAck { .. } => "handshake_ack",
            Self::SinglePlay => "single_play",
            Self::QuickMatch => "quick_match",
            Self::CreateGame { .. } => "create_game",
        }
    }

    /// Parses a system message out of a frame.
    ///
    /// Returns `Ok(None)` when the frame is not a system message, so the
    /// caller can hand it to the game layer instead.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, ProtocolError> {
        let msg = match frame.kind.as_str() {
            "handshake" => {
                let data: Option<HandshakeData> = frame.payload()?;
                Self::Handshake {
                    token: data.and_then(|d| d.token),
                }
            }
            "handshake_ack" => {
                let data: HandshakeAckData = frame.payload()?;
                Self::HandshakeAck {
                    id_player: data.id_player,
                }
            }
            "single_play" => Self::SinglePlay,
            "quick_match" => Self::QuickMatch,
            "create_game" => {
                let data: CreateGameData = frame.payload()?;
                Self::CreateGame {
                    id_game: data.id_game,
                    id_player: data.id_player,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }

    /// Encodes this message as a frame with the given request id.
    pub fn to_frame(&self, id: u64) -> Result<Frame, ProtocolError> {
        match self {
            Self::Handshake { token } => Frame::with_payload(
                self.kind(),
                &HandshakeData {
                    token: token.clone(),
                },
                id,
            ),
            Self::HandshakeAck { id_player } => Frame::with_payload(
                self.kind(),
                &HandshakeAckData {
                    id_player: *id_player,
                },
                id,
            ),
            Self::SinglePlay | Self::QuickMatch => Ok(Frame::empty(self.kind(), id)),
            Self::CreateGame { id_game, id_player } => Frame::with_payload(
                self.kind(),
                &CreateGameData {
                    id_game: *id_game,
                    id_player: *id_player,
                },
                id,
            ),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
