//! Protocol Messages
//!
//! Four named channels between the two peers. Payloads are serialized as
//! JSON matching the browser client's shapes, with optional binary
//! (bincode) carrying the same data compactly.
//!
//! | channel   | direction       | JSON payload                                   |
//! |-----------|-----------------|------------------------------------------------|
//! | `input`   | client -> host  | `{"action":"move","x":240}`                    |
//! | `sync`    | host -> client  | `{"turn","pieces":[..],"worldTop",..}`         |
//! | `result`  | host -> client  | `"host"` / `"client"` / `"draw"`               |
//! | `rematch` | both            | `"rematch"` / `"quit"`                         |

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::game::game_over::GameResult;
use crate::game::input::InputCommand;
use crate::game::piece::PieceId;
use crate::game::rematch::RematchDecision;
use crate::game::state::Side;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Payload encoding. Both peers of a room must agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// serde_json, matching the documented shapes.
    #[default]
    Json,
    /// bincode.
    Binary,
}

/// Named peer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelName {
    /// Client pointer intents.
    Input,
    /// Host world snapshots.
    Sync,
    /// Host game-over verdict.
    Result,
    /// Post-game decisions.
    Rematch,
}

impl ChannelName {
    /// Channel name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelName::Input => "input",
            ChannelName::Sync => "sync",
            ChannelName::Result => "result",
            ChannelName::Rematch => "rematch",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CHANNEL PAYLOADS
// =============================================================================

/// Input action tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputAction {
    /// Horizontal move
    Move,
    /// Rotate one step
    Rotate,
    /// Release
    Drop,
}

/// JSON shape of an `input` message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    /// What to do.
    pub action: InputAction,
    /// Target X for `move`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
}

impl From<InputCommand> for InputMessage {
    fn from(command: InputCommand) -> Self {
        match command {
            InputCommand::Move { x } => Self { action: InputAction::Move, x: Some(x) },
            InputCommand::Rotate => Self { action: InputAction::Rotate, x: None },
            InputCommand::Drop => Self { action: InputAction::Drop, x: None },
        }
    }
}

impl TryFrom<InputMessage> for InputCommand {
    type Error = ProtocolError;

    fn try_from(message: InputMessage) -> Result<Self, Self::Error> {
        match message.action {
            InputAction::Move => message
                .x
                .filter(|x| x.is_finite())
                .map(|x| InputCommand::Move { x })
                .ok_or(ProtocolError::MissingMoveX),
            InputAction::Rotate => Ok(InputCommand::Rotate),
            InputAction::Drop => Ok(InputCommand::Drop),
        }
    }
}

/// One piece in a snapshot. Coordinates are rounded to whole pixels and
/// degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceSync {
    /// Piece id (`"p<n>"`).
    pub id: PieceId,
    /// Catalog index.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Centre X
    pub x: f32,
    /// Centre Y
    pub y: f32,
    /// Rotation in degrees
    pub angle: f32,
}

/// Whole-state snapshot sent on `sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    /// Side on turn.
    pub turn: Side,
    /// Settled pieces, then the held or dropping piece.
    pub pieces: Vec<PieceSync>,
    /// World upper edge.
    pub world_top: f32,
    /// World height.
    pub world_height: f32,
    /// Camera scroll.
    pub scroll_y: f32,
}

// =============================================================================
// PEER MESSAGES
// =============================================================================

/// A decoded message on one of the four channels.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// `input`
    Input(InputCommand),
    /// `sync`
    Sync(SyncPayload),
    /// `result`
    Result(GameResult),
    /// `rematch`
    Rematch(RematchDecision),
}

/// A message as it travels through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Channel the payload was sent on.
    pub channel: ChannelName,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

impl PeerMessage {
    /// Channel this message travels on.
    pub fn channel(&self) -> ChannelName {
        match self {
            PeerMessage::Input(_) => ChannelName::Input,
            PeerMessage::Sync(_) => ChannelName::Sync,
            PeerMessage::Result(_) => ChannelName::Result,
            PeerMessage::Rematch(_) => ChannelName::Rematch,
        }
    }

    /// Encode for the transport.
    pub fn encode(&self, format: WireFormat) -> Result<Envelope, ProtocolError> {
        let payload = match format {
            WireFormat::Json => match self {
                PeerMessage::Input(command) => serde_json::to_vec(&InputMessage::from(*command))?,
                PeerMessage::Sync(sync) => serde_json::to_vec(sync)?,
                PeerMessage::Result(result) => serde_json::to_vec(result)?,
                PeerMessage::Rematch(decision) => serde_json::to_vec(decision)?,
            },
            WireFormat::Binary => match self {
                PeerMessage::Input(command) => bincode::serialize(command)?,
                PeerMessage::Sync(sync) => bincode::serialize(sync)?,
                PeerMessage::Result(result) => bincode::serialize(result)?,
                PeerMessage::Rematch(decision) => bincode::serialize(decision)?,
            },
        };
        Ok(Envelope { channel: self.channel(), payload })
    }

    /// Decode an envelope received from the transport.
    pub fn decode(envelope: &Envelope, format: WireFormat) -> Result<Self, ProtocolError> {
        let bytes = envelope.payload.as_slice();
        let message = match format {
            WireFormat::Json => match envelope.channel {
                ChannelName::Input => {
                    let message: InputMessage = serde_json::from_slice(bytes)?;
                    PeerMessage::Input(message.try_into()?)
                }
                ChannelName::Sync => PeerMessage::Sync(serde_json::from_slice(bytes)?),
                ChannelName::Result => PeerMessage::Result(serde_json::from_slice(bytes)?),
                ChannelName::Rematch => PeerMessage::Rematch(serde_json::from_slice(bytes)?),
            },
            WireFormat::Binary => match envelope.channel {
                ChannelName::Input => PeerMessage::Input(bincode::deserialize(bytes)?),
                ChannelName::Sync => PeerMessage::Sync(bincode::deserialize(bytes)?),
                ChannelName::Result => PeerMessage::Result(bincode::deserialize(bytes)?),
                ChannelName::Rematch => PeerMessage::Rematch(bincode::deserialize(bytes)?),
            },
        };
        Ok(message)
    }
}

/// Protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// bincode encode/decode failure.
    #[error("Binary error: {0}")]
    Binary(#[from] bincode::Error),

    /// `move` without a usable `x`.
    #[error("Move command without x")]
    MissingMoveX,
}

// =============================================================================
// TESTS
// =============================================================================
