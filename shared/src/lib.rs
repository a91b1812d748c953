//! Wire protocol and common types for the multiplayer snake server and client
//!
//! Frames are single-line JSON objects terminated by `\n`. The `kind` field
//! discriminates the payload:
//!
//! - `input` (client to server): a requested heading
//! - `welcome` (server to client): assigned player id and the game config
//! - `state` (server to client): a snapshot taken at a tick boundary
//! - `rejected` (server to client): connection refused, followed by close
//!
//! Both ends read and write through [`FrameCodec`].

pub mod codec;
pub mod config;
pub mod grid;

pub use codec::FrameCodec;
pub use config::{ConfigError, GameConfig};
pub use grid::{Cell, Direction, Grid};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted frame, excluding the newline
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {len} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    FrameTooLong { len: usize },

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packet {
    Input { direction: Direction },

    Welcome { player_id: u32, config: GameConfig },
    State(Snapshot),
    Rejected { reason: String },
}

impl Packet {
    /// The `kind` tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Input { .. } => "input",
            Packet::Welcome { .. } => "welcome",
            Packet::State(_) => "state",
            Packet::Rejected { .. } => "rejected",
        }
    }
}

/// Borrowing twin of [`Packet::State`] so a shared snapshot can be encoded
/// without cloning it
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OutboundRef<'a> {
    State(&'a Snapshot),
}

/// Round lifecycle as seen by clients
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    WaitingForPlayers,
    Running,
    /// `winner` is `None` for a draw
    Ended { winner: Option<u32> },
}

impl RoundStatus {
    pub fn is_ended(&self) -> bool {
        matches!(self, RoundStatus::Ended { .. })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SnakeState {
    pub player_id: u32,
    /// Head first
    pub cells: Vec<Cell>,
    pub alive: bool,
}

/// Immutable copy of the game at a tick boundary
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tick: u64,
    pub snakes: Vec<SnakeState>,
    pub food: Option<Cell>,
    pub status: RoundStatus,
}

impl Snapshot {
    pub fn snake(&self, player_id: u32) -> Option<&SnakeState> {
        self.snakes.iter().find(|s| s.player_id == player_id)
    }

    pub fn alive_count(&self) -> usize {
        self.snakes.iter().filter(|s| s.alive).count()
    }
}

/// Serializes a packet into a newline-terminated frame
pub fn encode_frame(packet: &Packet) -> Result<String, ProtocolError> {
    let mut frame = serde_json::to_string(packet).map_err(ProtocolError::Encode)?;
    frame.push('\n');
    Ok(frame)
}

/// Encodes a snapshot as a `state` frame
pub fn encode_state(snapshot: &Snapshot) -> Result<String, ProtocolError> {
    let mut frame =
        serde_json::to_string(&OutboundRef::State(snapshot)).map_err(ProtocolError::Encode)?;
    frame.push('\n');
    Ok(frame)
}

/// Parses one frame, with or without its line terminator
pub fn decode_frame(line: &str) -> Result<Packet, ProtocolError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLong { len: line.len() });
    }
    serde_json::from_str(line).map_err(ProtocolError::Malformed)
}
