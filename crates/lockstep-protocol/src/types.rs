//! Wire payloads exchanged with the lockstep server.
//!
//! Every type here travels as one datagram. The datagram carries no message
//! kind of its own: which enum a payload belongs to is decided by the phase
//! the connection is in. In the lobby the server answers with a
//! [`LobbyResponse`]; once in a room it sends [`RoomResponse`]s. The client
//! only ever sends [`Request`]s.
//!
//! All enums are *externally tagged* (serde's default). Internally tagged
//! enums (`#[serde(tag = "...")]`) would read nicer in JSON, but binary
//! formats like bincode cannot decode them.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The id the server assigns to this player on a successful join.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The credential a player presents to rejoin a room after losing the
/// connection.
///
/// The server hands it out in [`JoinRoomSuccess::key`]. It outlives the
/// session it was issued in.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReconnectKey(String);

impl ReconnectKey {
    /// Wraps a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Keys are secrets; only the length is printed.
impl fmt::Debug for ReconnectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReconnectKey(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for ReconnectKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ReconnectKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// ---------------------------------------------------------------------------
// Outbound: client → server
// ---------------------------------------------------------------------------

/// A command the client sends while in a room.
///
/// Gameplay commands are opaque to this crate: [`Request::Action`] carries
/// the game's own encoding as bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Keep-alive that also acknowledges the newest frame received.
    Blank { frame_id: u32, ack_frame_id: u32 },

    /// Toggles this player's ready flag in the room.
    Ready { is_ready: bool },

    /// Picks the map for the next game.
    ChooseMap { chapter_id: u32, stage_id: u32 },

    /// Backs out of map selection.
    LeaveChooseMap,

    /// Reports that the game scene finished loading.
    Loaded { is_loaded: bool },

    /// A gameplay command for `frame`, encoded by the game.
    Action { frame: u32, data: Vec<u8> },

    /// Reports the outcome of a finished game.
    EndGame { game_result: GameResult },
}

/// How a game ended from this player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Win,
    Lose,
    Draw,
}

// ---------------------------------------------------------------------------
// Inbound, lobby phase
// ---------------------------------------------------------------------------

/// The server's answer to a join or reconnect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyResponse {
    JoinRoomSuccess(JoinRoomSuccess),
    JoinRoomFailed(JoinRoomFailed),
}

/// Payload of [`LobbyResponse::JoinRoomSuccess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomSuccess {
    pub room_id: String,
    pub my_id: PlayerId,
    pub key: ReconnectKey,
    pub message: String,
}

/// Payload of [`LobbyResponse::JoinRoomFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomFailed {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Inbound, room phase
// ---------------------------------------------------------------------------

/// Everything the server sends once the player is in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomResponse {
    /// Snapshot of the room roster.
    RoomInfo {
        room_id: String,
        players: Vec<PlayerId>,
    },

    /// Someone picked a map.
    ChooseMap { chapter_id: u32, stage_id: u32 },

    /// Map selection was abandoned.
    QuitChooseMap,

    /// How many players are currently ready.
    UpdateReadyCount { ready_count: u32, total: u32 },

    /// Every player is ready; clients start loading.
    AllReady,

    /// Every player finished loading; frames start flowing.
    AllLoaded,

    /// A batch of authoritative frames. May be empty.
    FrameData { frames: Vec<Frame> },

    /// The game is over.
    GameEnd { game_result: GameResult },

    /// The room was shut down by the server.
    RoomClosed { message: String },

    /// The server rejected something the client did.
    Error { message: String },
}

/// One authoritative simulation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: u32,
    pub actions: Vec<FrameAction>,
    /// Server-side checksum of the frame contents, 0 when not computed.
    pub checksum: u64,
}

/// A single player's command inside a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAction {
    pub player_id: PlayerId,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
