//! The connection lifecycle state machine.

use std::fmt;

/// Where the client is in the connection lifecycle.
///
/// ```text
///                  join_room                 transport ready
///  Disconnected ─────────────→ Connecting ──────────────────→ Lobby
///   ↑   Error   ─reconnect_room→ Reconnecting ────────────────↗  │
///   │     ↑                                                      │ join success
///   │     └──── connect failure / join rejected / lost ────── Connected
///   └──────────────────────── disconnect() (from anywhere) ──────┘
/// ```
///
/// A new join, reconnect or endpoint connection may only start from
/// [`Disconnected`](Self::Disconnected) or [`Error`](Self::Error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session. The initial state.
    #[default]
    Disconnected,

    /// A fresh join is establishing its transport session.
    Connecting,

    /// The transport is up; waiting for the server's join verdict.
    Lobby,

    /// In a room. Requests may be sent.
    Connected,

    /// A reconnect attempt is establishing its transport session.
    Reconnecting,

    /// The last attempt failed or the session was lost. Terminal until the
    /// caller starts a new attempt.
    Error,
}

impl ConnectionState {
    /// Returns `true` if a new connection attempt may start from here.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Which payload schema an inbound datagram is decoded with in this
    /// state. `None` means datagrams are dropped.
    pub fn datagram_phase(self) -> Option<DatagramPhase> {
        match self {
            Self::Lobby | Self::Reconnecting => Some(DatagramPhase::Lobby),
            Self::Connected => Some(DatagramPhase::Room),
            Self::Disconnected | Self::Connecting | Self::Error => None,
        }
    }

    /// The lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Lobby => "lobby",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decode schema selected by the connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramPhase {
    /// Decode as `LobbyResponse`.
    Lobby,
    /// Decode as `RoomResponse`.
    Room,
}

impl fmt::Display for DatagramPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => f.write_str("lobby"),
            Self::Room => f.write_str("room"),
        }
    }
}
