//! Connection lifecycle for the lockstep client.
//!
//! This crate owns the one transport session a game client has and moves it
//! through its lifecycle:
//!
//! 1. **Join**: connect to `<origin>/join/<room>` and wait in the lobby.
//! 2. **Play**: once the server accepts, send [`Request`]s and receive
//!    [`RoomResponse`]s.
//! 3. **Leave or lose**: `disconnect`, or an unexpected close, ends the
//!    session; the reconnect key survives for [`SessionClient::reconnect_room`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)          ← adds the room directory, one API for callers
//!     ↕
//! Session (this crate)    ← state machine, read loop, callbacks
//!     ↕
//! Protocol / Transport    ← payload codecs / datagrams and streams
//! ```
//!
//! [`Request`]: lockstep_protocol::Request
//! [`RoomResponse`]: lockstep_protocol::RoomResponse

mod client;
mod config;
mod error;
mod handlers;
mod identity;
mod state;
mod streams;

pub use client::SessionClient;
pub use config::{ClientConfig, SafetyPolicy};
pub use error::ClientError;
pub use handlers::HandlerSet;
pub use identity::RoomIdentity;
pub use state::{ConnectionState, DatagramPhase};
