//! # Lockstep
//!
//! Client SDK for lockstep multiplayer game servers.
//!
//! A lockstep server exposes two surfaces:
//!
//! - an HTTP **room directory** to list and create rooms ([`RoomDirectory`]);
//! - a multiplexed **session** per player, over which the client joins a
//!   room, sends commands as datagrams, and receives authoritative frames
//!   ([`SessionClient`](lockstep_session::SessionClient)).
//!
//! [`LockstepClient`] puts both behind one API.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lockstep::prelude::*;
//!
//! let client = LockstepClient::builder(WebTransportConnector)
//!     .server_url("https://127.0.0.1:4433")
//!     .handlers(
//!         HandlerSet::new()
//!             .on_lobby_response(|r| println!("lobby: {r:?}"))
//!             .on_room_response(|r| println!("room: {r:?}")),
//!     )
//!     .build()?;
//!
//! client.create_and_join_room("room-1").await?;
//! ```
//!
//! # Feature Flags
//!
//! - `webtransport`: the QUIC transport (`WebTransportConnector`)
//! - `memory`: the in-process loopback transport, for tests

mod client;
mod directory;
mod error;

pub use client::{LockstepClient, LockstepClientBuilder};
pub use directory::{CreateRoomResponse, DirectoryError, RoomDirectory};
pub use error::LockstepError;

pub use lockstep_protocol as protocol;
pub use lockstep_session as session;
pub use lockstep_transport as transport;

/// Everything a typical game client needs.
pub mod prelude {
    pub use crate::{
        CreateRoomResponse, DirectoryError, LockstepClient, LockstepClientBuilder,
        LockstepError, RoomDirectory,
    };
    pub use lockstep_protocol::{
        Frame, FrameAction, GameResult, JoinRoomFailed, JoinRoomSuccess,
        LobbyResponse, PlayerId, ReconnectKey, Request, RoomResponse,
    };
    pub use lockstep_session::{
        ClientError, ConnectionState, HandlerSet, SafetyPolicy,
    };
    #[cfg(feature = "webtransport")]
    pub use lockstep_transport::WebTransportConnector;
}
