//! Wire protocol for the lockstep client.
//!
//! This crate defines what travels inside each datagram:
//!
//! - **Types** ([`Request`], [`LobbyResponse`], [`RoomResponse`], etc.):
//!   the payloads exchanged with the server.
//! - **Codec** ([`Codec`] trait, [`BincodeCodec`], [`JsonCodec`]): how those
//!   payloads are converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw datagrams) and the
//! session client (connection phase). It knows nothing about connections;
//! the session client decides which response type a datagram is decoded as.
//!
//! ```text
//! Transport (bytes) → Protocol (Request / *Response) → Session (phase)
//! ```
//!
//! # Feature Flags
//!
//! - `bincode` (default): [`BincodeCodec`]
//! - `json` (default): [`JsonCodec`]

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "bincode")]
pub use codec::BincodeCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Frame, FrameAction, GameResult, JoinRoomFailed, JoinRoomSuccess,
    LobbyResponse, PlayerId, ReconnectKey, Request, RoomResponse,
};
