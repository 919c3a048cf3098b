//! Transport abstraction layer for the lockstep client.
//!
//! Provides the [`Connector`] and [`TransportSession`] traits that abstract
//! over a multiplexed session: unreliable datagrams in both directions plus
//! reliable unidirectional streams, all on one connection.
//!
//! # Feature Flags
//!
//! - `webtransport`: WebTransport over QUIC via `wtransport`
//! - `memory`: in-process loopback sessions, used by tests

mod error;
#[cfg(feature = "memory")]
pub mod memory;
mod trust;
#[cfg(feature = "webtransport")]
mod webtransport;

pub use error::TransportError;
pub use trust::{
    CertificateHash, TrustConfig, parse_certificate_hashes, split_pin_entries,
};
#[cfg(feature = "webtransport")]
pub use webtransport::{
    WebTransportConnector, WebTransportSession, WebTransportUniStream,
};

use std::fmt;
use std::future::Future;

use url::Url;

/// Opaque identifier for a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new `SessionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Establishes outgoing sessions.
///
/// The returned future resolves once the session is *ready*: the handshake
/// has completed and datagrams and streams can be used immediately.
pub trait Connector: Send + Sync + 'static {
    /// The session type produced by this connector.
    type Session: TransportSession;

    /// Connects to `url`, trusting the server according to `trust`.
    ///
    /// `trust` applies to this attempt only.
    fn connect(
        &self,
        url: &Url,
        trust: &TrustConfig,
    ) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}

/// A single live session that carries datagrams and unidirectional streams.
pub trait TransportSession: Send + Sync + 'static {
    /// The outgoing stream type opened by [`open_uni`](Self::open_uni).
    type UniStream: UniStream;

    /// Sends one unreliable datagram.
    fn send_datagram(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next datagram from the remote peer.
    ///
    /// Returns `Ok(None)` when the session is closed.
    fn recv_datagram(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Opens a reliable unidirectional stream towards the peer.
    fn open_uni(
        &self,
    ) -> impl Future<Output = Result<Self::UniStream, TransportError>> + Send;

    /// Closes the session. Pending `recv_datagram` calls return `Ok(None)`.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Resolves when the session has closed, for whatever reason.
    ///
    /// `Ok(())` means the close was graceful.
    fn closed(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this session.
    fn id(&self) -> SessionId;
}

/// The sending half of a reliable unidirectional stream.
pub trait UniStream: Send + 'static {
    /// Writes the whole buffer to the stream.
    fn write_all(
        &mut self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Finishes the stream and waits until the peer has it all.
    fn finish(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
