//! Error types for the session layer.

use lockstep_protocol::ProtocolError;
use lockstep_transport::TransportError;

use crate::{ConnectionState, DatagramPhase};

/// Errors surfaced by the [`SessionClient`](crate::SessionClient).
///
/// Errors from a caller-invoked operation are both passed to the `on_error`
/// handler and returned. Errors seen by the background read loop only reach
/// `on_error`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The operation is not allowed in the current state.
    #[error("a session is already active (state: {0})")]
    AlreadyActive(ConnectionState),

    /// A send outside `Connected`, or a stream operation without a session.
    #[error("not connected")]
    NotConnected,

    /// The environment has no usable transport.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The transport session could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] TransportError),

    /// A pinned certificate hash is malformed.
    #[error("malformed certificate hash: {0}")]
    MalformedCredential(String),

    /// A datagram did not parse under the schema of the current phase.
    #[error("failed to decode {phase} datagram: {source}")]
    DecodeFailure {
        phase: DatagramPhase,
        #[source]
        source: ProtocolError,
    },

    /// The server turned the join down.
    #[error("join rejected: {0}")]
    RemoteJoinRejected(String),

    /// The session closed without the caller asking for it.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A request could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[source] ProtocolError),

    /// A datagram or stream operation failed.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// At least one stream of a fan-out failed.
    #[error("{failed} of {total} streams failed: {source}")]
    Streams {
        failed: usize,
        total: usize,
        #[source]
        source: TransportError,
    },

    /// A join or endpoint URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Classifies a failed connect attempt.
    pub(crate) fn from_connect(e: TransportError) -> Self {
        match e {
            TransportError::Unavailable(msg) => Self::TransportUnavailable(msg),
            TransportError::InvalidCertificateHash(msg) => {
                Self::MalformedCredential(msg)
            }
            other => Self::ConnectionFailed(other),
        }
    }
}
