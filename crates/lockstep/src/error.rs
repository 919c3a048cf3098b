//! Unified error type for the lockstep client.

use lockstep_protocol::ProtocolError;
use lockstep_session::ClientError;
use lockstep_transport::TransportError;

use crate::DirectoryError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `lockstep` facade you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LockstepError {
    /// A session lifecycle error (join, send, streams).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A room directory request failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A transport-level error.
    ///
    /// Facade methods report transport failures through [`ClientError`];
    /// this variant is for callers driving a `lockstep::transport` connector
    /// or session directly.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload could not be encoded or decoded.
    ///
    /// Produced when callers use a `lockstep::protocol` codec directly, for
    /// example to decode a recorded frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
