/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The environment cannot provide this transport at all
    /// (no UDP socket, missing platform support).
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The session could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// A pinned certificate hash is not valid hex or has the wrong size.
    #[error("invalid certificate hash: {0}")]
    InvalidCertificateHash(String),

    /// The session was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a datagram failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a datagram failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Opening, writing, or finishing a unidirectional stream failed.
    #[error("stream failed: {0}")]
    StreamFailed(#[source] std::io::Error),
}
