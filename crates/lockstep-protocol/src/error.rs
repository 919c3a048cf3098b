//! Error types for the protocol layer.
//!
//! Each crate in the workspace has its own error enum. A `ProtocolError`
//! always means a payload could not be turned into bytes or back, never a
//! network problem.

/// Errors that can occur while encoding or decoding a payload.
///
/// The source error is kept as a boxed trait object so the variant set does
/// not change with the enabled codec features.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The bytes are malformed, truncated, or do not match the expected type.
    #[error("decode failed: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ProtocolError {
    pub(crate) fn encode(
        e: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Encode(Box::new(e))
    }

    pub(crate) fn decode(
        e: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Decode(Box::new(e))
    }
}
