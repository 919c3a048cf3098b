//! Per-connection trust configuration and certificate pin parsing.
//!
//! A server with a self-signed certificate can be trusted by pinning the
//! SHA-256 digest of its certificate. Pins arrive as free-form text, usually
//! pasted from the server's health endpoint:
//!
//! ```text
//! 3F:A1:...:09
//! 77b2...e4, 0c11...9a
//! ```
//!
//! Entries are separated by newlines or commas. Inside an entry, colons and
//! whitespace are ignored and hex digits are case-insensitive.

use std::fmt;

use crate::TransportError;

/// A certificate digest the server's certificate must match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateHash(Vec<u8>);

impl CertificateHash {
    /// Length of a SHA-256 digest, the only kind a QUIC server pin can be.
    pub const SHA256_LEN: usize = 32;

    /// Parses one pin entry.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidCertificateHash`] when the entry has
    /// an odd number of hex digits or contains a non-hex character.
    pub fn from_hex(entry: &str) -> Result<Self, TransportError> {
        let digits: String = entry
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();

        hex::decode(&digits).map(Self).map_err(|e| match e {
            hex::FromHexError::OddLength => TransportError::InvalidCertificateHash(
                format!("odd number of hex digits in {entry:?}"),
            ),
            hex::FromHexError::InvalidHexCharacter { .. }
            | hex::FromHexError::InvalidStringLength => {
                TransportError::InvalidCertificateHash(format!(
                    "non-hex character in {entry:?}"
                ))
            }
        })
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if this is a full SHA-256 digest.
    pub fn is_sha256(&self) -> bool {
        self.0.len() == Self::SHA256_LEN
    }
}

/// Uppercase hex, no separators.
impl fmt::Display for CertificateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

/// Splits pin text into raw entries without validating them.
///
/// Empty entries (blank lines, trailing commas) are dropped.
pub fn split_pin_entries(text: &str) -> Vec<String> {
    text.split(['\n', ','])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses pin text into certificate digests.
///
/// # Errors
/// Fails on the first malformed entry.
pub fn parse_certificate_hashes(
    text: &str,
) -> Result<Vec<CertificateHash>, TransportError> {
    split_pin_entries(text)
        .iter()
        .map(|entry| CertificateHash::from_hex(entry))
        .collect()
}

/// How the server's certificate is verified for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrustConfig {
    /// Verify against the platform's root store.
    #[default]
    System,

    /// Accept only a certificate whose digest is in this list.
    Pinned(Vec<CertificateHash>),

    /// Accept any certificate. Local development only.
    AcceptAny,
}
