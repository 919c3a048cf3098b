//! Client configuration: where the server is and how to trust it.

use lockstep_protocol::ReconnectKey;
use lockstep_transport::{
    CertificateHash, TransportError, TrustConfig, parse_certificate_hashes,
};
use url::Url;

use crate::ClientError;

// ---------------------------------------------------------------------------
// SafetyPolicy
// ---------------------------------------------------------------------------

/// Certificate trust settings.
///
/// Pinned hashes are kept as the caller typed them and parsed on every
/// connection attempt, so a typo fails that attempt instead of being
/// silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyPolicy {
    /// Trust self-signed certificates. Development servers only.
    pub accept_self_signed: bool,

    /// Skip certificate validation entirely.
    pub accept_any_certificate: bool,

    /// SHA-256 certificate digests in hex. Each string may itself hold
    /// several entries separated by newlines or commas.
    pub pinned_certificate_hashes: Vec<String>,
}

impl SafetyPolicy {
    /// Adds pinned hashes from free-form text.
    pub fn with_pinned_hashes(mut self, text: impl Into<String>) -> Self {
        self.pinned_certificate_hashes.push(text.into());
        self
    }

    /// Returns `true` if certificate errors should be ignored outright.
    pub fn allows_invalid_certs(&self) -> bool {
        self.accept_self_signed || self.accept_any_certificate
    }

    /// Builds the trust configuration for one connection attempt.
    ///
    /// Pins win over the accept flags: with any pins present, only a
    /// matching certificate is trusted.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidCertificateHash`] for a malformed
    /// pin or one that is not a full SHA-256 digest.
    pub fn trust_config(&self) -> Result<TrustConfig, TransportError> {
        let pins = parse_certificate_hashes(&self.pinned_certificate_hashes.join("\n"))?;
        if let Some(short) = pins.iter().find(|pin| !pin.is_sha256()) {
            return Err(TransportError::InvalidCertificateHash(format!(
                "{short} is {} bytes, expected a {}-byte SHA-256 digest",
                short.as_bytes().len(),
                CertificateHash::SHA256_LEN
            )));
        }
        Ok(if !pins.is_empty() {
            TrustConfig::Pinned(pins)
        } else if self.allows_invalid_certs() {
            TrustConfig::AcceptAny
        } else {
            TrustConfig::System
        })
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a session client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The server origin, e.g. `https://127.0.0.1:4433`.
    pub server_url: Url,

    /// Certificate trust settings.
    pub safety: SafetyPolicy,
}

impl ClientConfig {
    /// Parses `server_url` and uses the default safety policy.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUrl`] if the URL does not parse or
    /// cannot carry a path.
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(server_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{server_url}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{server_url}: not a base url"
            )));
        }
        Ok(Self {
            server_url: url,
            safety: SafetyPolicy::default(),
        })
    }

    /// Replaces the safety policy.
    pub fn with_safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    /// `<server_url>/join/<room_id>`, plus `?key=<key>` for a reconnect.
    ///
    /// The room id is percent-encoded as a single path segment.
    pub fn join_url(
        &self,
        room_id: &str,
        key: Option<&ReconnectKey>,
    ) -> Result<Url, ClientError> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::InvalidUrl(format!("{}: not a base url", self.server_url))
            })?
            .pop_if_empty()
            .push("join")
            .push(room_id);
        if let Some(key) = key {
            url.query_pairs_mut().append_pair("key", key.as_str());
        }
        Ok(url)
    }

    /// Resolves a test endpoint: absolute `http(s)://` URLs are used as
    /// they are, anything else is appended to the server origin.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ClientError> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}{}",
                self.server_url.as_str().trim_end_matches('/'),
                endpoint
            )
        };
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("https://127.0.0.1:4433").unwrap()
    }

    const PIN_A: &str = "AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:\
                         AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA:AA";

    #[test]
    fn test_trust_config_default_is_system() {
        assert_eq!(
            SafetyPolicy::default().trust_config().unwrap(),
            TrustConfig::System
        );
    }

    #[test]
    fn test_trust_config_self_signed_accepts_any() {
        let policy = SafetyPolicy {
            accept_self_signed: true,
            ..SafetyPolicy::default()
        };
        assert_eq!(policy.trust_config().unwrap(), TrustConfig::AcceptAny);
    }

    #[test]
    fn test_trust_config_pins_win_over_accept_any() {
        let policy = SafetyPolicy {
            accept_any_certificate: true,
            ..SafetyPolicy::default()
        }
        .with_pinned_hashes(format!("{PIN_A}\n{}", "cd".repeat(32)));

        let TrustConfig::Pinned(pins) = policy.trust_config().unwrap() else {
            panic!("expected pinned trust");
        };
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].to_string(), "AA".repeat(32));
        assert_eq!(pins[1].to_string(), "CD".repeat(32));
    }

    #[test]
    fn test_trust_config_short_pin_fails() {
        let policy = SafetyPolicy::default().with_pinned_hashes("AA:BB");
        let err = policy.trust_config().unwrap_err();
        assert!(matches!(err, TransportError::InvalidCertificateHash(_)));
        assert!(err.to_string().contains("2 bytes"));
    }

    #[test]
    fn test_trust_config_blank_pins_fall_back() {
        let policy = SafetyPolicy::default().with_pinned_hashes(" \n , ");
        assert_eq!(policy.trust_config().unwrap(), TrustConfig::System);
    }

    #[test]
    fn test_trust_config_odd_pin_fails() {
        let policy = SafetyPolicy::default().with_pinned_hashes("ABC");
        assert!(matches!(
            policy.trust_config(),
            Err(TransportError::InvalidCertificateHash(_))
        ));
    }

    #[test]
    fn test_new_rejects_garbage_url() {
        assert!(matches!(
            ClientConfig::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_join_url_appends_segments() {
        let url = config().join_url("r1", None).unwrap();
        assert_eq!(url.as_str(), "https://127.0.0.1:4433/join/r1");
    }

    #[test]
    fn test_join_url_encodes_room_id() {
        let url = config().join_url("a b/c", None).unwrap();
        assert_eq!(url.as_str(), "https://127.0.0.1:4433/join/a%20b%2Fc");
    }

    #[test]
    fn test_join_url_keeps_base_path() {
        let config = ClientConfig::new("https://game.test/api/").unwrap();
        let url = config.join_url("r1", None).unwrap();
        assert_eq!(url.as_str(), "https://game.test/api/join/r1");
    }

    #[test]
    fn test_join_url_with_key_adds_query() {
        let key = ReconnectKey::new("k&1");
        let url = config().join_url("r1", Some(&key)).unwrap();
        assert_eq!(url.path(), "/join/r1");
        assert_eq!(url.query(), Some("key=k%261"));
    }

    #[test]
    fn test_endpoint_url_relative_path() {
        let url = config().endpoint_url("/unidirectional").unwrap();
        assert_eq!(url.as_str(), "https://127.0.0.1:4433/unidirectional");
    }

    #[test]
    fn test_endpoint_url_absolute_is_verbatim() {
        let url = config().endpoint_url("http://other.test:8080/x").unwrap();
        assert_eq!(url.as_str(), "http://other.test:8080/x");
    }
}
