//! WebTransport implementation using `wtransport`.
//!
//! Each [`WebTransportConnector::connect`] builds its own client endpoint so
//! the trust settings of one attempt never leak into another.

use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;
use wtransport::endpoint::endpoint_side::Client;
use wtransport::tls::Sha256Digest;
use wtransport::{ClientConfig, Connection, Endpoint, SendStream, VarInt};

use crate::{
    CertificateHash, Connector, SessionId, TransportError, TransportSession,
    TrustConfig, UniStream,
};

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn io_err(kind: std::io::ErrorKind, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(kind, e.to_string())
}

fn digest(hash: &CertificateHash) -> Result<Sha256Digest, TransportError> {
    let bytes: [u8; 32] = hash.as_bytes().try_into().map_err(|_| {
        TransportError::InvalidCertificateHash(format!(
            "expected a 32-byte SHA-256 digest, got {} bytes",
            hash.as_bytes().len()
        ))
    })?;
    Ok(Sha256Digest::new(bytes))
}

/// Opens WebTransport sessions over QUIC.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebTransportConnector;

impl Connector for WebTransportConnector {
    type Session = WebTransportSession;

    async fn connect(
        &self,
        url: &Url,
        trust: &TrustConfig,
    ) -> Result<WebTransportSession, TransportError> {
        let builder = ClientConfig::builder().with_bind_default();
        let config = match trust {
            TrustConfig::System => builder.with_native_certs().build(),
            TrustConfig::AcceptAny => builder.with_no_cert_validation().build(),
            TrustConfig::Pinned(hashes) => {
                let digests = hashes
                    .iter()
                    .map(digest)
                    .collect::<Result<Vec<_>, _>>()?;
                builder.with_server_certificate_hashes(digests).build()
            }
        };

        let endpoint = Endpoint::client(config)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let connection = endpoint.connect(url.as_str()).await.map_err(|e| {
            TransportError::ConnectFailed(io_err(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = SessionId::new(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %url, "WebTransport session ready");

        Ok(WebTransportSession {
            id,
            connection,
            _endpoint: endpoint,
        })
    }
}

/// A single WebTransport session.
pub struct WebTransportSession {
    id: SessionId,
    connection: Connection,
    _endpoint: Endpoint<Client>,
}

impl TransportSession for WebTransportSession {
    type UniStream = WebTransportUniStream;

    async fn send_datagram(&self, data: &[u8]) -> Result<(), TransportError> {
        self.connection.send_datagram(data).map_err(|e| {
            TransportError::SendFailed(io_err(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn recv_datagram(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let datagram = self.connection.receive_datagram().await.map_err(|e| {
            TransportError::ReceiveFailed(io_err(
                std::io::ErrorKind::ConnectionReset,
                e,
            ))
        })?;
        Ok(Some(datagram.payload().to_vec()))
    }

    async fn open_uni(&self) -> Result<WebTransportUniStream, TransportError> {
        let opening = self.connection.open_uni().await.map_err(|e| {
            TransportError::StreamFailed(io_err(
                std::io::ErrorKind::ConnectionReset,
                e,
            ))
        })?;
        let stream = opening.await.map_err(|e| {
            TransportError::StreamFailed(io_err(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;
        Ok(WebTransportUniStream { stream })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connection.close(VarInt::from_u32(0), b"client disconnect");
        Ok(())
    }

    async fn closed(&self) -> Result<(), TransportError> {
        let reason = self.connection.closed().await;
        Err(TransportError::ConnectionClosed(reason.to_string()))
    }

    fn id(&self) -> SessionId {
        self.id
    }
}

/// The sending half of a WebTransport unidirectional stream.
pub struct WebTransportUniStream {
    stream: SendStream,
}

impl UniStream for WebTransportUniStream {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(data).await.map_err(|e| {
            TransportError::StreamFailed(io_err(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        self.stream.finish().await.map_err(|e| {
            TransportError::StreamFailed(io_err(std::io::ErrorKind::BrokenPipe, e))
        })
    }
}
