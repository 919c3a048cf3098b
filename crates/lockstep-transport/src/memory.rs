//! In-process loopback transport.
//!
//! [`MemoryConnector`] hands out [`MemorySession`]s to the client and the
//! matching [`MemoryPeer`] to whoever holds the [`MemoryAcceptor`]: a test,
//! or an embedded fake server. The peer plays the remote end: it pushes
//! datagrams, reads what the client sent, collects finished unidirectional
//! streams, and can close the session or inject failures.
//!
//! ```text
//!  client ── MemorySession ══ link ══ MemoryPeer ── test / fake server
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::{Barrier, Mutex, mpsc, watch};
use url::Url;

use crate::{
    Connector, SessionId, TransportError, TransportSession, TrustConfig,
    UniStream,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Failure knobs shared by both ends of a link.
#[derive(Default)]
struct Faults {
    fail_sends: bool,
    fail_stream_at: Option<usize>,
    streams_opened: usize,
    stream_barrier: Option<Arc<Barrier>>,
}

/// State shared by a session and its peer.
struct Link {
    closed: watch::Sender<bool>,
    faults: StdMutex<Faults>,
}

impl Link {
    fn new() -> Self {
        Self {
            closed: watch::Sender::new(false),
            faults: StdMutex::new(Faults::default()),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        // A poisoned lock only means a test thread panicked mid-update.
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn wait_closed(&self) {
        let mut rx = self.closed.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connector / acceptor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConnectorState {
    refuse: Option<String>,
    unavailable: Option<String>,
    attempts: Vec<(Url, TrustConfig)>,
}

/// A [`Connector`] whose sessions terminate in a [`MemoryPeer`].
#[derive(Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    state: Arc<StdMutex<ConnectorState>>,
}

/// Receives the peer end of every session the connector establishes.
pub struct MemoryAcceptor {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryAcceptor {
    /// Waits for the next established session.
    ///
    /// Returns `None` once every connector clone is dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }
}

impl MemoryConnector {
    /// Creates a connector and the acceptor that receives its peers.
    pub fn new() -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            state: Arc::new(StdMutex::new(ConnectorState::default())),
        };
        (connector, MemoryAcceptor { peers: rx })
    }

    fn state(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every following connect attempt fail with `reason`.
    pub fn refuse_connections(&self, reason: &str) {
        self.state().refuse = Some(reason.to_string());
    }

    /// Makes every following connect attempt fail as if the platform had
    /// no transport support.
    pub fn make_unavailable(&self, reason: &str) {
        self.state().unavailable = Some(reason.to_string());
    }

    /// Undoes [`refuse_connections`](Self::refuse_connections) and
    /// [`make_unavailable`](Self::make_unavailable).
    pub fn accept_connections(&self) {
        let mut state = self.state();
        state.refuse = None;
        state.unavailable = None;
    }

    /// Every URL a connect was attempted against, oldest first.
    pub fn attempted_urls(&self) -> Vec<Url> {
        self.state().attempts.iter().map(|(u, _)| u.clone()).collect()
    }

    /// The trust configuration of the most recent connect attempt.
    pub fn last_trust(&self) -> Option<TrustConfig> {
        self.state().attempts.last().map(|(_, t)| t.clone())
    }
}

impl Connector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(
        &self,
        url: &Url,
        trust: &TrustConfig,
    ) -> Result<MemorySession, TransportError> {
        {
            let mut state = self.state();
            if let Some(reason) = &state.unavailable {
                return Err(TransportError::Unavailable(reason.clone()));
            }
            state.attempts.push((url.clone(), trust.clone()));
            if let Some(reason) = &state.refuse {
                return Err(TransportError::ConnectFailed(
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        reason.clone(),
                    ),
                ));
            }
        }

        let id = SessionId::new(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        let link = Arc::new(Link::new());
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();
        let (streams_tx, streams_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            id,
            url: url.clone(),
            trust: trust.clone(),
            link: Arc::clone(&link),
            to_client: to_client_tx,
            from_client: Mutex::new(from_client_rx),
            streams: Mutex::new(streams_rx),
        };
        self.peers.send(peer).map_err(|_| {
            TransportError::Unavailable("memory acceptor dropped".into())
        })?;

        tracing::debug!(%id, %url, "memory session established");

        Ok(MemorySession {
            id,
            link,
            incoming: Mutex::new(to_client_rx),
            outgoing: from_client_tx,
            streams: streams_tx,
        })
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// The client end of a loopback session.
pub struct MemorySession {
    id: SessionId,
    link: Arc<Link>,
    incoming: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    streams: mpsc::UnboundedSender<Vec<u8>>,
}

impl TransportSession for MemorySession {
    type UniStream = MemoryUniStream;

    async fn send_datagram(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.link.is_closed() {
            return Err(TransportError::ConnectionClosed("session closed".into()));
        }
        if self.link.faults().fail_sends {
            return Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected send failure",
            )));
        }
        self.outgoing.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv_datagram(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            _ = self.link.wait_closed() => Ok(None),
            msg = incoming.recv() => Ok(msg),
        }
    }

    async fn open_uni(&self) -> Result<MemoryUniStream, TransportError> {
        if self.link.is_closed() {
            return Err(TransportError::ConnectionClosed("session closed".into()));
        }
        let barrier = {
            let mut faults = self.link.faults();
            faults.streams_opened += 1;
            if faults.fail_stream_at == Some(faults.streams_opened) {
                return Err(TransportError::StreamFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    format!("injected failure on stream {}", faults.streams_opened),
                )));
            }
            faults.stream_barrier.clone()
        };
        Ok(MemoryUniStream {
            buf: Vec::new(),
            tx: self.streams.clone(),
            link: Arc::clone(&self.link),
            barrier,
            finished: false,
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.link.close();
        Ok(())
    }

    async fn closed(&self) -> Result<(), TransportError> {
        self.link.wait_closed().await;
        Ok(())
    }

    fn id(&self) -> SessionId {
        self.id
    }
}

/// A loopback unidirectional stream. Its bytes reach the peer as one
/// message when the stream is finished (or dropped).
pub struct MemoryUniStream {
    buf: Vec<u8>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    link: Arc<Link>,
    barrier: Option<Arc<Barrier>>,
    finished: bool,
}

impl MemoryUniStream {
    fn deliver(&mut self) -> Result<(), TransportError> {
        self.finished = true;
        self.tx.send(std::mem::take(&mut self.buf)).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }
}

impl UniStream for MemoryUniStream {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if let Some(barrier) = self.barrier.take() {
            barrier.wait().await;
        }
        if self.link.is_closed() {
            return Err(TransportError::StreamFailed(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "session closed",
            )));
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        if self.finished {
            return Ok(());
        }
        self.deliver()
    }
}

impl Drop for MemoryUniStream {
    fn drop(&mut self) {
        if !self.finished && !self.link.is_closed() {
            let _ = self.deliver();
        }
    }
}

// ---------------------------------------------------------------------------
// Peer side
// ---------------------------------------------------------------------------

/// The remote end of a loopback session.
pub struct MemoryPeer {
    id: SessionId,
    url: Url,
    trust: TrustConfig,
    link: Arc<Link>,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    streams: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryPeer {
    /// The session this peer belongs to.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The URL the client connected to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The trust configuration the client connected with.
    pub fn trust(&self) -> &TrustConfig {
        &self.trust
    }

    /// Delivers a datagram to the client. Returns `false` if the session
    /// is closed.
    pub fn send_datagram(&self, data: impl Into<Vec<u8>>) -> bool {
        !self.link.is_closed() && self.to_client.send(data.into()).is_ok()
    }

    /// Waits for the next datagram the client sent.
    ///
    /// Returns `None` once the session is closed and nothing is queued.
    pub async fn recv_datagram(&self) -> Option<Vec<u8>> {
        let mut rx = self.from_client.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => msg,
            _ = self.link.wait_closed() => rx.try_recv().ok(),
        }
    }

    /// Returns a queued client datagram without waiting.
    pub fn try_recv_datagram(&self) -> Option<Vec<u8>> {
        self.from_client.try_lock().ok()?.try_recv().ok()
    }

    /// Waits for the contents of the next finished stream.
    pub async fn recv_stream(&self) -> Option<Vec<u8>> {
        let mut rx = self.streams.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => msg,
            _ = self.link.wait_closed() => rx.try_recv().ok(),
        }
    }

    /// Returns the contents of a finished stream without waiting.
    pub fn try_recv_stream(&self) -> Option<Vec<u8>> {
        self.streams.try_lock().ok()?.try_recv().ok()
    }

    /// Closes the session from the remote side.
    pub fn close(&self) {
        self.link.close();
    }

    /// Returns `true` once either side has closed the session.
    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    /// Makes every following client datagram send fail.
    pub fn fail_sends(&self) {
        self.link.faults().fail_sends = true;
    }

    /// Makes the `nth` stream the client opens (1-based, counted over the
    /// session's lifetime) fail to open.
    pub fn fail_stream_open(&self, nth: usize) {
        self.link.faults().fail_stream_at = Some(nth);
    }

    /// Holds every stream write until `count` streams are writing at once.
    pub fn hold_streams(&self, count: usize) {
        self.link.faults().stream_barrier = Some(Arc::new(Barrier::new(count)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pair() -> (MemoryConnector, MemorySession, MemoryPeer) {
        let (connector, mut acceptor) = MemoryConnector::new();
        let url = Url::parse("https://127.0.0.1:4433/join/r1").unwrap();
        let session = connector
            .connect(&url, &TrustConfig::System)
            .await
            .expect("connect");
        let peer = acceptor.accept().await.expect("peer");
        (connector, session, peer)
    }

    #[tokio::test]
    async fn test_datagrams_flow_both_ways() {
        let (_c, session, peer) = pair().await;

        assert!(peer.send_datagram(b"to client".to_vec()));
        assert_eq!(
            session.recv_datagram().await.unwrap(),
            Some(b"to client".to_vec())
        );

        session.send_datagram(b"to peer").await.unwrap();
        assert_eq!(peer.recv_datagram().await, Some(b"to peer".to_vec()));
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_recv() {
        let (_c, session, peer) = pair().await;
        let session = Arc::new(session);

        let reader = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.recv_datagram().await })
        };
        tokio::task::yield_now().await;
        peer.close();

        let result = reader.await.unwrap().unwrap();
        assert!(result.is_none());
        assert!(session.send_datagram(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_finished_stream_reaches_peer() {
        let (_c, session, peer) = pair().await;

        let mut stream = session.open_uni().await.unwrap();
        stream.write_all(b"hello ").await.unwrap();
        stream.write_all(b"stream").await.unwrap();
        stream.finish().await.unwrap();

        assert_eq!(peer.recv_stream().await, Some(b"hello stream".to_vec()));
    }

    #[tokio::test]
    async fn test_fail_stream_open_hits_only_nth_stream() {
        let (_c, session, peer) = pair().await;
        peer.fail_stream_open(2);

        assert!(session.open_uni().await.is_ok());
        assert!(matches!(
            session.open_uni().await,
            Err(TransportError::StreamFailed(_))
        ));
        assert!(session.open_uni().await.is_ok());
    }

    #[tokio::test]
    async fn test_refused_connect_is_recorded() {
        let (connector, _acceptor) = MemoryConnector::new();
        connector.refuse_connections("no route");
        let url = Url::parse("https://example.test/join/r9").unwrap();

        let result = connector.connect(&url, &TrustConfig::AcceptAny).await;

        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
        assert_eq!(connector.attempted_urls(), vec![url]);
        assert_eq!(connector.last_trust(), Some(TrustConfig::AcceptAny));
    }
}
