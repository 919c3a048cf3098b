//! Bare sessions and reliable unidirectional streams.
//!
//! These exist to exercise the transport outside the game protocol: connect
//! to an arbitrary endpoint, then push bytes over one or many streams.

use std::sync::Arc;

use futures_util::future::join_all;
use lockstep_protocol::Codec;
use lockstep_transport::{Connector, TransportError, TransportSession, UniStream};

use crate::client::{Attempt, Inner, superseded};
use crate::{ClientError, SessionClient};

/// Watches a bare session for a closure nobody asked for.
pub(crate) async fn close_watch<K: Connector, C: Codec>(
    inner: Arc<Inner<K, C>>,
    session: Arc<K::Session>,
    generation: u64,
) {
    let mut stop = inner.stop.subscribe();
    let closed = tokio::select! {
        biased;
        () = superseded(&mut stop, generation) => return,
        closed = session.closed() => closed,
    };

    let reason = match closed {
        Ok(()) => {
            tracing::info!(session = %session.id(), "session closed gracefully");
            "session closed by peer".to_string()
        }
        Err(e) => {
            tracing::info!(session = %session.id(), error = %e, "session closed");
            e.to_string()
        }
    };
    inner.connection_lost(generation, reason).await;
}

/// Opens one stream, writes `data`, and optionally waits for the finish.
async fn push_stream<S: TransportSession>(
    session: &S,
    data: &[u8],
    wait_for_close: bool,
) -> Result<(), TransportError> {
    let mut stream = session.open_uni().await?;
    stream.write_all(data).await?;
    if wait_for_close {
        stream.finish().await?;
    }
    Ok(())
}

impl<K: Connector, C: Codec> SessionClient<K, C> {
    /// Opens a bare session to `endpoint` and goes straight to `Connected`.
    ///
    /// `endpoint` is either an absolute `http(s)://` URL or a path appended
    /// to the server origin. No lobby handshake happens and no datagrams
    /// are read; the session is only used for streams.
    ///
    /// # Errors
    /// The same as [`join_room`](Self::join_room), plus
    /// [`ClientError::InvalidUrl`] if the endpoint does not resolve.
    pub async fn connect_to_endpoint(&self, endpoint: &str) -> Result<(), ClientError> {
        self.establish(Attempt::Endpoint { endpoint }).await
    }

    /// Opens one unidirectional stream and writes all of `data` to it.
    ///
    /// With `wait_for_close` the stream is finished and the call returns
    /// only once the peer has everything.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] without a live session,
    /// [`ClientError::Transport`] if the stream fails.
    pub async fn create_unidirectional_stream(
        &self,
        data: &[u8],
        wait_for_close: bool,
    ) -> Result<(), ClientError> {
        let session = self.live_session()?;
        push_stream(session.as_ref(), data, wait_for_close)
            .await
            .map_err(|e| self.inner.fail(ClientError::Transport(e)))?;
        tracing::debug!(session = %session.id(), len = data.len(), "stream written");
        Ok(())
    }

    /// Writes `data` over `count` streams at once.
    ///
    /// Every stream runs to completion or failure before this returns;
    /// one failing stream does not cancel the others.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] without a live session, or
    /// [`ClientError::Streams`] carrying the first failure and how many
    /// streams failed.
    pub async fn create_multiple_unidirectional_streams(
        &self,
        count: usize,
        data: &[u8],
    ) -> Result<(), ClientError> {
        let session = self.live_session()?;
        tracing::info!(session = %session.id(), count, len = data.len(), "opening streams");

        let results = join_all((0..count).map(|_| push_stream(session.as_ref(), data, true))).await;

        let mut failed = 0;
        let mut first = None;
        for (index, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                tracing::warn!(stream = index, error = %e, "stream failed");
                failed += 1;
                first.get_or_insert(e);
            }
        }

        match first {
            None => {
                tracing::info!(count, "all streams finished");
                Ok(())
            }
            Some(source) => Err(self.inner.fail(ClientError::Streams {
                failed,
                total: count,
                source,
            })),
        }
    }

    fn live_session(&self) -> Result<Arc<K::Session>, ClientError> {
        let session = self.inner.lock().session.clone();
        session.ok_or_else(|| self.inner.fail(ClientError::NotConnected))
    }
}
