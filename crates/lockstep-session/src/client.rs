//! The session client: one transport session, one lifecycle.
//!
//! # Concurrency model
//!
//! All mutable state sits behind a single `std::sync::Mutex` that is held
//! for one transition at a time and never across an `.await`. Each
//! transition collects the notifications it causes into a list of
//! [`Event`]s, releases the lock, and only then calls the handlers, in
//! order. A handler can therefore call back into the client.
//!
//! Every connection attempt takes a new *generation* number. Background
//! tasks remember the generation they were started for and stop touching
//! state once it is no longer current. `disconnect` bumps the generation
//! and publishes it on a `watch` channel, which wakes any task blocked on
//! the transport.
//!
//! ```text
//!  caller ── join_room ──→ Connector::connect ──→ read_loop (tokio::spawn)
//!                                                    │ recv_datagram
//!                                                    ▼
//!                               lock → classify by phase → unlock → handlers
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use lockstep_protocol::{
    BincodeCodec, Codec, LobbyResponse, PlayerId, ReconnectKey, Request,
    RoomResponse,
};
use lockstep_transport::{Connector, TransportSession, TrustConfig};
use tokio::sync::watch;
use url::Url;

use crate::{
    ClientConfig, ClientError, ConnectionState, DatagramPhase, HandlerSet,
    RoomIdentity,
};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// A notification produced under the lock and delivered after it.
pub(crate) enum Event {
    State(ConnectionState),
    Lobby(LobbyResponse),
    Room(RoomResponse),
    Error(ClientError),
}

/// Everything a transition may change.
pub(crate) struct Core<S> {
    pub(crate) state: ConnectionState,
    pub(crate) identity: RoomIdentity,
    pub(crate) session: Option<Arc<S>>,
    pub(crate) generation: u64,
}

impl<S> Core<S> {
    /// Moves to `next`, recording a notification only on an actual change.
    pub(crate) fn set_state(&mut self, next: ConnectionState, events: &mut Vec<Event>) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "connection state changed");
            self.state = next;
            events.push(Event::State(next));
        }
    }
}

/// What a new connection attempt is for.
pub(crate) enum Attempt<'a> {
    Join { room_id: &'a str },
    Reconnect { room_id: &'a str, key: ReconnectKey },
    Endpoint { endpoint: &'a str },
}

pub(crate) struct Inner<K: Connector, C> {
    pub(crate) connector: K,
    pub(crate) codec: C,
    pub(crate) config: ClientConfig,
    pub(crate) handlers: Mutex<HandlerSet>,
    pub(crate) core: Mutex<Core<K::Session>>,
    /// Publishes the current generation; tasks for older ones stop.
    pub(crate) stop: watch::Sender<u64>,
}

impl<K: Connector, C: Codec> Inner<K, C> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Core<K::Session>> {
        // State stays consistent across a panicking handler because
        // handlers never run under this lock.
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delivers events to the handlers, in order.
    pub(crate) fn emit(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for event in events {
            match event {
                Event::State(state) => handlers.state_change(state),
                Event::Lobby(response) => handlers.lobby_response(&response),
                Event::Room(response) => handlers.room_response(&response),
                Event::Error(error) => handlers.error(&error),
            }
        }
    }

    /// Reports an error from a caller-invoked operation and hands it back
    /// for returning.
    pub(crate) fn fail(&self, error: ClientError) -> ClientError {
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        handlers.error(&error);
        error
    }

    /// Invalidates every background task of the current generation.
    pub(crate) fn bump_generation(&self, core: &mut Core<K::Session>) -> u64 {
        core.generation += 1;
        self.stop.send_replace(core.generation);
        core.generation
    }

    /// Applies a closure nobody asked for, if `generation` is still live.
    pub(crate) async fn connection_lost(&self, generation: u64, reason: String) {
        let (events, session) = {
            let mut core = self.lock();
            if core.generation != generation {
                return;
            }
            let mut events = Vec::new();
            tracing::warn!(room_id = ?core.identity.room_id(), %reason, "connection lost");
            let session = core.session.take();
            core.identity.lose_session();
            core.set_state(ConnectionState::Error, &mut events);
            events.push(Event::Error(ClientError::ConnectionLost(reason)));
            (events, session)
        };
        if let Some(session) = session {
            let _ = session.close().await;
        }
        self.emit(events);
    }

    /// Decodes one datagram by phase and applies it. Returns `false` when
    /// the read loop should stop.
    async fn dispatch(&self, bytes: &[u8], generation: u64) -> bool {
        let mut events = Vec::new();
        let (keep_reading, release) = {
            let mut core = self.lock();
            if core.generation != generation {
                return false;
            }
            let phase = core.state.datagram_phase();
            match phase {
                None => {
                    tracing::debug!(state = %core.state, len = bytes.len(), "dropping datagram");
                    (true, None)
                }
                Some(DatagramPhase::Lobby) => self.on_lobby_datagram(&mut core, bytes, &mut events),
                Some(DatagramPhase::Room) => {
                    match self.codec.decode::<RoomResponse>(bytes) {
                        Ok(response) => {
                            tracing::debug!(len = bytes.len(), "room datagram");
                            events.push(Event::Room(response));
                        }
                        Err(source) => {
                            tracing::warn!(error = %source, "undecodable room datagram");
                            events.push(Event::Error(ClientError::DecodeFailure {
                                phase: DatagramPhase::Room,
                                source,
                            }));
                        }
                    }
                    (true, None)
                }
            }
        };
        if let Some(session) = release {
            let _ = session.close().await;
        }
        self.emit(events);
        keep_reading
    }

    fn on_lobby_datagram(
        &self,
        core: &mut Core<K::Session>,
        bytes: &[u8],
        events: &mut Vec<Event>,
    ) -> (bool, Option<Arc<K::Session>>) {
        match self.codec.decode::<LobbyResponse>(bytes) {
            Ok(LobbyResponse::JoinRoomSuccess(success)) => {
                tracing::info!(
                    room_id = ?core.identity.room_id(),
                    player_id = %success.my_id,
                    "joined room"
                );
                core.identity.accept(&success);
                core.set_state(ConnectionState::Connected, events);
                events.push(Event::Lobby(LobbyResponse::JoinRoomSuccess(success)));
                (true, None)
            }
            Ok(LobbyResponse::JoinRoomFailed(failed)) => {
                tracing::warn!(
                    room_id = ?core.identity.room_id(),
                    reason = %failed.message,
                    "join rejected"
                );
                let reason = failed.message.clone();
                core.set_state(ConnectionState::Error, events);
                events.push(Event::Lobby(LobbyResponse::JoinRoomFailed(failed)));
                events.push(Event::Error(ClientError::RemoteJoinRejected(reason)));
                self.bump_generation(core);
                (false, core.session.take())
            }
            Err(source) => {
                tracing::warn!(error = %source, "undecodable lobby datagram");
                events.push(Event::Error(ClientError::DecodeFailure {
                    phase: DatagramPhase::Lobby,
                    source,
                }));
                (true, None)
            }
        }
    }
}

/// Resolves once `generation` is no longer the current one.
pub(crate) async fn superseded(stop: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        let current = *stop.borrow_and_update();
        if current != generation {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Reads datagrams until the session ends or is superseded.
async fn read_loop<K: Connector, C: Codec>(
    inner: Arc<Inner<K, C>>,
    session: Arc<K::Session>,
    generation: u64,
) {
    let mut stop = inner.stop.subscribe();
    tracing::debug!(session = %session.id(), generation, "read loop started");

    loop {
        let received = tokio::select! {
            biased;
            () = superseded(&mut stop, generation) => break,
            received = session.recv_datagram() => received,
        };

        match received {
            Ok(Some(bytes)) => {
                if !inner.dispatch(&bytes, generation).await {
                    break;
                }
            }
            Ok(None) => {
                inner
                    .connection_lost(generation, "session closed by peer".into())
                    .await;
                break;
            }
            Err(e) => {
                inner.connection_lost(generation, e.to_string()).await;
                break;
            }
        }
    }

    tracing::debug!(session = %session.id(), generation, "read loop stopped");
}

// ---------------------------------------------------------------------------
// SessionClient
// ---------------------------------------------------------------------------

/// Drives one lockstep game session over a [`Connector`].
///
/// The client is created idle (`Disconnected`). [`join_room`] or
/// [`reconnect_room`] establish a session, wait in the lobby for the
/// server's verdict, and move to `Connected`, where [`send_request`] works
/// and room messages reach the `on_room_response` handler.
///
/// Dropping the client stops its background task; the session is closed
/// when the task lets go of it. Call [`disconnect`] for an orderly close.
///
/// [`join_room`]: Self::join_room
/// [`reconnect_room`]: Self::reconnect_room
/// [`send_request`]: Self::send_request
/// [`disconnect`]: Self::disconnect
pub struct SessionClient<K: Connector, C: Codec = BincodeCodec> {
    pub(crate) inner: Arc<Inner<K, C>>,
}

impl<K: Connector> SessionClient<K, BincodeCodec> {
    /// Creates an idle client that speaks the binary wire format.
    pub fn new(connector: K, config: ClientConfig) -> Self {
        Self::with_codec(connector, BincodeCodec, config)
    }
}

impl<K: Connector, C: Codec> SessionClient<K, C> {
    /// Creates an idle client with an explicit codec.
    pub fn with_codec(connector: K, codec: C, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                codec,
                config,
                handlers: Mutex::new(HandlerSet::new()),
                core: Mutex::new(Core {
                    state: ConnectionState::Disconnected,
                    identity: RoomIdentity::default(),
                    session: None,
                    generation: 0,
                }),
                stop: watch::Sender::new(0),
            }),
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Merges `handlers` into the current set. Slots left empty keep their
    /// previous handler.
    pub fn set_handlers(&self, handlers: HandlerSet) {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .merge(handlers);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// `true` once the join was accepted and room traffic flows.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// The room of the current (or last lost) session.
    pub fn room_id(&self) -> Option<String> {
        self.inner.lock().identity.room_id().map(str::to_owned)
    }

    /// The id the server assigned on the last successful join.
    pub fn my_player_id(&self) -> Option<PlayerId> {
        self.inner.lock().identity.my_player_id()
    }

    /// The credential for [`reconnect_room`](Self::reconnect_room). Kept
    /// across disconnects.
    pub fn reconnect_key(&self) -> Option<ReconnectKey> {
        self.inner.lock().identity.reconnect_key().cloned()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Joins `room_id`.
    ///
    /// Returns once the transport session is up and the client is waiting
    /// in the lobby. The server's verdict arrives later through
    /// `on_lobby_response`.
    ///
    /// # Errors
    /// - [`ClientError::AlreadyActive`] unless `Disconnected` or `Error`.
    /// - [`ClientError::MalformedCredential`] for a bad pinned hash; no
    ///   connection is attempted.
    /// - [`ClientError::ConnectionFailed`] or
    ///   [`ClientError::TransportUnavailable`] if the session cannot be
    ///   established. The client is then in `Error`.
    pub async fn join_room(&self, room_id: &str) -> Result<(), ClientError> {
        self.establish(Attempt::Join { room_id }).await
    }

    /// Rejoins `room_id`, presenting `key` as the reconnect credential.
    ///
    /// Behaves like [`join_room`](Self::join_room), passing through
    /// `Reconnecting` instead of `Connecting`.
    pub async fn reconnect_room(
        &self,
        room_id: &str,
        key: ReconnectKey,
    ) -> Result<(), ClientError> {
        self.establish(Attempt::Reconnect { room_id, key }).await
    }

    /// Encodes `request` and sends it as one datagram.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] outside `Connected` (nothing is sent),
    /// [`ClientError::Encode`] or [`ClientError::Transport`] otherwise.
    pub async fn send_request(&self, request: &Request) -> Result<(), ClientError> {
        let session = {
            let core = self.inner.lock();
            match (&core.state, &core.session) {
                (ConnectionState::Connected, Some(session)) => Arc::clone(session),
                _ => return Err(self.inner.fail(ClientError::NotConnected)),
            }
        };

        let bytes = self
            .inner
            .codec
            .encode(request)
            .map_err(|e| self.inner.fail(ClientError::Encode(e)))?;
        session
            .send_datagram(&bytes)
            .await
            .map_err(|e| self.inner.fail(ClientError::Transport(e)))?;

        tracing::debug!(session = %session.id(), len = bytes.len(), "request sent");
        Ok(())
    }

    /// Closes the session and returns to `Disconnected`.
    ///
    /// Safe to call in any state, any number of times. The room and player
    /// id are forgotten; the reconnect key is kept.
    pub async fn disconnect(&self) {
        let mut events = Vec::new();
        let session = {
            let mut core = self.inner.lock();
            self.inner.bump_generation(&mut core);
            core.identity.end_session();
            core.set_state(ConnectionState::Disconnected, &mut events);
            core.session.take()
        };

        if let Some(session) = session {
            tracing::info!(session = %session.id(), "disconnecting");
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "error while closing session");
            }
        }
        self.inner.emit(events);
    }

    // -----------------------------------------------------------------------
    // Establishment
    // -----------------------------------------------------------------------

    /// Common path of every connection attempt.
    pub(crate) async fn establish(&self, attempt: Attempt<'_>) -> Result<(), ClientError> {
        let inner = &self.inner;
        let (url, trust, generation) = self.begin(&attempt).map_err(|e| inner.fail(e))?;

        let connected = inner.connector.connect(&url, &trust).await;

        let session = match connected {
            Ok(session) => Arc::new(session),
            Err(e) => {
                tracing::warn!(%url, error = %e, "connect failed");
                let mut events = Vec::new();
                {
                    let mut core = inner.lock();
                    if core.generation == generation {
                        core.set_state(ConnectionState::Error, &mut events);
                    }
                }
                inner.emit(events);
                return Err(inner.fail(ClientError::from_connect(e)));
            }
        };

        // Endpoint sessions skip the lobby and carry no room traffic.
        let bare = matches!(attempt, Attempt::Endpoint { .. });
        let mut events = Vec::new();
        let current = {
            let mut core = inner.lock();
            if core.generation == generation {
                core.session = Some(Arc::clone(&session));
                let next = if bare {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Lobby
                };
                core.set_state(next, &mut events);
                true
            } else {
                false
            }
        };

        if !current {
            let _ = session.close().await;
            return Err(inner.fail(ClientError::ConnectionLost(
                "attempt cancelled by disconnect".into(),
            )));
        }

        tracing::info!(%url, session = %session.id(), "session established");
        // Deliver the state change before any task can produce a later one.
        inner.emit(events);
        if bare {
            tokio::spawn(crate::streams::close_watch(
                Arc::clone(inner),
                session,
                generation,
            ));
        } else {
            tokio::spawn(read_loop(Arc::clone(inner), session, generation));
        }
        Ok(())
    }

    /// Validates and records the start of an attempt, all under one lock.
    fn begin(&self, attempt: &Attempt<'_>) -> Result<(Url, TrustConfig, u64), ClientError> {
        let inner = &self.inner;
        let mut events = Vec::new();
        let result = {
            let mut core = inner.lock();
            if !core.state.can_start() {
                return Err(ClientError::AlreadyActive(core.state));
            }

            let trust = inner
                .config
                .safety
                .trust_config()
                .map_err(|e| ClientError::MalformedCredential(e.to_string()))?;

            let (url, next) = match attempt {
                Attempt::Join { room_id } => {
                    let url = inner.config.join_url(room_id, None)?;
                    core.identity.begin(room_id, None);
                    tracing::info!(%room_id, "joining room");
                    (url, ConnectionState::Connecting)
                }
                Attempt::Reconnect { room_id, key } => {
                    let url = inner.config.join_url(room_id, Some(key))?;
                    core.identity.begin(room_id, Some(key.clone()));
                    tracing::info!(%room_id, "reconnecting to room");
                    (url, ConnectionState::Reconnecting)
                }
                Attempt::Endpoint { endpoint } => {
                    let url = inner.config.endpoint_url(endpoint)?;
                    tracing::info!(%url, "connecting to endpoint");
                    (url, ConnectionState::Connecting)
                }
            };

            let generation = inner.bump_generation(&mut core);
            core.set_state(next, &mut events);
            (url, trust, generation)
        };
        inner.emit(events);
        Ok(result)
    }
}

impl<K: Connector, C: Codec> Drop for SessionClient<K, C> {
    fn drop(&mut self) {
        let mut core = self.inner.lock();
        self.inner.bump_generation(&mut core);
    }
}

impl<K: Connector, C: Codec> std::fmt::Debug for SessionClient<K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.lock();
        f.debug_struct("SessionClient")
            .field("state", &core.state)
            .field("identity", &core.identity)
            .field("generation", &core.generation)
            .finish()
    }
}
