//! `LockstepClient` builder and facade.
//!
//! Ties the two halves of the server API together: the HTTP room directory
//! and the session lifecycle over the transport.

use lockstep_protocol::{BincodeCodec, Codec, PlayerId, ReconnectKey, Request};
use lockstep_session::{
    ClientConfig, ConnectionState, HandlerSet, SafetyPolicy, SessionClient,
};
use lockstep_transport::Connector;

use crate::{CreateRoomResponse, LockstepError, RoomDirectory};

/// Builder for a [`LockstepClient`].
///
/// # Example
///
/// ```rust,ignore
/// use lockstep::prelude::*;
///
/// let client = LockstepClient::builder(WebTransportConnector)
///     .server_url("https://127.0.0.1:4433")
///     .safety(SafetyPolicy::default().with_pinned_hashes(pins))
///     .build()?;
/// client.join_room("room-1").await?;
/// ```
pub struct LockstepClientBuilder<K: Connector> {
    connector: K,
    server_url: String,
    safety: SafetyPolicy,
    handlers: HandlerSet,
}

impl<K: Connector> LockstepClientBuilder<K> {
    /// Creates a builder pointed at a local development server.
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            server_url: "https://127.0.0.1:4433".to_string(),
            safety: SafetyPolicy::default(),
            handlers: HandlerSet::new(),
        }
    }

    /// Sets the server origin, e.g. `https://game.example:4433`.
    pub fn server_url(mut self, url: &str) -> Self {
        self.server_url = url.to_string();
        self
    }

    /// Sets the certificate trust settings for both HTTP and sessions.
    pub fn safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    /// Installs handlers before the first connection.
    pub fn handlers(mut self, handlers: HandlerSet) -> Self {
        self.handlers = handlers;
        self
    }

    /// Builds a client that speaks the binary wire format.
    ///
    /// # Errors
    /// Fails if the server URL does not parse or the HTTP client cannot be
    /// created.
    pub fn build(self) -> Result<LockstepClient<K, BincodeCodec>, LockstepError> {
        self.build_with_codec(BincodeCodec)
    }

    /// Builds a client with an explicit payload codec.
    pub fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<LockstepClient<K, C>, LockstepError> {
        let config = ClientConfig::new(&self.server_url)?.with_safety(self.safety);
        let directory = RoomDirectory::new(&config.server_url, &config.safety)?;
        let session = SessionClient::with_codec(self.connector, codec, config);
        session.set_handlers(self.handlers);

        tracing::debug!(server_url = %self.server_url, "lockstep client built");
        Ok(LockstepClient { directory, session })
    }
}

/// One player's connection to a lockstep server.
pub struct LockstepClient<K: Connector, C: Codec = BincodeCodec> {
    directory: RoomDirectory,
    session: SessionClient<K, C>,
}

impl<K: Connector> LockstepClient<K, BincodeCodec> {
    /// Creates a new builder around `connector`.
    pub fn builder(connector: K) -> LockstepClientBuilder<K> {
        LockstepClientBuilder::new(connector)
    }
}

impl<K: Connector, C: Codec> LockstepClient<K, C> {
    /// The room directory this client uses.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// The underlying session client.
    pub fn session(&self) -> &SessionClient<K, C> {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Room directory
    // -----------------------------------------------------------------------

    /// Lists the ids of all open rooms.
    pub async fn list_rooms(&self) -> Result<Vec<String>, LockstepError> {
        Ok(self.directory.list_rooms().await?)
    }

    /// Creates `room_id` on the server.
    pub async fn create_room(&self, room_id: &str) -> Result<CreateRoomResponse, LockstepError> {
        Ok(self.directory.create_room(room_id).await?)
    }

    /// Creates `room_id`, then joins it.
    pub async fn create_and_join_room(&self, room_id: &str) -> Result<(), LockstepError> {
        self.create_room(room_id).await?;
        self.join_room(room_id).await
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Joins `room_id`; see [`SessionClient::join_room`].
    pub async fn join_room(&self, room_id: &str) -> Result<(), LockstepError> {
        Ok(self.session.join_room(room_id).await?)
    }

    /// Rejoins `room_id` with a key from an earlier session.
    pub async fn reconnect_room(
        &self,
        room_id: &str,
        key: ReconnectKey,
    ) -> Result<(), LockstepError> {
        Ok(self.session.reconnect_room(room_id, key).await?)
    }

    /// Sends one command to the room.
    pub async fn send_request(&self, request: &Request) -> Result<(), LockstepError> {
        Ok(self.session.send_request(request).await?)
    }

    /// Merges `handlers` into the current set.
    pub fn set_handlers(&self, handlers: HandlerSet) {
        self.session.set_handlers(handlers);
    }

    /// Closes the session. The reconnect key is kept.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    /// The id the server assigned on the last successful join.
    pub fn my_player_id(&self) -> Option<PlayerId> {
        self.session.my_player_id()
    }

    /// The room of the current (or last lost) session.
    pub fn current_room_id(&self) -> Option<String> {
        self.session.room_id()
    }

    /// The credential for [`reconnect_room`](Self::reconnect_room).
    pub fn reconnect_key(&self) -> Option<ReconnectKey> {
        self.session.reconnect_key()
    }

    /// `true` once the join was accepted.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    /// Opens a bare session to a test endpoint such as `/unidirectional`.
    pub async fn connect_to_endpoint(&self, endpoint: &str) -> Result<(), LockstepError> {
        Ok(self.session.connect_to_endpoint(endpoint).await?)
    }

    /// Sends `data` over one stream and waits until the stream is finished.
    pub async fn create_unidirectional_stream(&self, data: &[u8]) -> Result<(), LockstepError> {
        Ok(self.session.create_unidirectional_stream(data, true).await?)
    }

    /// Sends `data` over `count` concurrent streams.
    pub async fn create_multiple_unidirectional_streams(
        &self,
        count: usize,
        data: &[u8],
    ) -> Result<(), LockstepError> {
        Ok(self
            .session
            .create_multiple_unidirectional_streams(count, data)
            .await?)
    }
}
