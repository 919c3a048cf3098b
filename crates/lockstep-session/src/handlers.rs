//! Caller-supplied callbacks.
//!
//! Handlers are plain closures behind `Arc`, so the client can clone the
//! whole set out of its lock and call them with no lock held. A handler may
//! therefore call straight back into the client.

use std::fmt;
use std::sync::Arc;

use lockstep_protocol::{LobbyResponse, RoomResponse};

use crate::{ClientError, ConnectionState};

type LobbyHandler = Arc<dyn Fn(&LobbyResponse) + Send + Sync>;
type RoomHandler = Arc<dyn Fn(&RoomResponse) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ClientError) + Send + Sync>;
type StateHandler = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// The four callback slots of a session client.
///
/// Build one with the `on_*` methods and hand it to
/// [`SessionClient::set_handlers`](crate::SessionClient::set_handlers).
/// Setting handlers again only replaces the slots that are filled in.
///
/// ```rust
/// use lockstep_session::HandlerSet;
///
/// let handlers = HandlerSet::new()
///     .on_state_change(|state| println!("state: {state}"))
///     .on_error(|err| eprintln!("error: {err}"));
/// ```
#[derive(Clone, Default)]
pub struct HandlerSet {
    lobby_response: Option<LobbyHandler>,
    room_response: Option<RoomHandler>,
    error: Option<ErrorHandler>,
    state_change: Option<StateHandler>,
}

impl HandlerSet {
    /// An empty set. Every event is ignored.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the server's answer to a join or reconnect.
    pub fn on_lobby_response(
        mut self,
        f: impl Fn(&LobbyResponse) + Send + Sync + 'static,
    ) -> Self {
        self.lobby_response = Some(Arc::new(f));
        self
    }

    /// Called for every room message while connected.
    pub fn on_room_response(
        mut self,
        f: impl Fn(&RoomResponse) + Send + Sync + 'static,
    ) -> Self {
        self.room_response = Some(Arc::new(f));
        self
    }

    /// Called for every error, whether or not it is also returned.
    pub fn on_error(mut self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Called once per actual state change.
    pub fn on_state_change(
        mut self,
        f: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.state_change = Some(Arc::new(f));
        self
    }

    /// Overwrites the slots that `other` fills in and keeps the rest.
    pub fn merge(&mut self, other: HandlerSet) {
        if other.lobby_response.is_some() {
            self.lobby_response = other.lobby_response;
        }
        if other.room_response.is_some() {
            self.room_response = other.room_response;
        }
        if other.error.is_some() {
            self.error = other.error;
        }
        if other.state_change.is_some() {
            self.state_change = other.state_change;
        }
    }

    pub(crate) fn lobby_response(&self, response: &LobbyResponse) {
        if let Some(f) = &self.lobby_response {
            f(response);
        }
    }

    pub(crate) fn room_response(&self, response: &RoomResponse) {
        if let Some(f) = &self.room_response {
            f(response);
        }
    }

    pub(crate) fn error(&self, error: &ClientError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    pub(crate) fn state_change(&self, state: ConnectionState) {
        if let Some(f) = &self.state_change {
            f(state);
        }
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("on_lobby_response", &self.lobby_response.is_some())
            .field("on_room_response", &self.room_response.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_state_change", &self.state_change.is_some())
            .finish()
    }
}
