//! Who this client is in which room.

use lockstep_protocol::{JoinRoomSuccess, PlayerId, ReconnectKey};

/// The room the client is in (or trying to get into), the id the server
/// gave it there, and the credential for getting back in.
///
/// The room and player id belong to one session. The reconnect key
/// survives a disconnect so the caller can hand it to `reconnect_room`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomIdentity {
    room_id: Option<String>,
    my_player_id: Option<PlayerId>,
    reconnect_key: Option<ReconnectKey>,
}

impl RoomIdentity {
    /// The room being joined or last joined.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// The server-assigned id, present only while in the room.
    pub fn my_player_id(&self) -> Option<PlayerId> {
        self.my_player_id
    }

    /// The last credential the server issued or the caller presented.
    pub fn reconnect_key(&self) -> Option<&ReconnectKey> {
        self.reconnect_key.as_ref()
    }

    /// A join or reconnect attempt for `room_id` begins. A reconnect
    /// supplies the key it presents.
    pub(crate) fn begin(&mut self, room_id: &str, key: Option<ReconnectKey>) {
        self.room_id = Some(room_id.to_string());
        self.my_player_id = None;
        if key.is_some() {
            self.reconnect_key = key;
        }
    }

    /// The server accepted the join.
    pub(crate) fn accept(&mut self, success: &JoinRoomSuccess) {
        self.my_player_id = Some(success.my_id);
        self.reconnect_key = Some(success.key.clone());
    }

    /// The session went away on its own. The room stays known for a
    /// reconnect.
    pub(crate) fn lose_session(&mut self) {
        self.my_player_id = None;
    }

    /// The caller disconnected.
    pub(crate) fn end_session(&mut self) {
        self.room_id = None;
        self.my_player_id = None;
    }
}
