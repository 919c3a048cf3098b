//! Room directory: the plain HTTP side of the server.
//!
//! ```text
//! GET  <origin>/rooms                      → ["room-a", "room-b"]
//! POST <origin>/rooms  {"room_id": "..."}  → 2xx, free-form text body
//! ```
//!
//! This is independent of the session lifecycle; rooms can be listed and
//! created while a session is up or not.

use lockstep_session::SafetyPolicy;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

/// Errors from the room directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The request never got a response (DNS, TLS, connection reset) or the
    /// body could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{operation} failed: {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },

    /// The directory URL could not be built from the server origin.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(Serialize)]
struct CreateRoomRequest<'a> {
    room_id: &'a str,
}

/// Outcome of [`RoomDirectory::create_room`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub success: bool,
    /// The server's response body, verbatim.
    pub message: String,
}

/// HTTP client for listing and creating rooms.
///
/// Each directory owns its own `reqwest::Client`, so relaxing certificate
/// checks for one server never affects other HTTP traffic in the process.
#[derive(Debug, Clone)]
pub struct RoomDirectory {
    http: reqwest::Client,
    rooms_url: Url,
}

impl RoomDirectory {
    /// Creates a directory for the server at `origin`.
    ///
    /// # Errors
    /// [`DirectoryError::InvalidUrl`] if `origin` cannot carry a path,
    /// [`DirectoryError::Http`] if the HTTP client cannot be built.
    pub fn new(origin: &Url, safety: &SafetyPolicy) -> Result<Self, DirectoryError> {
        let mut rooms_url = origin.clone();
        rooms_url
            .path_segments_mut()
            .map_err(|()| DirectoryError::InvalidUrl(format!("{origin}: not a base url")))?
            .pop_if_empty()
            .push("rooms");

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(safety.allows_invalid_certs())
            .build()?;

        Ok(Self { http, rooms_url })
    }

    /// `GET /rooms`: the ids of all open rooms.
    pub async fn list_rooms(&self) -> Result<Vec<String>, DirectoryError> {
        let response = self.http.get(self.rooms_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "list rooms rejected");
            return Err(DirectoryError::Status {
                operation: "list rooms",
                status,
            });
        }

        let rooms: Vec<String> = response.json().await?;
        tracing::debug!(count = rooms.len(), "listed rooms");
        Ok(rooms)
    }

    /// `POST /rooms`: creates `room_id`.
    pub async fn create_room(&self, room_id: &str) -> Result<CreateRoomResponse, DirectoryError> {
        let response = self
            .http
            .post(self.rooms_url.clone())
            .json(&CreateRoomRequest { room_id })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%room_id, %status, "create room rejected");
            return Err(DirectoryError::Status {
                operation: "create room",
                status,
            });
        }

        let message = response.text().await?;
        tracing::info!(%room_id, "room created");
        Ok(CreateRoomResponse {
            success: true,
            message,
        })
    }
}
