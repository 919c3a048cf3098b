//! A canned HTTP server for room directory tests.
//!
//! Serves `GET /rooms` and `POST /rooms` with axum. Each request is
//! recorded and answered with the next queued response.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;

/// A request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub struct CannedResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl CannedResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }
}

struct StubState {
    requests: Mutex<Vec<Recorded>>,
    queue: Mutex<VecDeque<CannedResponse>>,
}

pub struct HttpStub {
    pub origin: String,
    state: Arc<StubState>,
}

impl HttpStub {
    /// Binds to an ephemeral port and serves `responses` in order.
    pub async fn serve(responses: Vec<CannedResponse>) -> Self {
        let state = Arc::new(StubState {
            requests: Mutex::new(Vec::new()),
            queue: Mutex::new(responses.into()),
        });
        let app = Router::new()
            .route("/rooms", get(rooms).post(rooms))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { origin, state }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn rooms(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        body,
    });

    let next = state.queue.lock().unwrap().pop_front();
    match next {
        Some(canned) => (
            canned.status,
            [(header::CONTENT_TYPE, canned.content_type)],
            canned.body,
        )
            .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no canned response left").into_response(),
    }
}
