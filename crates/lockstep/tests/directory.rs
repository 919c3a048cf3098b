//! Room directory tests against a canned HTTP server.

mod common;

use common::{CannedResponse, HttpStub};
use lockstep::{DirectoryError, RoomDirectory};
use lockstep_session::SafetyPolicy;
use reqwest::StatusCode;
use url::Url;

fn directory(stub: &HttpStub) -> RoomDirectory {
    let origin = Url::parse(&stub.origin).unwrap();
    RoomDirectory::new(&origin, &SafetyPolicy::default()).unwrap()
}

#[tokio::test]
async fn test_list_rooms_returns_ids() {
    let stub = HttpStub::serve(vec![CannedResponse::json(r#"["alpha","beta"]"#)]).await;

    let rooms = directory(&stub).list_rooms().await.unwrap();

    assert_eq!(rooms, vec!["alpha".to_string(), "beta".to_string()]);
    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/rooms");
}

#[tokio::test]
async fn test_list_rooms_empty() {
    let stub = HttpStub::serve(vec![CannedResponse::json("[]")]).await;

    let rooms = directory(&stub).list_rooms().await.unwrap();

    assert!(rooms.is_empty());
}

#[tokio::test]
async fn test_list_rooms_server_error_is_status() {
    let stub = HttpStub::serve(vec![CannedResponse::text(
        StatusCode::SERVICE_UNAVAILABLE,
        "busy",
    )])
    .await;

    let err = directory(&stub).list_rooms().await.unwrap_err();

    match &err {
        DirectoryError::Status { operation, status } => {
            assert_eq!(*operation, "list rooms");
            assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(err.to_string().contains("503 Service Unavailable"));
}

#[tokio::test]
async fn test_list_rooms_bad_body_is_http_error() {
    let stub = HttpStub::serve(vec![CannedResponse::json("not json")]).await;

    let err = directory(&stub).list_rooms().await.unwrap_err();

    assert!(matches!(err, DirectoryError::Http(_)));
}

#[tokio::test]
async fn test_create_room_posts_json_and_keeps_message() {
    let stub = HttpStub::serve(vec![CannedResponse::text(StatusCode::OK, "Room created")]).await;

    let response = directory(&stub).create_room("r1").await.unwrap();

    assert!(response.success);
    assert_eq!(response.message, "Room created");
    let requests = stub.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/rooms");
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, serde_json::json!({ "room_id": "r1" }));
}

#[tokio::test]
async fn test_create_room_conflict_is_status() {
    let stub = HttpStub::serve(vec![CannedResponse::text(StatusCode::CONFLICT, "exists")]).await;

    let err = directory(&stub).create_room("r1").await.unwrap_err();

    assert!(matches!(
        err,
        DirectoryError::Status {
            operation: "create room",
            status: StatusCode::CONFLICT,
        }
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let origin = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    drop(listener);

    let dir = RoomDirectory::new(&origin, &SafetyPolicy::default()).unwrap();
    let err = dir.list_rooms().await.unwrap_err();

    assert!(matches!(err, DirectoryError::Http(_)));
}
