//! Facade tests: the builder, the session lifecycle through
//! `LockstepClient`, and directory plus join in one call.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{CannedResponse, HttpStub};
use lockstep::prelude::*;
use lockstep::protocol::{BincodeCodec, Codec, JsonCodec};
use lockstep::transport::memory::{MemoryAcceptor, MemoryConnector, MemoryPeer};
use reqwest::StatusCode;

fn success(room_id: &str) -> Vec<u8> {
    BincodeCodec
        .encode(&LobbyResponse::JoinRoomSuccess(JoinRoomSuccess {
            room_id: room_id.into(),
            my_id: PlayerId(3),
            key: ReconnectKey::new("key-3"),
            message: "welcome".into(),
        }))
        .unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn client_at(origin: &str) -> (LockstepClient<MemoryConnector>, MemoryAcceptor) {
    let (connector, acceptor) = MemoryConnector::new();
    let client = LockstepClient::builder(connector)
        .server_url(origin)
        .build()
        .unwrap();
    (client, acceptor)
}

async fn joined(
    client: &LockstepClient<MemoryConnector>,
    acceptor: &mut MemoryAcceptor,
    room_id: &str,
) -> MemoryPeer {
    client.join_room(room_id).await.unwrap();
    let peer = acceptor.accept().await.unwrap();
    assert!(peer.send_datagram(success(room_id)));
    eventually(|| client.is_connected()).await;
    peer
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_builder_defaults_to_local_server() {
    let (connector, _acceptor) = MemoryConnector::new();
    let client = LockstepClient::builder(connector).build().unwrap();

    assert_eq!(
        client.session().config().server_url.as_str(),
        "https://127.0.0.1:4433/"
    );
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_builder_rejects_bad_url() {
    let (connector, _acceptor) = MemoryConnector::new();
    let result = LockstepClient::builder(connector)
        .server_url("not a url")
        .build();

    assert!(matches!(
        result,
        Err(LockstepError::Client(ClientError::InvalidUrl(_)))
    ));
}

#[tokio::test]
async fn test_builder_handlers_see_lobby_response() {
    let (connector, mut acceptor) = MemoryConnector::new();
    let lobby = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&lobby);
    let client = LockstepClient::builder(connector)
        .handlers(HandlerSet::new().on_lobby_response(move |r| seen.lock().unwrap().push(r.clone())))
        .build()
        .unwrap();

    let _peer = joined(&client, &mut acceptor, "r1").await;

    let lobby = lobby.lock().unwrap().clone();
    assert_eq!(lobby.len(), 1);
    assert!(matches!(&lobby[0], LobbyResponse::JoinRoomSuccess(s) if s.my_id == PlayerId(3)));
}

#[tokio::test]
async fn test_builder_passes_pins_to_transport() {
    let (connector, mut acceptor) = MemoryConnector::new();
    let pin = "ab".repeat(32);
    let client = LockstepClient::builder(connector)
        .safety(SafetyPolicy::default().with_pinned_hashes(pin.as_str()))
        .build()
        .unwrap();

    client.join_room("r1").await.unwrap();
    let peer = acceptor.accept().await.unwrap();

    assert!(matches!(peer.trust(), lockstep::transport::TrustConfig::Pinned(h) if h.len() == 1));
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_join_send_disconnect() {
    let (client, mut acceptor) = client_at("https://127.0.0.1:4433");
    let peer = joined(&client, &mut acceptor, "r1").await;

    assert_eq!(client.current_room_id().as_deref(), Some("r1"));
    assert_eq!(client.my_player_id(), Some(PlayerId(3)));
    assert_eq!(client.reconnect_key().unwrap().as_str(), "key-3");

    client.send_request(&Request::Ready { is_ready: true }).await.unwrap();
    let sent = peer.recv_datagram().await.unwrap();
    assert_eq!(
        BincodeCodec.decode::<Request>(&sent).unwrap(),
        Request::Ready { is_ready: true }
    );

    client.disconnect().await;

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.current_room_id(), None);
    assert_eq!(client.reconnect_key().unwrap().as_str(), "key-3");
    eventually(|| peer.is_closed()).await;
}

#[tokio::test]
async fn test_send_before_join_is_not_connected() {
    let (client, _acceptor) = client_at("https://127.0.0.1:4433");

    let err = client
        .send_request(&Request::LeaveChooseMap)
        .await
        .unwrap_err();

    assert!(matches!(err, LockstepError::Client(ClientError::NotConnected)));
}

#[tokio::test]
async fn test_reconnect_uses_key() {
    let (client, mut acceptor) = client_at("https://127.0.0.1:4433");

    client
        .reconnect_room("r1", ReconnectKey::new("k1"))
        .await
        .unwrap();
    let peer = acceptor.accept().await.unwrap();

    assert_eq!(peer.url().as_str(), "https://127.0.0.1:4433/join/r1?key=k1");
    assert_eq!(client.connection_state(), ConnectionState::Lobby);
}

#[tokio::test]
async fn test_set_handlers_after_build_receives_room_messages() {
    let (client, mut acceptor) = client_at("https://127.0.0.1:4433");
    let rooms = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&rooms);
    client.set_handlers(HandlerSet::new().on_room_response(move |r| seen.lock().unwrap().push(r.clone())));

    let peer = joined(&client, &mut acceptor, "r1").await;
    let msg = RoomResponse::UpdateReadyCount {
        ready_count: 1,
        total: 2,
    };
    assert!(peer.send_datagram(BincodeCodec.encode(&msg).unwrap()));

    eventually(|| rooms.lock().unwrap().len() == 1).await;
    assert_eq!(rooms.lock().unwrap()[0], msg);
}

#[tokio::test]
async fn test_json_codec_client() {
    let (connector, mut acceptor) = MemoryConnector::new();
    let client = LockstepClient::builder(connector)
        .build_with_codec(JsonCodec)
        .unwrap();

    client.join_room("r1").await.unwrap();
    let peer = acceptor.accept().await.unwrap();
    let accept = LobbyResponse::JoinRoomSuccess(JoinRoomSuccess {
        room_id: "r1".into(),
        my_id: PlayerId(9),
        key: ReconnectKey::new("k"),
        message: String::new(),
    });
    assert!(peer.send_datagram(JsonCodec.encode(&accept).unwrap()));
    eventually(|| client.is_connected()).await;

    client.send_request(&Request::LeaveChooseMap).await.unwrap();
    let sent = peer.recv_datagram().await.unwrap();
    assert_eq!(
        JsonCodec.decode::<Request>(&sent).unwrap(),
        Request::LeaveChooseMap
    );
}

// ---------------------------------------------------------------------------
// Directory + session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_and_join_room() {
    let stub = HttpStub::serve(vec![CannedResponse::text(StatusCode::OK, "created")]).await;
    let (client, mut acceptor) = client_at(&stub.origin);

    client.create_and_join_room("r9").await.unwrap();
    let peer = acceptor.accept().await.unwrap();

    assert_eq!(stub.requests()[0].method, "POST");
    assert_eq!(peer.url().path(), "/join/r9");
    assert_eq!(client.connection_state(), ConnectionState::Lobby);
}

#[tokio::test]
async fn test_create_and_join_room_stops_on_create_failure() {
    let stub = HttpStub::serve(vec![CannedResponse::text(StatusCode::CONFLICT, "exists")]).await;
    let (client, mut acceptor) = client_at(&stub.origin);

    let err = client.create_and_join_room("r9").await.unwrap_err();

    assert!(matches!(err, LockstepError::Directory(DirectoryError::Status { .. })));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), acceptor.accept())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_list_rooms_through_client() {
    let stub = HttpStub::serve(vec![CannedResponse::json(r#"["a"]"#)]).await;
    let (client, _acceptor) = client_at(&stub.origin);

    assert_eq!(client.list_rooms().await.unwrap(), vec!["a".to_string()]);
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_endpoint_streams() {
    let (client, mut acceptor) = client_at("https://127.0.0.1:4433");

    client.connect_to_endpoint("/unidirectional").await.unwrap();
    let peer = acceptor.accept().await.unwrap();
    assert_eq!(peer.url().path(), "/unidirectional");
    assert!(client.is_connected());

    client.create_unidirectional_stream(b"one").await.unwrap();
    assert_eq!(peer.recv_stream().await.unwrap(), b"one".to_vec());

    client
        .create_multiple_unidirectional_streams(3, b"many")
        .await
        .unwrap();
    for _ in 0..3 {
        assert_eq!(peer.recv_stream().await.unwrap(), b"many".to_vec());
    }
}

#[tokio::test]
async fn test_stream_without_session_is_not_connected() {
    let (client, _acceptor) = client_at("https://127.0.0.1:4433");

    let err = client.create_unidirectional_stream(b"x").await.unwrap_err();

    assert!(matches!(err, LockstepError::Client(ClientError::NotConnected)));
}
