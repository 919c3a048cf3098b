use std::time::Duration;

use clap::{Parser, ValueEnum};
use lockstep::prelude::*;
use rand::RngCore;
use tracing_subscriber::EnvFilter;

type Client = LockstepClient<WebTransportConnector>;

const DEFAULT_SERVER_URL: &str = "https://127.0.0.1:4433";
const STREAM_COUNT: usize = 5;
const STREAM_PAYLOAD_LEN: usize = 1024;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Smoke test for a lockstep server.
#[derive(Parser, Debug)]
#[command(name = "lockstep-smoke")]
#[command(version)]
struct Args {
    /// Which scenario to run.
    #[arg(value_enum, default_value = "all")]
    mode: Mode,

    /// Room to join in the session scenarios.
    #[arg(default_value = "room-1")]
    room: String,

    /// Server origin.
    #[arg(long, env = "LOCKSTEP_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Certificate pins, comma or newline separated. Without pins a
    /// self-signed certificate is accepted.
    #[arg(long, env = "LOCKSTEP_CERT_HASHES")]
    pins: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    /// List rooms, create one, list again.
    Http,
    /// Join a room and play a scripted command sequence.
    Wt,
    /// Join, disconnect, then rejoin with the reconnect key.
    Reconnect,
    /// Open concurrent unidirectional streams on `/unidirectional`.
    Streams,
    /// `http` followed by `wt`.
    All,
}

fn handlers() -> HandlerSet {
    HandlerSet::new()
        .on_state_change(|state| tracing::info!(%state, "state changed"))
        .on_lobby_response(|response| match response {
            LobbyResponse::JoinRoomSuccess(ok) => {
                tracing::info!(room_id = %ok.room_id, my_id = %ok.my_id, message = %ok.message, "joined")
            }
            LobbyResponse::JoinRoomFailed(failed) => {
                tracing::warn!(message = %failed.message, "join failed")
            }
        })
        .on_room_response(|response| match response {
            RoomResponse::FrameData { frames } => {
                tracing::debug!(count = frames.len(), "frames")
            }
            other => tracing::info!(?other, "room message"),
        })
        .on_error(|e| tracing::error!(error = %e, "client error"))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

async fn run_http(client: &Client) -> Result<(), LockstepError> {
    let rooms = client.list_rooms().await?;
    tracing::info!(?rooms, "rooms before");

    let room_id = format!("smoke-{}", rand::rng().next_u32() % 10_000);
    let created = client.create_room(&room_id).await?;
    tracing::info!(%room_id, message = %created.message, "created");

    let rooms = client.list_rooms().await?;
    tracing::info!(?rooms, "rooms after");
    Ok(())
}

async fn wait_until_connected(client: &Client) -> Result<(), LockstepError> {
    for _ in 0..50 {
        if client.is_connected() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(ClientError::ConnectionLost("no lobby answer within 5s".into()).into())
}

async fn run_wt(client: &Client, room_id: &str) -> Result<(), LockstepError> {
    client.join_room(room_id).await?;
    wait_until_connected(client).await?;

    let script = [
        Request::Ready { is_ready: true },
        Request::ChooseMap {
            chapter_id: 1,
            stage_id: 1,
        },
        Request::Loaded { is_loaded: true },
        Request::Blank {
            frame_id: 0,
            ack_frame_id: 0,
        },
        Request::Action {
            frame: 1,
            data: b"move:1,2".to_vec(),
        },
    ];
    for request in &script {
        client.send_request(request).await?;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    client
        .send_request(&Request::EndGame {
            game_result: GameResult::Win,
        })
        .await?;
    client.disconnect().await;
    Ok(())
}

async fn run_reconnect(client: &Client, room_id: &str) -> Result<(), LockstepError> {
    client.join_room(room_id).await?;
    wait_until_connected(client).await?;
    client.disconnect().await;

    let Some(key) = client.reconnect_key() else {
        tracing::warn!("server sent no reconnect key");
        return Ok(());
    };
    client.reconnect_room(room_id, key).await?;
    wait_until_connected(client).await?;
    tracing::info!(my_id = ?client.my_player_id(), "reconnected");
    client.disconnect().await;
    Ok(())
}

async fn run_streams(client: &Client) -> Result<(), LockstepError> {
    client.connect_to_endpoint("/unidirectional").await?;

    let mut payload = vec![0u8; STREAM_PAYLOAD_LEN];
    rand::rng().fill_bytes(&mut payload);
    client
        .create_multiple_unidirectional_streams(STREAM_COUNT, &payload)
        .await?;
    tracing::info!(count = STREAM_COUNT, bytes = STREAM_PAYLOAD_LEN, "streams sent");

    client.disconnect().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let safety = match args.pins {
        Some(pins) => SafetyPolicy::default().with_pinned_hashes(pins),
        None => SafetyPolicy {
            accept_self_signed: true,
            ..SafetyPolicy::default()
        },
    };

    let client = LockstepClient::builder(WebTransportConnector)
        .server_url(&args.server_url)
        .safety(safety)
        .handlers(handlers())
        .build()?;
    tracing::info!(server_url = %args.server_url, mode = ?args.mode, "starting");

    match args.mode {
        Mode::Http => run_http(&client).await?,
        Mode::Wt => run_wt(&client, &args.room).await?,
        Mode::Reconnect => run_reconnect(&client, &args.room).await?,
        Mode::Streams => run_streams(&client).await?,
        Mode::All => {
            run_http(&client).await?;
            run_wt(&client, &args.room).await?;
        }
    }
    Ok(())
}
