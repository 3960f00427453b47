//! Control channel round trips between a controller and an agent
//!
//! The agent is the real data server; tests started through it measure
//! against the same server, so everything stays on loopback.

use futures::{SinkExt, StreamExt};
use network_speed_tester::{
    control::{control_url, RemoteController},
    engine::EngineSettings,
    logging::Logger,
    models::{ControlMessage, Phase, SnapshotState, StatsMessage, StatsSnapshot, TestConfig},
    output::ChannelPublisher,
    server::{DataServer, ServerConfig},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

fn agent_settings() -> EngineSettings {
    EngineSettings {
        idle_probe_count: 5,
        idle_probe_delay: Duration::from_millis(10),
        settle_interval: Duration::from_millis(50),
        ..EngineSettings::default()
    }
}

async fn start_agent() -> (SocketAddr, CancellationToken) {
    let shutdown = CancellationToken::new();
    let server = DataServer::new(
        ServerConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
        },
        agent_settings(),
        Arc::new(Logger::quiet("AGENT")),
        shutdown.clone(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve(listener).await });
    (addr, shutdown)
}

fn controller(addr: SocketAddr) -> RemoteController {
    RemoteController::new(&addr.to_string(), Duration::from_secs(2), Arc::new(Logger::quiet("REMOTE"))).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_remote_run_reaches_done() {
    let (addr, shutdown) = start_agent().await;
    let config = TestConfig::new("127.0.0.1", addr.port(), 2, Duration::from_secs(1)).unwrap();
    let (publisher, mut rx) = ChannelPublisher::new();

    let outcome = timeout(
        Duration::from_secs(20),
        controller(addr).run(&config, &publisher, CancellationToken::new()),
    )
    .await
    .unwrap()
    .unwrap();
    shutdown.cancel();

    assert!(outcome.completed);

    let mut snapshots = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        snapshots.push(snapshot);
    }
    assert_eq!(outcome.snapshots_received, snapshots.len());
    assert_eq!(snapshots.first().map(|s| (s.phase, s.state)), Some((Phase::IdlePing, SnapshotState::Starting)));
    assert!(snapshots.last().unwrap().is_done());

    let completes: Vec<Phase> = snapshots
        .iter()
        .filter(|s| s.state == SnapshotState::Complete)
        .map(|s| s.phase)
        .collect();
    assert_eq!(completes, vec![Phase::IdlePing, Phase::Download, Phase::Upload]);

    let download = snapshots
        .iter()
        .find(|s| s.phase == Phase::Download && s.state == SnapshotState::Complete)
        .unwrap();
    assert!(download.throughput_gbps.unwrap() > 0.0);
    assert!(download.summary.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_malformed_messages_are_dropped() {
    let (addr, shutdown) = start_agent().await;
    let url = control_url(&addr.to_string()).unwrap();
    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();

    socket.send(Message::text("{not json")).await.unwrap();
    socket.send(Message::text(r#"{"command":"stop"}"#)).await.unwrap();
    socket
        .send(Message::text(r#"{"command":"start","host":"127.0.0.1","port":8080,"streams":0,"duration":1}"#))
        .await
        .unwrap();

    let config = TestConfig::new("127.0.0.1", addr.port(), 1, Duration::from_secs(1)).unwrap();
    let start = serde_json::to_string(&ControlMessage::start(&config)).unwrap();
    socket.send(Message::text(start)).await.unwrap();

    // The first frame must come from the valid start
    let first = timeout(Duration::from_secs(5), socket.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = first else {
        panic!("expected a text frame, got {:?}", first);
    };
    let snapshot: StatsSnapshot = StatsMessage::from_json(text.as_str()).unwrap().into();
    assert_eq!((snapshot.phase, snapshot.state), (Phase::IdlePing, SnapshotState::Starting));

    socket.send(Message::Close(None)).await.unwrap();
    shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_controller_closes_session() {
    let (addr, shutdown) = start_agent().await;
    let config = TestConfig::new("127.0.0.1", addr.port(), 2, Duration::from_secs(10)).unwrap();
    let (publisher, _rx) = ChannelPublisher::new();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let outcome = timeout(Duration::from_secs(5), controller(addr).run(&config, &publisher, cancel))
        .await
        .unwrap()
        .unwrap();
    shutdown.cancel();

    assert!(!outcome.completed);
    assert!(outcome.snapshots_received > 0);
}
