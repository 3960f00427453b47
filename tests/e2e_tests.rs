//! End-to-end tests against the real data server
//!
//! Each test binds the axum server to an ephemeral loopback port and measures
//! against it over real HTTP, either in-process or through the `nst` binary.

use assert_cmd::Command;
use network_speed_tester::{
    engine::{EngineSettings, MeasurementEngine},
    logging::Logger,
    models::{Phase, SnapshotState, TestConfig},
    output::ChannelPublisher,
    server::{DataServer, ServerConfig},
    transport::{HttpTransport, Transport},
};
use predicates::prelude::*;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const ENV_VARS: [&str; 6] = [
    "TARGET_HOST",
    "TARGET_PORT",
    "STREAMS",
    "DURATION_SECONDS",
    "SERVER_PORT",
    "ENABLE_COLOR",
];

fn test_settings() -> EngineSettings {
    EngineSettings {
        idle_probe_count: 5,
        idle_probe_delay: Duration::from_millis(10),
        settle_interval: Duration::from_millis(50),
        ..EngineSettings::default()
    }
}

async fn start_server() -> (SocketAddr, CancellationToken) {
    let shutdown = CancellationToken::new();
    let server = DataServer::new(
        ServerConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
        },
        test_settings(),
        Arc::new(Logger::quiet("SERVER")),
        shutdown.clone(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve(listener).await });
    (addr, shutdown)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_run_against_local_server() {
    let (addr, shutdown) = start_server().await;
    let config = TestConfig::new("127.0.0.1", addr.port(), 4, Duration::from_secs(1)).unwrap();
    let settings = test_settings();
    let transport = HttpTransport::new(&config, &settings).unwrap();
    let engine = MeasurementEngine::new(Arc::new(transport), settings, Arc::new(Logger::quiet("ENGINE")));

    let (publisher, mut rx) = ChannelPublisher::new();
    let report = engine.run(&config, &publisher, CancellationToken::new()).await;
    shutdown.cancel();

    assert!(!report.cancelled);
    assert_eq!(report.completed.len(), 3);

    let idle = report.phase(Phase::IdlePing).unwrap();
    assert!(idle.current_ping_ms.unwrap() > 0.0);

    for phase in [Phase::Download, Phase::Upload] {
        let complete = report.phase(phase).unwrap();
        assert!(complete.throughput_gbps.unwrap() > 0.0, "{:?} moved no data", phase);
        let summary = complete.summary.unwrap();
        assert!(summary.min_ms <= summary.max_ms);
    }

    let mut last = None;
    let mut download_running = 0;
    while let Ok(snapshot) = rx.try_recv() {
        if snapshot.phase == Phase::Download && snapshot.state == SnapshotState::Running {
            download_running += 1;
        }
        last = Some(snapshot);
    }
    assert!(download_running > 0);
    assert!(last.unwrap().is_done());
}

#[tokio::test]
async fn test_probe_measures_round_trip() {
    let (addr, shutdown) = start_server().await;
    let config = TestConfig::new("127.0.0.1", addr.port(), 1, Duration::from_secs(1)).unwrap();
    let transport = HttpTransport::new(&config, &test_settings()).unwrap();

    let rtt = transport.probe().await.unwrap();
    shutdown.cancel();

    assert!(rtt > Duration::ZERO);
    assert!(rtt < Duration::from_secs(2));
}

#[tokio::test]
async fn test_unreachable_target_still_completes() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = TestConfig::new("127.0.0.1", port, 2, Duration::from_secs(1)).unwrap();
    let settings = test_settings();
    let transport = HttpTransport::new(&config, &settings).unwrap();
    let engine = MeasurementEngine::new(Arc::new(transport), settings, Arc::new(Logger::quiet("ENGINE")));

    let (publisher, _rx) = ChannelPublisher::new();
    let report = engine.run(&config, &publisher, CancellationToken::new()).await;

    assert_eq!(report.completed.len(), 3);
    assert_eq!(report.phase(Phase::IdlePing).unwrap().current_ping_ms, Some(0.0));
    assert_eq!(report.phase(Phase::Download).unwrap().throughput_gbps, Some(0.0));
    assert_eq!(report.phase(Phase::Upload).unwrap().throughput_gbps, Some(0.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cli_run_renders_every_phase() {
    let (addr, shutdown) = start_server().await;
    let workdir = TempDir::new().unwrap();
    let port = addr.port().to_string();

    let assert = tokio::task::spawn_blocking(move || {
        let mut cmd = Command::cargo_bin("nst").unwrap();
        for var in ENV_VARS {
            cmd.env_remove(var);
        }
        cmd.current_dir(workdir.path())
            .args(["run", "--host", "127.0.0.1", "--port", &port, "-c", "2", "-d", "1", "--no-color"])
            .timeout(Duration::from_secs(30))
            .assert()
    })
    .await
    .unwrap();
    shutdown.cancel();

    assert
        .success()
        .stdout(predicate::str::contains(format!("Target: 127.0.0.1:{}", addr.port())))
        .stdout(predicate::str::contains("[ping] Starting..."))
        .stdout(predicate::str::contains("[download] COMPLETE:"))
        .stdout(predicate::str::contains("[upload] COMPLETE:"))
        .stdout(predicate::str::contains("Test Complete."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_ends_open_downloads() {
    let shutdown = CancellationToken::new();
    let server = DataServer::new(
        ServerConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
        },
        test_settings(),
        Arc::new(Logger::quiet("SERVER")),
        shutdown.clone(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(async move { server.serve(listener).await });

    // Hold a download open without draining it
    let mut response = reqwest::get(format!("http://{addr}/download")).await.unwrap();
    assert!(!response.chunk().await.unwrap().unwrap().is_empty());

    shutdown.cancel();
    let served = tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server kept running after shutdown with a download open")
        .unwrap();
    assert!(served.is_ok());

    // The body ends instead of streaming forever
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(Some(_)) = response.chunk().await {}
    })
    .await;
    assert!(drained.is_ok());
}
