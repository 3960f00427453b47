//! Measurement engine integration tests
//!
//! Drive the full phase sequence against an in-process transport with a
//! known probe latency and a fixed per-stream transfer rate.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use network_speed_tester::{
    engine::{ByteCounter, EngineSettings, LoadGeneratorPool, MeasurementEngine},
    error::{AppError, Result},
    logging::Logger,
    models::{Phase, SnapshotState, StatsSnapshot, TestConfig, TransferDirection},
    output::{ChannelPublisher, SnapshotPublisher},
    transport::{DownloadReader, Transport, UploadBody},
};
use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tokio_util::{io::StreamReader, sync::CancellationToken};

const CHUNK: usize = 64 * 1024;
const TICK: Duration = Duration::from_millis(10);

/// Transport with a fixed probe RTT and `CHUNK` bytes per `TICK` per stream
struct SyntheticTransport {
    /// `None` makes every probe fail
    rtt: Option<Duration>,
    /// Refuse every transfer stream
    refuse_transfers: bool,
    served: Arc<AtomicU64>,
    received: Arc<AtomicU64>,
}

impl SyntheticTransport {
    fn healthy() -> Self {
        Self {
            rtt: Some(Duration::from_millis(3)),
            refuse_transfers: false,
            served: Arc::new(AtomicU64::new(0)),
            received: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl Transport for SyntheticTransport {
    async fn probe(&self) -> Result<Duration> {
        match self.rtt {
            Some(rtt) => {
                sleep(rtt).await;
                Ok(rtt)
            }
            None => Err(AppError::network("probe refused")),
        }
    }

    async fn open_download(&self) -> Result<DownloadReader> {
        if self.refuse_transfers {
            return Err(AppError::network("download refused"));
        }
        let served = self.served.clone();
        let chunks = futures::stream::unfold(served, |served| async move {
            sleep(TICK).await;
            served.fetch_add(CHUNK as u64, Ordering::Relaxed);
            Some((Ok::<_, std::io::Error>(Bytes::from(vec![7u8; CHUNK])), served))
        });
        Ok(Box::pin(StreamReader::new(Box::pin(chunks))))
    }

    async fn upload(&self, mut body: UploadBody) -> Result<()> {
        if self.refuse_transfers {
            return Err(AppError::network("upload refused"));
        }
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            self.received.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            sleep(TICK).await;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "synthetic".to_string()
    }
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        idle_probe_count: 5,
        idle_probe_delay: Duration::from_millis(5),
        loaded_probe_interval: Duration::from_millis(50),
        window_capacity: 10,
        report_interval: Duration::from_millis(50),
        settle_interval: Duration::from_millis(20),
        read_chunk_size: CHUNK,
        upload_chunk_size: CHUNK,
        probe_timeout: Duration::from_millis(500),
        connect_timeout: Duration::from_secs(1),
    }
}

fn engine(transport: SyntheticTransport) -> MeasurementEngine {
    MeasurementEngine::new(Arc::new(transport), fast_settings(), Arc::new(Logger::quiet("ENGINE")))
}

fn config(streams: u32, secs: u64) -> TestConfig {
    TestConfig::new("127.0.0.1", 8080, streams, Duration::from_secs(secs)).unwrap()
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<StatsSnapshot>) -> Vec<StatsSnapshot> {
    let mut snapshots = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        snapshots.push(snapshot);
    }
    snapshots
}

/// Each phase must read `starting, running*, complete`, and `done` comes last
fn assert_phase_order(snapshots: &[StatsSnapshot], phases: &[Phase]) {
    let mut iter = snapshots.iter().peekable();
    for &phase in phases {
        let first = iter.next().expect("missing starting snapshot");
        assert_eq!((first.phase, first.state), (phase, SnapshotState::Starting));

        while iter
            .peek()
            .is_some_and(|s| s.phase == phase && s.state == SnapshotState::Running)
        {
            let running = iter.next().unwrap();
            assert!(running.summary.is_none());
        }

        let complete = iter.next().expect("missing complete snapshot");
        assert_eq!((complete.phase, complete.state), (phase, SnapshotState::Complete));
        assert!(complete.summary.is_some());
    }

    let done = iter.next().expect("missing done snapshot");
    assert!(done.is_done());
    assert!(iter.next().is_none(), "snapshots after done");
}

#[tokio::test]
async fn test_full_run_snapshot_order() {
    let (publisher, mut rx) = ChannelPublisher::new();
    let report = engine(SyntheticTransport::healthy())
        .run(&config(2, 1), &publisher, CancellationToken::new())
        .await;

    assert!(!report.cancelled);
    assert!(!report.delivery_failed);
    assert_eq!(report.completed.len(), 3);

    let snapshots = drain(&mut rx);
    assert_phase_order(&snapshots, &[Phase::IdlePing, Phase::Download, Phase::Upload]);

    // Every successful idle probe yields one running snapshot with ping only
    let idle_running: Vec<_> = snapshots
        .iter()
        .filter(|s| s.phase == Phase::IdlePing && s.state == SnapshotState::Running)
        .collect();
    assert_eq!(idle_running.len(), 5);
    assert!(idle_running.iter().all(|s| s.current_ping_ms.is_some() && s.current_jitter_ms.is_none()));
}

#[tokio::test]
async fn test_idle_summary_matches_probes() {
    let (publisher, _rx) = ChannelPublisher::new();
    let report = engine(SyntheticTransport::healthy())
        .run(&config(1, 1), &publisher, CancellationToken::new())
        .await;

    let idle = report.phase(Phase::IdlePing).unwrap();
    let summary = idle.summary.unwrap();
    assert_eq!(idle.throughput_gbps, Some(0.0));
    assert!(summary.min_ms >= 3.0);
    assert!(summary.min_ms <= summary.avg_ms && summary.avg_ms <= summary.max_ms);
    assert_eq!(idle.current_jitter_ms, Some(summary.jitter_max_ms));
    assert_eq!(idle.current_ping_ms, Some(summary.avg_ms));
}

#[tokio::test]
async fn test_throughput_matches_transfer_rate() {
    let streams = 4;
    let (publisher, _rx) = ChannelPublisher::new();
    let report = engine(SyntheticTransport::healthy())
        .run(&config(streams, 2), &publisher, CancellationToken::new())
        .await;

    // streams x CHUNK bytes per TICK, in Gbps
    let expected = streams as f64 * CHUNK as f64 / TICK.as_secs_f64() * 8.0 / 1e9;
    for phase in [Phase::Download, Phase::Upload] {
        let measured = report.phase(phase).unwrap().throughput_gbps.unwrap();
        let ratio = measured / expected;
        assert!((0.6..=1.3).contains(&ratio), "{:?}: measured {} expected {}", phase, measured, expected);
    }
}

#[tokio::test]
async fn test_byte_attribution_is_exact() {
    let transport = SyntheticTransport::healthy();
    let served = transport.served.clone();
    let received = transport.received.clone();
    let pool = LoadGeneratorPool::new(Arc::new(transport), CHUNK, CHUNK);

    for direction in [TransferDirection::Download, TransferDirection::Upload] {
        let counter = ByteCounter::new();
        let cancel = CancellationToken::new();
        let deadline = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            deadline.cancel();
        });

        let report = pool.run(direction, 3, counter.clone(), cancel).await;
        assert_eq!(report.streams.len(), 3);
        assert_eq!(report.failed_streams(), 0);
        assert!(counter.get() > 0);
        assert_eq!(counter.get(), report.attributed_bytes());

        match direction {
            // Bytes still buffered at the deadline are never counted
            TransferDirection::Download => assert!(counter.get() <= served.load(Ordering::Relaxed)),
            // Upload counts each chunk as it is handed over
            TransferDirection::Upload => assert_eq!(counter.get(), received.load(Ordering::Relaxed)),
        }
    }
}

#[tokio::test]
async fn test_idle_phase_with_no_successful_probe() {
    let transport = SyntheticTransport {
        rtt: None,
        ..SyntheticTransport::healthy()
    };
    let (publisher, mut rx) = ChannelPublisher::new();
    let report = engine(transport)
        .run(&config(1, 1), &publisher, CancellationToken::new())
        .await;

    let snapshots = drain(&mut rx);
    assert_phase_order(&snapshots, &[Phase::IdlePing, Phase::Download, Phase::Upload]);
    assert!(!snapshots
        .iter()
        .any(|s| s.phase == Phase::IdlePing && s.state == SnapshotState::Running));

    let idle = report.phase(Phase::IdlePing).unwrap();
    let summary = idle.summary.unwrap();
    assert_eq!(summary.min_ms, 0.0);
    assert_eq!(summary.max_ms, 0.0);
    assert_eq!(summary.avg_ms, 0.0);

    // Transfers still run and report throughput without latency
    let download = report.phase(Phase::Download).unwrap();
    assert!(download.throughput_gbps.unwrap() > 0.0);
    assert_eq!(download.current_ping_ms, None);
}

#[tokio::test]
async fn test_all_streams_failing_reports_zero() {
    let transport = SyntheticTransport {
        refuse_transfers: true,
        ..SyntheticTransport::healthy()
    };
    let (publisher, mut rx) = ChannelPublisher::new();
    let report = engine(transport)
        .run(&config(4, 1), &publisher, CancellationToken::new())
        .await;

    assert!(!report.cancelled);
    assert_phase_order(&drain(&mut rx), &[Phase::IdlePing, Phase::Download, Phase::Upload]);
    for phase in [Phase::Download, Phase::Upload] {
        assert_eq!(report.phase(phase).unwrap().throughput_gbps, Some(0.0));
    }
}

#[tokio::test]
async fn test_cancellation_skips_remaining_phases() {
    let (publisher, mut rx) = ChannelPublisher::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        // Idle takes ~40ms; this lands inside download
        sleep(Duration::from_millis(400)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = engine(SyntheticTransport::healthy())
        .run(&config(2, 5), &publisher, cancel)
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(report.cancelled);
    assert_eq!(report.completed.len(), 2);
    assert!(report.phase(Phase::Upload).is_none());

    let snapshots = drain(&mut rx);
    assert_phase_order(&snapshots, &[Phase::IdlePing, Phase::Download]);
}

/// Accepts a few snapshots, then behaves like a peer that went away
struct FailingPublisher {
    accepted: AtomicUsize,
    limit: usize,
}

#[async_trait]
impl SnapshotPublisher for FailingPublisher {
    async fn publish(&self, _snapshot: &StatsSnapshot) -> Result<()> {
        if self.accepted.fetch_add(1, Ordering::SeqCst) >= self.limit {
            return Err(AppError::control("peer gone"));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_publisher_failure_cancels_run() {
    let publisher = FailingPublisher {
        accepted: AtomicUsize::new(0),
        limit: 3,
    };

    let started = Instant::now();
    let report = engine(SyntheticTransport::healthy())
        .run(&config(2, 5), &publisher, CancellationToken::new())
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(report.delivery_failed);
    assert!(report.cancelled);
    assert!(report.phase(Phase::Upload).is_none());
}
