//! Measurement engine
//!
//! Drives one test run through `idle-ping -> download -> upload -> done`:
//! - idle-ping: a fixed number of paced probes with no load
//! - download/upload: N transfer tasks plus a ticking sampler against one
//!   deadline-derived cancellation token, reported every tick
//! - done: a single sentinel snapshot
//!
//! Every phase emits `starting`, zero or more `running` and exactly one
//! `complete` snapshot, in that order, before the next phase begins. The same
//! engine serves local console runs and remote agent sessions; only the
//! [`SnapshotPublisher`] differs.

pub mod accumulator;
pub mod aggregator;
pub mod generator;
pub mod sampler;
pub mod window;

pub use accumulator::{ByteCounter, LatestLatency, PhaseAccumulator};
pub use aggregator::{throughput_gbps, StatsAggregator};
pub use generator::{pattern_chunk, LoadGeneratorPool, PoolReport, StreamOutcome};
pub use sampler::{IdleResult, IdleTally, LatencySample, LatencySampler, ProbeSchedule, SamplerReport};
pub use window::LatencyWindow;

use crate::{
    error::AppError,
    logging::{new_run_id, Logger},
    models::{Phase, StatsSnapshot, TestConfig, TransferDirection},
    output::SnapshotPublisher,
    transport::Transport,
};
use futures::StreamExt;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    task::JoinError,
    time::{interval, sleep, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// Engine tunables
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Probes taken during idle-ping
    pub idle_probe_count: usize,
    /// Pause after each idle probe
    pub idle_probe_delay: Duration,
    /// Probe tick during load phases
    pub loaded_probe_interval: Duration,
    /// Samples kept for current-jitter
    pub window_capacity: usize,
    /// Tick of `running` snapshots
    pub report_interval: Duration,
    /// Pause between phases
    pub settle_interval: Duration,
    /// Download read buffer size
    pub read_chunk_size: usize,
    /// Upload chunk size
    pub upload_chunk_size: usize,
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_probe_count: 20,
            idle_probe_delay: Duration::from_millis(50),
            loaded_probe_interval: Duration::from_millis(200),
            window_capacity: 10,
            report_interval: Duration::from_millis(100),
            settle_interval: Duration::from_millis(500),
            read_chunk_size: 64 * 1024,
            upload_chunk_size: 1024 * 1024,
            probe_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// What a finished run looked like
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Correlation id used in the run's log entries
    pub run_id: String,
    /// `complete` snapshot of every phase that ran, in order
    pub completed: Vec<StatsSnapshot>,
    /// The run was stopped before all phases finished
    pub cancelled: bool,
    /// At least one snapshot could not be delivered
    pub delivery_failed: bool,
}

impl RunReport {
    /// `complete` snapshot of `phase`, if it ran
    pub fn phase(&self, phase: Phase) -> Option<&StatsSnapshot> {
        self.completed.iter().find(|s| s.phase == phase)
    }
}

/// Phase orchestrator shared by local and remote invocation
pub struct MeasurementEngine {
    sampler: LatencySampler,
    pool: LoadGeneratorPool,
    settings: EngineSettings,
    describe: String,
    logger: Arc<Logger>,
}

impl MeasurementEngine {
    pub fn new(transport: Arc<dyn Transport>, settings: EngineSettings, logger: Arc<Logger>) -> Self {
        Self {
            sampler: LatencySampler::new(transport.clone(), settings.probe_timeout),
            pool: LoadGeneratorPool::new(
                transport.clone(),
                settings.read_chunk_size,
                settings.upload_chunk_size,
            ),
            describe: transport.describe(),
            settings,
            logger,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run every phase for `config`, publishing each snapshot.
    ///
    /// Cancelling `cancel` stops the current phase (it still reports `complete`),
    /// skips the remaining ones and emits the `done` sentinel. A publisher failure
    /// cancels the run the same way.
    pub async fn run(
        &self,
        config: &TestConfig,
        publisher: &dyn SnapshotPublisher,
        cancel: CancellationToken,
    ) -> RunReport {
        let run_id = new_run_id();
        let run_token = cancel.child_token();
        let emitter = Emitter {
            publisher,
            run_token: run_token.clone(),
            failed: AtomicBool::new(false),
            logger: &self.logger,
            run_id: &run_id,
        };

        self.logger
            .info("Measurement run started")
            .correlation_id(&run_id)
            .field("target", &self.describe)
            .field("streams", config.stream_count())
            .field("phase_duration_secs", config.phase_duration().as_secs())
            .log()
            .await;

        let mut completed = Vec::new();
        let mut phase = Phase::IdlePing;
        while !phase.is_terminal() {
            let complete = match phase.direction() {
                Some(direction) => self.run_load_phase(direction, config, &emitter, &run_token).await,
                None => self.run_idle_phase(&emitter, &run_token).await,
            };
            completed.push(complete);

            if run_token.is_cancelled() {
                break;
            }

            // Let the previous phase's connections close before the next one opens new ones
            tokio::select! {
                biased;
                _ = run_token.cancelled() => break,
                _ = sleep(self.settings.settle_interval) => {}
            }

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        let cancelled = run_token.is_cancelled();
        emitter.emit(&StatsSnapshot::done()).await;

        self.logger
            .info("Measurement run finished")
            .correlation_id(&run_id)
            .field("phases_completed", completed.len())
            .field("cancelled", cancelled)
            .log()
            .await;

        RunReport {
            completed,
            cancelled,
            delivery_failed: emitter.failed.load(Ordering::Relaxed),
            run_id,
        }
    }

    async fn run_idle_phase(&self, emitter: &Emitter<'_>, run_token: &CancellationToken) -> StatsSnapshot {
        emitter.emit(&StatsSnapshot::starting(Phase::IdlePing)).await;

        let mut tally = IdleTally::default();
        let mut samples = self.sampler.idle_samples(
            self.settings.idle_probe_count,
            self.settings.idle_probe_delay,
            run_token.child_token(),
        );
        while let Some(outcome) = samples.next().await {
            tally.record(outcome.as_ref());
            if let Some(sample) = outcome {
                emitter.emit(&aggregator::idle_running(sample.round_trip_ms)).await;
            }
        }

        let result = tally.finish();
        if result.successes == 0 {
            self.logger
                .warn("Target did not answer any idle probe")
                .correlation_id(emitter.run_id)
                .field("target", &self.describe)
                .field("attempts", result.attempts)
                .log()
                .await;
        }

        let complete = aggregator::idle_complete(&result);
        self.log_complete(&complete, emitter.run_id).await;
        emitter.emit(&complete).await;
        complete
    }

    async fn run_load_phase(
        &self,
        direction: TransferDirection,
        config: &TestConfig,
        emitter: &Emitter<'_>,
        run_token: &CancellationToken,
    ) -> StatsSnapshot {
        let phase = direction.phase();
        emitter.emit(&StatsSnapshot::starting(phase)).await;

        let accumulator = Arc::new(PhaseAccumulator::new());
        let phase_token = run_token.child_token();
        let aggregator = StatsAggregator::new(phase, accumulator.clone());

        let sampler_task = tokio::spawn(self.sampler.clone().run_loaded(
            self.settings.loaded_probe_interval,
            self.settings.window_capacity,
            accumulator.clone(),
            phase_token.clone(),
        ));

        let pool = self.pool.clone();
        let counter = accumulator.byte_counter();
        let pool_token = phase_token.clone();
        let streams = config.stream_count();
        let pool_task = tokio::spawn(async move { pool.run(direction, streams, counter, pool_token).await });

        let deadline = sleep(config.phase_duration());
        tokio::pin!(deadline);
        let mut ticker = interval(self.settings.report_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                _ = phase_token.cancelled() => break,
                _ = ticker.tick() => emitter.emit(&aggregator.running()).await,
            }
        }
        phase_token.cancel();

        // Final figures are only consistent once every task has exited
        let pool_report = match pool_task.await {
            Ok(report) => report,
            Err(e) => {
                self.log_task_failure(task_failure("load generator pool", phase, &e), emitter.run_id)
                    .await;
                PoolReport::default()
            }
        };
        let sampler_report = match sampler_task.await {
            Ok(report) => report,
            Err(e) => {
                self.log_task_failure(task_failure("latency sampler", phase, &e), emitter.run_id)
                    .await;
                SamplerReport::default()
            }
        };
        let complete = aggregator.complete(aggregator.elapsed());

        let failed = pool_report.failed_streams();
        if failed > 0 {
            let builder = self
                .logger
                .debug("Transfer streams ended with errors")
                .correlation_id(emitter.run_id)
                .field("phase", phase.wire_name())
                .field("failed_streams", failed);
            match pool_report.first_error() {
                Some(error) => builder.error_info(error).log().await,
                None => builder.log().await,
            }
        }
        self.logger
            .debug("Phase totals")
            .correlation_id(emitter.run_id)
            .field("phase", phase.wire_name())
            .field("total_bytes", accumulator.total_bytes())
            .field("attributed_bytes", pool_report.attributed_bytes())
            .field("probe_attempts", sampler_report.attempts)
            .field("probe_successes", sampler_report.successes)
            .log()
            .await;

        self.log_complete(&complete, emitter.run_id).await;
        emitter.emit(&complete).await;
        complete
    }

    async fn log_task_failure(&self, error: AppError, run_id: &str) {
        self.logger
            .error("Phase task failed")
            .correlation_id(run_id)
            .error_info(&error)
            .log()
            .await;
    }

    async fn log_complete(&self, snapshot: &StatsSnapshot, run_id: &str) {
        self.logger
            .info("Phase complete")
            .correlation_id(run_id)
            .snapshot(snapshot)
            .log()
            .await;
    }
}

/// A phase task that panicked or was aborted; its figures are lost
fn task_failure(task: &str, phase: Phase, error: &JoinError) -> AppError {
    AppError::test_execution(format!("{} task of the {} phase ended abnormally: {}", task, phase, error))
}

/// Publishes snapshots and turns a delivery failure into run cancellation
struct Emitter<'a> {
    publisher: &'a dyn SnapshotPublisher,
    run_token: CancellationToken,
    failed: AtomicBool,
    logger: &'a Logger,
    run_id: &'a str,
}

impl Emitter<'_> {
    async fn emit(&self, snapshot: &StatsSnapshot) {
        if self.failed.load(Ordering::Relaxed) {
            return;
        }

        if let Err(e) = self.publisher.publish(snapshot).await {
            self.failed.store(true, Ordering::Relaxed);
            self.run_token.cancel();
            self.logger
                .warn("Snapshot delivery failed, cancelling run")
                .correlation_id(self.run_id)
                .field("phase", snapshot.phase.wire_name())
                .error_info(&e)
                .log()
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.idle_probe_count, 20);
        assert_eq!(settings.idle_probe_delay, Duration::from_millis(50));
        assert_eq!(settings.loaded_probe_interval, Duration::from_millis(200));
        assert_eq!(settings.window_capacity, 10);
        assert_eq!(settings.report_interval, Duration::from_millis(100));
        assert_eq!(settings.settle_interval, Duration::from_millis(500));
        assert_eq!(settings.read_chunk_size, 65_536);
        assert_eq!(settings.upload_chunk_size, 1_048_576);
    }

    #[tokio::test]
    async fn test_panicked_task_is_execution_error() {
        let join_error = tokio::spawn(async { panic!("sampler blew up") }).await.unwrap_err();
        let error = task_failure("latency sampler", Phase::Upload, &join_error);

        assert!(matches!(error, AppError::TestExecution(_)));
        assert_eq!(error.exit_code(), 6);
        assert!(error.to_string().contains("latency sampler task of the upload phase"));
    }

    #[test]
    fn test_run_report_lookup() {
        let report = RunReport {
            run_id: "id".to_string(),
            completed: vec![aggregator::idle_complete(&IdleResult::default())],
            cancelled: false,
            delivery_failed: false,
        };
        assert!(report.phase(Phase::IdlePing).is_some());
        assert!(report.phase(Phase::Upload).is_none());
    }
}
