//! Latency sampler
//!
//! Probes are produced as a lazy stream that ends when its cancellation token
//! fires. A failed or timed-out probe yields `None` for that slot and never
//! stops the stream.

use super::{accumulator::PhaseAccumulator, window::LatencyWindow};
use crate::{models::LatencySummary, transport::Transport};
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One successful round-trip measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    /// Position of the probe within its stream, failed probes included
    pub ordinal: u64,
    pub round_trip_ms: f64,
}

/// How probes are spaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSchedule {
    /// Fixed pause after each probe completes
    Paced(Duration),
    /// Fixed tick; a tick missed by a slow probe is skipped
    Ticked(Duration),
}

/// Issues round-trip probes against a [`Transport`]
#[derive(Clone)]
pub struct LatencySampler {
    transport: Arc<dyn Transport>,
    probe_timeout: Duration,
}

impl LatencySampler {
    pub fn new(transport: Arc<dyn Transport>, probe_timeout: Duration) -> Self {
        Self {
            transport,
            probe_timeout,
        }
    }

    /// One probe in milliseconds; `None` on failure, timeout or cancellation
    pub async fn probe_once(&self, cancel: &CancellationToken) -> Option<f64> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(self.probe_timeout, self.transport.probe()) => match result {
                Ok(Ok(rtt)) => Some(rtt.as_secs_f64() * 1000.0),
                Ok(Err(_)) | Err(_) => None,
            },
        }
    }

    /// Unbounded stream of probe outcomes, ending once `cancel` fires
    pub fn samples(
        &self,
        schedule: ProbeSchedule,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Option<LatencySample>> {
        let state = ProbeState {
            sampler: self.clone(),
            schedule,
            cancel,
            ticker: None,
            ordinal: 0,
        };

        stream::unfold(state, |mut state| async move {
            if !state.wait_turn().await {
                return None;
            }

            let ordinal = state.ordinal;
            state.ordinal += 1;
            let round_trip = state.sampler.probe_once(&state.cancel).await;
            if state.cancel.is_cancelled() {
                return None;
            }

            let sample = round_trip.map(|round_trip_ms| LatencySample {
                ordinal,
                round_trip_ms,
            });
            Some((sample, state))
        })
        .boxed()
    }

    /// Idle mode: `count` probes spaced by `delay`, no concurrent load
    pub fn idle_samples(
        &self,
        count: usize,
        delay: Duration,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Option<LatencySample>> {
        self.samples(ProbeSchedule::Paced(delay), cancel).take(count).boxed()
    }

    /// Run idle mode to completion and summarise it
    pub async fn run_idle(&self, count: usize, delay: Duration, cancel: CancellationToken) -> IdleResult {
        self.idle_samples(count, delay, cancel)
            .fold(IdleTally::default(), |mut tally, outcome| async move {
                tally.record(outcome.as_ref());
                tally
            })
            .await
            .finish()
    }

    /// Loaded mode: probe on every tick until `cancel` fires, publishing into `accumulator`
    pub async fn run_loaded(
        self,
        period: Duration,
        window_capacity: usize,
        accumulator: Arc<PhaseAccumulator>,
        cancel: CancellationToken,
    ) -> SamplerReport {
        let mut window = LatencyWindow::new(window_capacity);
        let mut report = SamplerReport::default();
        let mut samples = self.samples(ProbeSchedule::Ticked(period), cancel);

        while let Some(outcome) = samples.next().await {
            report.attempts += 1;
            if let Some(sample) = outcome {
                window.push(sample.round_trip_ms);
                accumulator.record_latency(sample.round_trip_ms, window.jitter());
                report.successes += 1;
            }
        }

        report
    }
}

struct ProbeState {
    sampler: LatencySampler,
    schedule: ProbeSchedule,
    cancel: CancellationToken,
    ticker: Option<Interval>,
    ordinal: u64,
}

impl ProbeState {
    /// Wait until the next probe is due; `false` once cancelled
    async fn wait_turn(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        match self.schedule {
            ProbeSchedule::Paced(delay) => {
                if self.ordinal == 0 {
                    return true;
                }
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => false,
                    _ = sleep(delay) => true,
                }
            }
            ProbeSchedule::Ticked(period) => {
                let ticker = self.ticker.get_or_insert_with(|| {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    ticker
                });
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => false,
                    _ = ticker.tick() => true,
                }
            }
        }
    }
}

/// Probe counts of one loaded sampling run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerReport {
    pub attempts: u64,
    pub successes: u64,
}

/// Running aggregates over all idle probes
#[derive(Debug, Clone, Default)]
pub struct IdleTally {
    min_ms: Option<f64>,
    max_ms: f64,
    sum_ms: f64,
    successes: u64,
    attempts: u64,
}

impl IdleTally {
    /// Record one probe outcome
    pub fn record(&mut self, outcome: Option<&LatencySample>) {
        self.attempts += 1;
        if let Some(sample) = outcome {
            let rtt = sample.round_trip_ms;
            self.min_ms = Some(self.min_ms.map_or(rtt, |m| m.min(rtt)));
            self.max_ms = self.max_ms.max(rtt);
            self.sum_ms += rtt;
            self.successes += 1;
        }
    }

    pub fn finish(&self) -> IdleResult {
        if self.successes == 0 {
            return IdleResult {
                attempts: self.attempts,
                ..IdleResult::default()
            };
        }

        let min_ms = self.min_ms.unwrap_or(0.0);
        IdleResult {
            mean_ms: self.sum_ms / self.successes as f64,
            jitter_ms: self.max_ms - min_ms,
            min_ms,
            max_ms: self.max_ms,
            successes: self.successes,
            attempts: self.attempts,
        }
    }
}

/// Outcome of the idle phase; all figures are zero when no probe succeeded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdleResult {
    pub mean_ms: f64,
    /// `max - min` over every successful idle probe
    pub jitter_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub successes: u64,
    pub attempts: u64,
}

impl IdleResult {
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            avg_ms: self.mean_ms,
            jitter_max_ms: self.jitter_ms,
        }
    }
}
