//! Stats aggregator: turns phase counters into snapshots

use super::{accumulator::PhaseAccumulator, sampler::IdleResult};
use crate::models::{Phase, StatsSnapshot};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Throughput in Gbps, `None` when no time has elapsed
pub fn throughput_gbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((bytes as f64 * 8.0) / 1e9 / secs)
}

/// Reads one load phase's shared state; never blocks transfer tasks
pub struct StatsAggregator {
    phase: Phase,
    accumulator: Arc<PhaseAccumulator>,
    started: Instant,
}

impl StatsAggregator {
    /// Start the phase clock now
    pub fn new(phase: Phase, accumulator: Arc<PhaseAccumulator>) -> Self {
        Self::started_at(phase, accumulator, Instant::now())
    }

    pub fn started_at(phase: Phase, accumulator: Arc<PhaseAccumulator>, started: Instant) -> Self {
        Self {
            phase,
            accumulator,
            started,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// In-phase snapshot at the current instant
    pub fn running(&self) -> StatsSnapshot {
        self.running_at(self.elapsed())
    }

    pub fn running_at(&self, elapsed: Duration) -> StatsSnapshot {
        let latest = self.accumulator.latest();
        StatsSnapshot::running(
            self.phase,
            throughput_gbps(self.accumulator.total_bytes(), elapsed),
            latest.map(|l| l.ping_ms),
            latest.map(|l| l.jitter_ms),
        )
    }

    /// Final snapshot; call only after the generator pool has joined
    pub fn complete(&self, elapsed: Duration) -> StatsSnapshot {
        let latest = self.accumulator.latest();
        StatsSnapshot::complete(
            self.phase,
            throughput_gbps(self.accumulator.total_bytes(), elapsed),
            latest.map(|l| l.ping_ms),
            latest.map(|l| l.jitter_ms),
            self.accumulator.summary(),
        )
    }
}

/// Idle-phase snapshot after one successful probe
pub fn idle_running(round_trip_ms: f64) -> StatsSnapshot {
    StatsSnapshot::running(Phase::IdlePing, Some(0.0), Some(round_trip_ms), None)
}

/// Idle-phase final snapshot: mean as ping, idle jitter as both jitter and jitter max
pub fn idle_complete(result: &IdleResult) -> StatsSnapshot {
    StatsSnapshot::complete(
        Phase::IdlePing,
        Some(0.0),
        Some(result.mean_ms),
        Some(result.jitter_ms),
        result.summary(),
    )
}
