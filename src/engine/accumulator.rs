//! Per-phase shared counters
//!
//! The byte counter is a lock-free atomic shared by every transfer task. The
//! latency aggregates and the published (ping, jitter) pair sit behind their own
//! narrow mutex, written only by the sampler at tick rate, so transfer tasks
//! never contend with it.

use crate::models::LatencySummary;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

/// Shared total of bytes moved in one phase
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latest probe result and the window jitter computed with it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestLatency {
    pub ping_ms: f64,
    pub jitter_ms: f64,
}

/// Whole-phase latency aggregates
#[derive(Debug, Clone, Default)]
struct LatencyTotals {
    min_ms: Option<f64>,
    max_ms: f64,
    sum_ms: f64,
    count: u64,
    jitter_max_ms: f64,
    latest: Option<LatestLatency>,
}

/// State shared between the transfer tasks, the sampler and the reporter of one phase
#[derive(Debug, Default)]
pub struct PhaseAccumulator {
    bytes: ByteCounter,
    latency: Mutex<LatencyTotals>,
}

impl PhaseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle given to transfer tasks
    pub fn byte_counter(&self) -> ByteCounter {
        self.bytes.clone()
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes.get()
    }

    /// Record one successful probe and publish it together with the current window jitter
    pub fn record_latency(&self, round_trip_ms: f64, window_jitter_ms: f64) {
        let mut totals = self.totals();
        totals.min_ms = Some(totals.min_ms.map_or(round_trip_ms, |m| m.min(round_trip_ms)));
        totals.max_ms = totals.max_ms.max(round_trip_ms);
        totals.sum_ms += round_trip_ms;
        totals.count += 1;
        totals.jitter_max_ms = totals.jitter_max_ms.max(window_jitter_ms);
        totals.latest = Some(LatestLatency {
            ping_ms: round_trip_ms,
            jitter_ms: window_jitter_ms,
        });
    }

    /// Most recently published (ping, jitter) pair, if any probe succeeded
    pub fn latest(&self) -> Option<LatestLatency> {
        self.totals().latest
    }

    pub fn sample_count(&self) -> u64 {
        self.totals().count
    }

    /// Whole-phase figures; all zero when no probe succeeded
    pub fn summary(&self) -> LatencySummary {
        let totals = self.totals();
        let avg_ms = if totals.count > 0 {
            totals.sum_ms / totals.count as f64
        } else {
            0.0
        };

        LatencySummary {
            min_ms: totals.min_ms.unwrap_or(0.0),
            max_ms: totals.max_ms,
            avg_ms,
            jitter_max_ms: totals.jitter_max_ms,
        }
    }

    fn totals(&self) -> MutexGuard<'_, LatencyTotals> {
        // Totals stay consistent even if a holder panicked mid-update
        self.latency.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
