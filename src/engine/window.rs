//! Bounded sliding window of recent round-trip times

use std::collections::VecDeque;

/// Most recent round-trip times of a phase, oldest first.
///
/// Jitter here is `max - min` over the window contents, not a successive
/// difference metric; reported numbers depend on keeping it that way.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    /// Create an empty window; a capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a round-trip time, evicting the oldest entry when full
    pub fn push(&mut self, round_trip_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(round_trip_ms);
    }

    /// `max - min` of the window, 0 while fewer than two samples are held
    pub fn jitter(&self) -> f64 {
        if self.samples.len() <= 1 {
            return 0.0;
        }

        let (min, max) = self.samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        );
        max - min
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window contents, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}
