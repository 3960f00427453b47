//! Core formatting traits and the plain text implementation
//!
//! Console output is line oriented: `starting` and `complete` snapshots get
//! their own line, `running` snapshots redraw the current line with `\r`.

use crate::models::{Phase, SnapshotState, StatsSnapshot, TestConfig};

/// Turns snapshots into console text
pub trait SnapshotFormatter: Send + Sync {
    /// Banner printed before the first snapshot of a run
    fn format_run_header(&self, config: &TestConfig) -> String;

    /// Text for one snapshot, including any leading `\r` or newline
    fn format_snapshot(&self, snapshot: &StatsSnapshot) -> String;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> String;
}

/// Values a snapshot line needs, with absent fields read as zero
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineValues {
    pub speed: f64,
    pub ping: f64,
    pub jitter: f64,
    pub ping_min: f64,
    pub ping_max: f64,
    pub ping_avg: f64,
    pub jitter_max: f64,
}

impl From<&StatsSnapshot> for LineValues {
    fn from(snapshot: &StatsSnapshot) -> Self {
        let summary = snapshot.summary.unwrap_or_default();
        Self {
            speed: snapshot.throughput_gbps.unwrap_or(0.0),
            ping: snapshot.current_ping_ms.unwrap_or(0.0),
            jitter: snapshot.current_jitter_ms.unwrap_or(0.0),
            ping_min: summary.min_ms,
            ping_max: summary.max_ms,
            ping_avg: summary.avg_ms,
            jitter_max: summary.jitter_max_ms,
        }
    }
}

/// Plain text formatter for scripts, logs and terminals without color
#[derive(Debug, Clone, Default)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotFormatter for PlainFormatter {
    fn format_run_header(&self, config: &TestConfig) -> String {
        format!(
            "Target: {}\nConfiguration: {} streams, {}s duration per phase\n",
            config.authority(),
            config.stream_count(),
            config.phase_duration().as_secs()
        )
    }

    fn format_snapshot(&self, snapshot: &StatsSnapshot) -> String {
        let v = LineValues::from(snapshot);
        let tag = snapshot.phase.wire_name();

        match snapshot.state {
            SnapshotState::Starting => format!("\n[{}] Starting...\n", tag),
            SnapshotState::Running if snapshot.phase == Phase::IdlePing => {
                format!("\r[{}] Running... {:.1} ms", tag, v.ping)
            }
            SnapshotState::Running => format!(
                "\r[{}] Running... {:.2} Gbps | Ping: {:.1} ms | Jitter: {:.1} ms   ",
                tag, v.speed, v.ping, v.jitter
            ),
            SnapshotState::Complete if snapshot.phase == Phase::IdlePing => format!(
                "\r[{}] COMPLETE: {:.2} Gbps | Avg: {:.1} ms | Jitter: {:.1} ms\n",
                tag, v.speed, v.ping, v.jitter
            ),
            SnapshotState::Complete => format!(
                "\r[{}] COMPLETE: {:.2} Gbps | Latency Avg: {:.1} ms (Min: {:.0} / Max: {:.0}) | Max Jitter: {:.1} ms\n",
                tag, v.speed, v.ping_avg, v.ping_min, v.ping_max, v.jitter_max
            ),
            SnapshotState::Done => "\nTest Complete.\n".to_string(),
        }
    }

    fn format_warning(&self, warning: &str) -> String {
        format!("WARNING: {}\n", warning)
    }
}
