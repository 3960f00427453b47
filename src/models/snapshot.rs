//! Phase state machine values and point-in-time statistics snapshots

use serde::{Deserialize, Serialize};

/// One stage of a test run, in strict execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Latency baseline with no concurrent load
    #[serde(rename = "ping")]
    IdlePing,
    /// Multi-stream download under load
    Download,
    /// Multi-stream upload under load
    Upload,
    /// Terminal sentinel
    Done,
}

impl Phase {
    /// Every phase in run order
    pub const SEQUENCE: [Phase; 4] = [Phase::IdlePing, Phase::Download, Phase::Upload, Phase::Done];

    /// The phase that follows this one, `None` for the terminal phase
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::IdlePing => Some(Phase::Download),
            Phase::Download => Some(Phase::Upload),
            Phase::Upload => Some(Phase::Done),
            Phase::Done => None,
        }
    }

    /// Name used on the control channel
    pub fn wire_name(self) -> &'static str {
        match self {
            Phase::IdlePing => "ping",
            Phase::Download => "download",
            Phase::Upload => "upload",
            Phase::Done => "done",
        }
    }

    /// Transfer direction for load phases
    pub fn direction(self) -> Option<TransferDirection> {
        match self {
            Phase::Download => Some(TransferDirection::Download),
            Phase::Upload => Some(TransferDirection::Upload),
            Phase::IdlePing | Phase::Done => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Done
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Direction of a load generator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Download,
    Upload,
}

impl TransferDirection {
    pub fn phase(self) -> Phase {
        match self {
            TransferDirection::Download => Phase::Download,
            TransferDirection::Upload => Phase::Upload,
        }
    }
}

/// Lifecycle state of a snapshot within its phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Starting,
    Running,
    Complete,
    Done,
}

impl SnapshotState {
    pub fn wire_name(self) -> &'static str {
        match self {
            SnapshotState::Starting => "starting",
            SnapshotState::Running => "running",
            SnapshotState::Complete => "complete",
            SnapshotState::Done => "done",
        }
    }
}

/// Whole-phase latency figures, only reported on `complete` snapshots
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub jitter_max_ms: f64,
}

/// One reported instant of phase statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub phase: Phase,
    pub state: SnapshotState,
    /// `None` when no time has elapsed yet
    pub throughput_gbps: Option<f64>,
    pub current_ping_ms: Option<f64>,
    pub current_jitter_ms: Option<f64>,
    pub summary: Option<LatencySummary>,
}

impl StatsSnapshot {
    /// Phase entry snapshot
    pub fn starting(phase: Phase) -> Self {
        Self {
            phase,
            state: SnapshotState::Starting,
            throughput_gbps: Some(0.0),
            current_ping_ms: None,
            current_jitter_ms: None,
            summary: None,
        }
    }

    /// Periodic in-phase snapshot; never carries the whole-phase summary
    pub fn running(
        phase: Phase,
        throughput_gbps: Option<f64>,
        current_ping_ms: Option<f64>,
        current_jitter_ms: Option<f64>,
    ) -> Self {
        Self {
            phase,
            state: SnapshotState::Running,
            throughput_gbps,
            current_ping_ms,
            current_jitter_ms,
            summary: None,
        }
    }

    /// Final snapshot of a phase
    pub fn complete(
        phase: Phase,
        throughput_gbps: Option<f64>,
        current_ping_ms: Option<f64>,
        current_jitter_ms: Option<f64>,
        summary: LatencySummary,
    ) -> Self {
        Self {
            phase,
            state: SnapshotState::Complete,
            throughput_gbps,
            current_ping_ms,
            current_jitter_ms,
            summary: Some(summary),
        }
    }

    /// Terminal sentinel emitted once per run
    pub fn done() -> Self {
        Self {
            phase: Phase::Done,
            state: SnapshotState::Done,
            throughput_gbps: Some(0.0),
            current_ping_ms: None,
            current_jitter_ms: None,
            summary: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == SnapshotState::Done
    }
}
