//! Control channel wire messages
//!
//! Requests travel as `{command, host, port, streams, duration}` JSON objects and
//! every emitted [`StatsSnapshot`] travels as one flat [`StatsMessage`]. `type`,
//! `state` and `speed` are always sent. Optional fields are omitted when absent
//! and default when missing, so older peers that drop zero values keep working.

use crate::{
    error::{AppError, Result},
    models::{LatencySummary, Phase, SnapshotState, StatsSnapshot, TestConfig},
};
use serde::{Deserialize, Serialize};

/// Commands understood by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
}

/// Request sent from a controller to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub command: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub streams: i64,
    /// Phase duration in seconds
    #[serde(default)]
    pub duration: i64,
}

impl ControlMessage {
    /// Build a `start` request for the given test configuration
    pub fn start(config: &TestConfig) -> Self {
        Self {
            command: "start".to_string(),
            host: config.target_host().to_string(),
            port: i64::from(config.target_port()),
            streams: i64::from(config.stream_count()),
            duration: config.phase_duration().as_secs() as i64,
        }
    }

    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Typed command, or an error for anything the agent does not understand
    pub fn command(&self) -> Result<ControlCommand> {
        match self.command.as_str() {
            "start" => Ok(ControlCommand::Start),
            other => Err(AppError::parse(format!("Unknown control command: '{}'", other))),
        }
    }

    /// Validated test configuration carried by a `start` request
    pub fn to_test_config(&self) -> Result<TestConfig> {
        TestConfig::from_wire(&self.host, self.port, self.streams, self.duration)
    }
}

/// Flat wire form of a [`StatsSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsMessage {
    #[serde(rename = "type")]
    pub phase: Phase,
    pub state: SnapshotState,
    /// Gbps; always sent, 0 while no time has elapsed
    #[serde(default)]
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_max: Option<f64>,
}

impl StatsMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl From<&StatsSnapshot> for StatsMessage {
    fn from(snapshot: &StatsSnapshot) -> Self {
        let summary = snapshot.summary.as_ref();
        Self {
            phase: snapshot.phase,
            state: snapshot.state,
            speed: snapshot.throughput_gbps.unwrap_or(0.0),
            ping: snapshot.current_ping_ms,
            jitter: snapshot.current_jitter_ms,
            ping_min: summary.map(|s| s.min_ms),
            ping_max: summary.map(|s| s.max_ms),
            ping_avg: summary.map(|s| s.avg_ms),
            jitter_max: summary.map(|s| s.jitter_max_ms),
        }
    }
}

impl From<StatsMessage> for StatsSnapshot {
    fn from(message: StatsMessage) -> Self {
        // Complete snapshots always carry a summary; missing fields were zero on the sender
        let summary = (message.state == SnapshotState::Complete).then(|| LatencySummary {
            min_ms: message.ping_min.unwrap_or(0.0),
            max_ms: message.ping_max.unwrap_or(0.0),
            avg_ms: message.ping_avg.unwrap_or(0.0),
            jitter_max_ms: message.jitter_max.unwrap_or(0.0),
        });

        Self {
            phase: message.phase,
            state: message.state,
            throughput_gbps: Some(message.speed),
            current_ping_ms: message.ping,
            current_jitter_ms: message.jitter,
            summary,
        }
    }
}
