//! Immutable per-run test configuration

use crate::error::{AppError, Result};
use serde::Serialize;
use std::time::Duration;

/// Parameters of one test invocation.
///
/// Constructed once per run, either from local input ([`crate::models::Config`])
/// or from a remote `start` control message, and never mutated afterwards.
/// Construction enforces `stream_count >= 1` and `phase_duration > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestConfig {
    target_host: String,
    target_port: u16,
    stream_count: u32,
    phase_duration: Duration,
}

impl TestConfig {
    /// Create a validated test configuration
    pub fn new<S: Into<String>>(
        target_host: S,
        target_port: u16,
        stream_count: u32,
        phase_duration: Duration,
    ) -> Result<Self> {
        let target_host = target_host.into().trim().to_string();

        if target_host.is_empty() {
            return Err(AppError::validation("Target host cannot be empty"));
        }
        if target_port == 0 {
            return Err(AppError::validation("Target port must be between 1 and 65535"));
        }
        if stream_count == 0 {
            return Err(AppError::validation("Stream count must be at least 1"));
        }
        if stream_count > crate::defaults::MAX_STREAMS {
            return Err(AppError::validation(format!(
                "Stream count cannot exceed {}, got: {}",
                crate::defaults::MAX_STREAMS,
                stream_count
            )));
        }
        if phase_duration.is_zero() {
            return Err(AppError::validation("Phase duration must be greater than 0"));
        }
        if phase_duration > Duration::from_secs(crate::defaults::MAX_DURATION_SECS) {
            return Err(AppError::validation(format!(
                "Phase duration cannot exceed {} seconds",
                crate::defaults::MAX_DURATION_SECS
            )));
        }

        Ok(Self {
            target_host,
            target_port,
            stream_count,
            phase_duration,
        })
    }

    /// Create a configuration from loosely typed values, as received over the control channel
    pub fn from_wire(host: &str, port: i64, streams: i64, duration_secs: i64) -> Result<Self> {
        let port = u16::try_from(port)
            .map_err(|_| AppError::validation(format!("Port out of range: {}", port)))?;
        let streams = u32::try_from(streams)
            .map_err(|_| AppError::validation(format!("Stream count out of range: {}", streams)))?;
        let duration_secs = u64::try_from(duration_secs)
            .map_err(|_| AppError::validation(format!("Duration out of range: {}", duration_secs)))?;

        Self::new(host, port, streams, Duration::from_secs(duration_secs))
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    pub fn stream_count(&self) -> u32 {
        self.stream_count
    }

    pub fn phase_duration(&self) -> Duration {
        self.phase_duration
    }

    /// Base URL of the target's bulk-data endpoints
    pub fn base_url(&self) -> String {
        // Bare IPv6 literals need brackets inside a URL authority
        if self.target_host.contains(':') && !self.target_host.starts_with('[') {
            format!("http://[{}]:{}", self.target_host, self.target_port)
        } else {
            format!("http://{}:{}", self.target_host, self.target_port)
        }
    }

    /// `host:port` form used for display and the control channel
    pub fn authority(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }
}
