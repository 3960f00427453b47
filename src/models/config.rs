//! Application configuration data model and validation

use crate::{
    error::{AppError, Result},
    models::TestConfig,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host running the bulk-data endpoints
    #[serde(default = "default_target_host")]
    pub target_host: String,

    /// Port of the bulk-data endpoints
    #[serde(default = "default_target_port")]
    pub target_port: u16,

    /// Number of concurrent transfer streams per phase
    #[serde(default = "default_streams")]
    pub streams: u32,

    /// Duration of each load phase in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_seconds: u64,

    /// Port the `serve` command listens on
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_host: default_target_host(),
            target_port: default_target_port(),
            streams: default_streams(),
            duration_seconds: default_duration_secs(),
            server_port: default_server_port(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get phase duration as Duration
    pub fn phase_duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.target_host.trim().is_empty() {
            return Err(AppError::config("Target host cannot be empty"));
        }

        if self.target_port == 0 {
            return Err(AppError::config("Target port must be between 1 and 65535"));
        }

        if self.server_port == 0 {
            return Err(AppError::config("Server port must be between 1 and 65535"));
        }

        if self.streams == 0 {
            return Err(AppError::config("Stream count must be greater than 0"));
        }

        if self.streams > crate::defaults::MAX_STREAMS {
            return Err(AppError::config(format!(
                "Stream count cannot exceed {}",
                crate::defaults::MAX_STREAMS
            )));
        }

        if self.duration_seconds == 0 {
            return Err(AppError::config("Duration must be greater than 0"));
        }

        if self.duration_seconds > crate::defaults::MAX_DURATION_SECS {
            return Err(AppError::config(format!(
                "Duration cannot exceed {} seconds",
                crate::defaults::MAX_DURATION_SECS
            )));
        }

        Ok(())
    }

    /// Build the immutable per-run test configuration
    pub fn to_test_config(&self) -> Result<TestConfig> {
        TestConfig::new(
            self.target_host.clone(),
            self.target_port,
            self.streams,
            self.phase_duration(),
        )
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("TARGET_HOST") {
            let host = host.trim();
            if !host.is_empty() {
                self.target_host = host.to_string();
            }
        }

        if let Ok(port) = std::env::var("TARGET_PORT") {
            self.target_port = port.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid TARGET_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(streams) = std::env::var("STREAMS") {
            self.streams = streams.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid STREAMS value '{}': {}", streams, e)))?;
        }

        if let Ok(duration) = std::env::var("DURATION_SECONDS") {
            self.duration_seconds = duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid DURATION_SECONDS value '{}': {}", duration, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_target_host() -> String {
    crate::defaults::DEFAULT_TARGET_HOST.to_string()
}

fn default_target_port() -> u16 {
    crate::defaults::DEFAULT_TARGET_PORT
}

fn default_streams() -> u32 {
    crate::defaults::DEFAULT_STREAMS
}

fn default_duration_secs() -> u64 {
    crate::defaults::DEFAULT_DURATION.as_secs()
}

fn default_server_port() -> u16 {
    crate::defaults::DEFAULT_SERVER_PORT
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
