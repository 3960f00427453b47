//! Network Speed Tester
//!
//! Measures download/upload throughput together with idle and loaded latency
//! between a client and a data server. One measurement engine drives every test;
//! it renders to the console for local runs and pushes snapshots over a
//! WebSocket control channel when started remotely through an agent.

pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use engine::{EngineSettings, MeasurementEngine};
pub use error::{AppError, Result};
pub use models::{Config, Phase, SnapshotState, StatsSnapshot, TestConfig};
pub use output::{ChannelPublisher, ConsoleRenderer, SnapshotPublisher};
pub use transport::{HttpTransport, Transport};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata set by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_TARGET_HOST: &str = "127.0.0.1";
    pub const DEFAULT_TARGET_PORT: u16 = 8080;
    pub const DEFAULT_STREAMS: u32 = 16;
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_SERVER_PORT: u16 = 8080;
    pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const MAX_STREAMS: u32 = 256;
    pub const MAX_DURATION_SECS: u64 = 3600;

    /// Stream counts above this trigger an advisory warning
    pub const HIGH_STREAM_WARNING: u32 = 64;
    /// Phase durations above this trigger an advisory warning
    pub const LONG_DURATION_WARNING_SECS: u64 = 300;
}
