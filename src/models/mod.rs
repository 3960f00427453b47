//! Data models for test configuration, phases, snapshots and wire messages

pub mod config;
pub mod messages;
pub mod snapshot;
pub mod test_config;

pub use config::Config;
pub use messages::{ControlCommand, ControlMessage, StatsMessage};
pub use snapshot::{LatencySummary, Phase, SnapshotState, StatsSnapshot, TransferDirection};
pub use test_config::TestConfig;
