//! Snapshot publishing and console display
//!
//! The measurement engine reports through the [`SnapshotPublisher`] capability.
//! Local runs render to the terminal with [`ConsoleRenderer`]; the agent hands
//! snapshots to its WebSocket writer through a [`ChannelPublisher`].

mod colored;
mod formatter;
mod publisher;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{PlainFormatter, SnapshotFormatter};
pub use publisher::{ChannelPublisher, ConsoleRenderer, SharedBuffer, DEFAULT_CHANNEL_CAPACITY};

use crate::{error::Result, models::StatsSnapshot};
use async_trait::async_trait;

/// Destination for the snapshots of a test run
#[async_trait]
pub trait SnapshotPublisher: Send + Sync {
    /// Deliver one snapshot; an error means the destination is gone
    async fn publish(&self, snapshot: &StatsSnapshot) -> Result<()>;
}

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool) -> Box<dyn SnapshotFormatter> {
        if enable_color {
            Box::new(ColoredFormatter::new())
        } else {
            Box::new(PlainFormatter::new())
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn SnapshotFormatter> {
        Self::create_formatter(false)
    }
}
