//! Console and channel publishers

use super::{OutputFormatterFactory, SnapshotFormatter, SnapshotPublisher};
use crate::{
    error::{AppError, Result},
    models::{StatsSnapshot, TestConfig},
};
use async_trait::async_trait;
use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;

/// Renders snapshots as console lines
pub struct ConsoleRenderer {
    formatter: Box<dyn SnapshotFormatter>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleRenderer {
    /// Render to stdout, colored when `enable_color` is set
    pub fn stdout(enable_color: bool) -> Self {
        Self::with_writer(
            OutputFormatterFactory::create_formatter(enable_color),
            Box::new(io::stdout()),
        )
    }

    pub fn with_writer(formatter: Box<dyn SnapshotFormatter>, out: Box<dyn Write + Send>) -> Self {
        Self {
            formatter,
            out: Mutex::new(out),
        }
    }

    /// Print the run banner
    pub fn render_header(&self, config: &TestConfig) -> Result<()> {
        self.write_text(&self.formatter.format_run_header(config))
    }

    /// Print a warning line
    pub fn render_warning(&self, warning: &str) -> Result<()> {
        self.write_text(&self.formatter.format_warning(warning))
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut out = self.out.lock().map_err(|_| AppError::internal("console writer poisoned"))?;
        out.write_all(text.as_bytes())?;
        // Running lines end without a newline and must show up immediately
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotPublisher for ConsoleRenderer {
    async fn publish(&self, snapshot: &StatsSnapshot) -> Result<()> {
        self.write_text(&self.formatter.format_snapshot(snapshot))
    }
}

/// Snapshots buffered ahead of a slow consumer before `publish` waits
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Forwards snapshots to an async consumer; a full channel applies backpressure
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<StatsSnapshot>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel
    pub fn new() -> (Self, mpsc::Receiver<StatsSnapshot>) {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<StatsSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SnapshotPublisher for ChannelPublisher {
    async fn publish(&self, snapshot: &StatsSnapshot) -> Result<()> {
        self.tx
            .send(snapshot.clone())
            .await
            .map_err(|_| AppError::control("snapshot consumer has gone away"))
    }
}

/// Cloneable in-memory writer, used to capture console output
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output as lossy UTF-8
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.0.lock().map_err(|_| io::Error::other("buffer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
