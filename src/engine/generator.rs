//! Load generator pool
//!
//! Runs one transfer task per stream against a shared cancellation token and
//! only returns once every task has exited, so the byte total is final when
//! the caller reads it. A failing stream ends alone; it is never retried.

use super::accumulator::ByteCounter;
use crate::{
    error::AppError,
    models::TransferDirection,
    transport::Transport,
};
use bytes::Bytes;
use futures::Stream;
use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tokio::{io::AsyncReadExt, task::JoinSet};
use tokio_util::sync::CancellationToken;

/// Deterministic payload: byte `i` is `i mod 256`
pub fn pattern_chunk(len: usize) -> Bytes {
    (0..len).map(|i| (i % 256) as u8).collect::<Vec<u8>>().into()
}

/// How one transfer task ended
#[derive(Debug)]
pub struct StreamOutcome {
    /// Bytes this task added to the shared counter
    pub bytes: u64,
    pub error: Option<AppError>,
}

impl StreamOutcome {
    fn finished(bytes: u64) -> Self {
        Self { bytes, error: None }
    }

    fn failed(bytes: u64, error: AppError) -> Self {
        Self {
            bytes,
            error: Some(error),
        }
    }
}

/// Per-task results of one pool run
#[derive(Debug, Default)]
pub struct PoolReport {
    pub streams: Vec<StreamOutcome>,
    /// Tasks that panicked or were aborted; their bytes are not attributed
    pub lost_tasks: usize,
}

impl PoolReport {
    /// Sum of the bytes attributed to individual tasks
    pub fn attributed_bytes(&self) -> u64 {
        self.streams.iter().map(|s| s.bytes).sum()
    }

    pub fn failed_streams(&self) -> usize {
        self.streams.iter().filter(|s| s.error.is_some()).count() + self.lost_tasks
    }

    pub fn first_error(&self) -> Option<&AppError> {
        self.streams.iter().find_map(|s| s.error.as_ref())
    }
}

/// Spawns and joins the transfer tasks of a load phase
#[derive(Clone)]
pub struct LoadGeneratorPool {
    transport: Arc<dyn Transport>,
    read_chunk_size: usize,
    upload_chunk: Bytes,
}

impl LoadGeneratorPool {
    pub fn new(transport: Arc<dyn Transport>, read_chunk_size: usize, upload_chunk_size: usize) -> Self {
        Self {
            transport,
            read_chunk_size: read_chunk_size.max(1),
            upload_chunk: pattern_chunk(upload_chunk_size.max(1)),
        }
    }

    /// Run `streams` concurrent transfers until `cancel` fires or every stream has ended
    pub async fn run(
        &self,
        direction: TransferDirection,
        streams: u32,
        counter: ByteCounter,
        cancel: CancellationToken,
    ) -> PoolReport {
        let mut tasks = JoinSet::new();

        for _ in 0..streams {
            let transport = self.transport.clone();
            let counter = counter.clone();
            let cancel = cancel.clone();
            match direction {
                TransferDirection::Download => {
                    let chunk_size = self.read_chunk_size;
                    tasks.spawn(download_stream(transport, counter, cancel, chunk_size));
                }
                TransferDirection::Upload => {
                    let chunk = self.upload_chunk.clone();
                    tasks.spawn(upload_stream(transport, counter, cancel, chunk));
                }
            }
        }

        let mut report = PoolReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.streams.push(outcome),
                Err(_) => report.lost_tasks += 1,
            }
        }
        report
    }
}

async fn download_stream(
    transport: Arc<dyn Transport>,
    counter: ByteCounter,
    cancel: CancellationToken,
    chunk_size: usize,
) -> StreamOutcome {
    let mut reader = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StreamOutcome::finished(0),
        opened = transport.open_download() => match opened {
            Ok(reader) => reader,
            Err(e) => return StreamOutcome::failed(0, e),
        },
    };

    let mut buf = vec![0u8; chunk_size];
    let mut moved = 0u64;
    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(n) => {
                // A read that raced the deadline is not counted
                if cancel.is_cancelled() {
                    break;
                }
                counter.add(n as u64);
                moved += n as u64;
            }
            Err(e) => return StreamOutcome::failed(moved, e.into()),
        }
    }

    StreamOutcome::finished(moved)
}

async fn upload_stream(
    transport: Arc<dyn Transport>,
    counter: ByteCounter,
    cancel: CancellationToken,
    chunk: Bytes,
) -> StreamOutcome {
    let sent = Arc::new(AtomicU64::new(0));
    let body = CountingBody {
        chunk,
        counter,
        sent: sent.clone(),
        cancel: cancel.clone(),
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(()),
        result = transport.upload(Box::pin(body)) => result,
    };

    let moved = sent.load(Ordering::Relaxed);
    match result {
        Ok(()) => StreamOutcome::finished(moved),
        Err(e) => StreamOutcome::failed(moved, e),
    }
}

/// Endless upload body that counts each chunk as it is handed to the transport.
///
/// Bytes are counted when generated, not when acknowledged by the peer.
struct CountingBody {
    chunk: Bytes,
    counter: ByteCounter,
    sent: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl Stream for CountingBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }

        let len = self.chunk.len() as u64;
        self.counter.add(len);
        self.sent.fetch_add(len, Ordering::Relaxed);
        Poll::Ready(Some(Ok(self.chunk.clone())))
    }
}
