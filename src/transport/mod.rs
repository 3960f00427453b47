//! Transport adapters for the bulk-data and latency endpoints
//!
//! The engine only sees the [`Transport`] trait: one minimal round trip, one
//! unbounded download body and one streamed upload. [`HttpTransport`] maps these
//! onto `GET /ping`, `GET /download` and `POST /upload`.

pub mod http;

pub use http::HttpTransport;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{pin::Pin, time::Duration};
use tokio::io::AsyncRead;

/// Response body of one download stream
pub type DownloadReader = Pin<Box<dyn AsyncRead + Send>>;

/// Request body of one upload stream
pub type UploadBody = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// Access to the endpoints a measurement runs against
#[async_trait]
pub trait Transport: Send + Sync {
    /// One minimal round trip; returns the measured round-trip time
    async fn probe(&self) -> Result<Duration>;

    /// Open an effectively unbounded download body
    async fn open_download(&self) -> Result<DownloadReader>;

    /// Send `body` until it ends; resolves once the peer has answered
    async fn upload(&self, body: UploadBody) -> Result<()>;

    /// Human-readable target, used in logs
    fn describe(&self) -> String;
}
