//! HTTP transport built on reqwest

use super::{DownloadReader, Transport, UploadBody};
use crate::{
    engine::EngineSettings,
    error::{AppError, Result},
    models::TestConfig,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{header, Body, Client};
use std::time::{Duration, Instant};
use tokio_util::io::StreamReader;
use url::Url;

/// Talks to a data server exposing `/ping`, `/download` and `/upload`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    ping_url: Url,
    download_url: Url,
    upload_url: Url,
    probe_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the target of `config`
    pub fn new(config: &TestConfig, settings: &EngineSettings) -> Result<Self> {
        let base = Url::parse(&config.base_url())?;
        Self::with_base_url(base, settings)
    }

    /// Create a transport for an explicit base URL
    pub fn with_base_url(base: Url, settings: &EngineSettings) -> Result<Self> {
        // No overall request timeout: download and upload bodies run until cancelled
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .tcp_nodelay(true)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            ping_url: base.join("/ping")?,
            download_url: base.join("/download")?,
            upload_url: base.join("/upload")?,
            probe_timeout: settings.probe_timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self) -> Result<Duration> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.ping_url.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .timeout(self.probe_timeout)
            .send()
            .await?
            .error_for_status()?;

        // The round trip ends once the (empty) body is consumed
        response.bytes().await?;
        Ok(start.elapsed())
    }

    async fn open_download(&self) -> Result<DownloadReader> {
        let response = self
            .client
            .get(self.download_url.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }

    async fn upload(&self, body: UploadBody) -> Result<()> {
        self.client
            .post(self.upload_url.clone())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::wrap_stream(body))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn describe(&self) -> String {
        let host = self.ping_url.host_str().unwrap_or("unknown");
        match self.ping_url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}
