//! Data server
//!
//! Exposes the bulk-data endpoints used by the measurement engine and the
//! `/control` WebSocket through which a remote controller starts tests on
//! this host.

pub mod handlers;

use crate::{
    engine::{pattern_chunk, EngineSettings},
    error::{AppError, Result},
    logging::Logger,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Size of the repeated `/download` payload
pub const DOWNLOAD_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Bind configuration of the data server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind to (e.g. "0.0.0.0" or "127.0.0.1")
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::defaults::DEFAULT_BIND_ADDR.to_string(),
            port: crate::defaults::DEFAULT_SERVER_PORT,
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as "host:port"
    pub fn addr(&self) -> String {
        if self.bind_addr.contains(':') && !self.bind_addr.starts_with('[') {
            format!("[{}]:{}", self.bind_addr, self.port)
        } else {
            format!("{}:{}", self.bind_addr, self.port)
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid bind address '{}': {}", self.addr(), e)))
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct ServerState {
    /// Pre-generated download payload, byte `i` is `i mod 256`
    pub payload: Bytes,
    /// Settings for tests started through `/control`
    pub engine_settings: EngineSettings,
    pub logger: Arc<Logger>,
    /// Cancelled on server shutdown; agent sessions derive their tokens from it
    pub shutdown: CancellationToken,
}

/// HTTP server for the bulk-data and control endpoints
pub struct DataServer {
    config: ServerConfig,
    state: ServerState,
}

impl DataServer {
    pub fn new(
        config: ServerConfig,
        engine_settings: EngineSettings,
        logger: Arc<Logger>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            state: ServerState {
                payload: pattern_chunk(DOWNLOAD_PAYLOAD_SIZE),
                engine_settings,
                logger,
                shutdown,
            },
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the router with all endpoints
    pub fn router(&self) -> Router {
        Router::new()
            .route("/download", get(handlers::download))
            .route("/upload", post(handlers::upload).layer(DefaultBodyLimit::disable()))
            .route("/ping", get(handlers::ping))
            .route("/control", get(handlers::control))
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::io(format!("Failed to bind to {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until the shutdown token fires
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        self.state
            .logger
            .info("Data server listening")
            .field("addr", local.to_string())
            .log()
            .await;

        let shutdown = self.state.shutdown.clone();
        let served = axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            crate::log_error!(self.state.logger, "Data server failed: {}", e);
            return Err(AppError::io(format!("Server error: {e}")));
        }

        crate::log_info!(self.state.logger, "Data server stopped on {}", local);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn start_server() -> (SocketAddr, CancellationToken) {
        let shutdown = CancellationToken::new();
        let server = DataServer::new(
            ServerConfig { bind_addr: "127.0.0.1".to_string(), port: 0 },
            EngineSettings::default(),
            Arc::new(Logger::quiet("SERVER")),
            shutdown.clone(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });
        (addr, shutdown)
    }

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig { bind_addr: "::".to_string(), port: 9000 };
        assert_eq!(config.addr(), "[::]:9000");
        assert!(config.socket_addr().is_ok());
        assert_eq!(ServerConfig::default().addr(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_ping_and_head() {
        let (addr, shutdown) = start_server().await;
        let client = reqwest::Client::new();

        let get = client.get(format!("http://{addr}/ping")).send().await.unwrap();
        assert_eq!(get.status(), 200);
        assert!(get.bytes().await.unwrap().is_empty());

        let head = client.head(format!("http://{addr}/ping")).send().await.unwrap();
        assert_eq!(head.status(), 200);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_download_streams_pattern() {
        let (addr, shutdown) = start_server().await;
        let mut response = reqwest::get(format!("http://{addr}/download")).await.unwrap();
        assert_eq!(response.headers()["content-type"], "application/octet-stream");
        assert_eq!(response.headers()["cache-control"], "no-cache, no-store, must-revalidate");

        let mut received = Vec::new();
        while received.len() < 2 * DOWNLOAD_PAYLOAD_SIZE {
            let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.extend_from_slice(&chunk);
        }
        assert!(received.iter().enumerate().all(|(i, &b)| b == (i % 256) as u8));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_upload_discards_body() {
        let (addr, shutdown) = start_server().await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/upload"))
            .body(vec![0u8; 8 * 1024 * 1024])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        shutdown.cancel();
    }
}
