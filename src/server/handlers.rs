//! HTTP handlers for the bulk-data endpoints
//!
//! - `GET /download`: repetition of the shared pattern buffer until shutdown
//! - `POST /upload`: drains and discards the body, then answers 200 (503 on shutdown)
//! - `GET|HEAD /ping`: empty 200 for round-trip timing

use super::ServerState;
use crate::control::agent;
use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{stream, StreamExt};
use std::convert::Infallible;

/// Minimal response used purely for round-trip timing
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

/// Streams the pattern buffer until the client disconnects or the server shuts down
pub async fn download(State(state): State<ServerState>) -> Response {
    let payload = state.payload.clone();
    // Graceful shutdown waits for open bodies, so this one must end on its own
    let chunks = stream::repeat_with(move || Ok::<_, Infallible>(payload.clone()))
        .take_until(state.shutdown.clone().cancelled_owned());
    let body = Body::from_stream(chunks);

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        body,
    )
        .into_response()
}

/// Accepts an upload stream and discards all data
pub async fn upload(State(state): State<ServerState>, body: Body) -> Response {
    let mut stream = body.into_data_stream();
    let mut received = 0u64;
    loop {
        let chunk = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => {
                return (StatusCode::SERVICE_UNAVAILABLE, "Server shutting down").into_response();
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };

        match chunk {
            Ok(bytes) => received += bytes.len() as u64,
            Err(e) => {
                // Clients abort uploads at the phase deadline; this is the normal end
                state
                    .logger
                    .debug("Upload stream ended early")
                    .field("received_bytes", received)
                    .field("error", e.to_string())
                    .log()
                    .await;
                return (StatusCode::BAD_REQUEST, format!("Error reading body: {e}")).into_response();
            }
        }
    }

    StatusCode::OK.into_response()
}

/// Upgrades `/control` to a WebSocket agent session
pub async fn control(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| agent::run_session(socket, state))
}
