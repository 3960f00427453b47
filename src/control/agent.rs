//! Agent side of the control channel
//!
//! One session per WebSocket connection. Each text frame is parsed as a
//! [`ControlMessage`]; anything malformed, unknown or invalid is logged and
//! dropped. While a test is running further `start` requests are dropped.
//! Closing the socket (or shutting the server down) cancels the running test.

use crate::{
    engine::{MeasurementEngine, RunReport},
    error::{AppError, Result},
    models::{ControlCommand, ControlMessage, StatsMessage, TestConfig},
    output::ChannelPublisher,
    server::ServerState,
    transport::HttpTransport,
};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Drive one control session until the peer goes away
pub async fn run_session(socket: WebSocket, state: ServerState) {
    let session_token = state.shutdown.child_token();
    let (mut sink, mut frames) = socket.split();
    let (publisher, mut snapshots) = ChannelPublisher::new();

    crate::log_info!(state.logger, "Control session opened");

    // Single writer: snapshots are forwarded in emission order
    let writer_logger = state.logger.clone();
    let writer = tokio::spawn(async move {
        while let Some(snapshot) = snapshots.recv().await {
            let json = match StatsMessage::from(&snapshot).to_json() {
                Ok(json) => json,
                Err(e) => {
                    writer_logger.error("Failed to encode snapshot").error_info(&e).log().await;
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(json.into())).await {
                writer_logger
                    .debug("Control session write failed")
                    .field("error", e.to_string())
                    .log()
                    .await;
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut running: Option<JoinHandle<RunReport>> = None;
    loop {
        let frame = tokio::select! {
            biased;
            _ = session_token.cancelled() => break,
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let busy = running.as_ref().is_some_and(|task| !task.is_finished());
                match accept_start(text.as_str(), busy) {
                    Ok(config) => {
                        state
                            .logger
                            .info("Starting test from control channel")
                            .field("target", config.authority())
                            .field("streams", config.stream_count())
                            .field("duration_secs", config.phase_duration().as_secs())
                            .log()
                            .await;
                        match spawn_run(&state, config, publisher.clone(), session_token.child_token()) {
                            Ok(task) => running = Some(task),
                            Err(e) => {
                                state.logger.warn("Could not start test").error_info(&e).log().await;
                            }
                        }
                    }
                    Err(e) => {
                        state
                            .logger
                            .warn("Dropped control message")
                            .error_info(&e)
                            .log()
                            .await;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                state
                    .logger
                    .debug("Control session read failed")
                    .field("error", e.to_string())
                    .log()
                    .await;
                break;
            }
        }
    }

    session_token.cancel();
    if let Some(task) = running {
        let _ = task.await;
    }
    drop(publisher);
    let _ = writer.await;

    crate::log_info!(state.logger, "Control session closed");
}

/// Validate one text frame as a `start` request
fn accept_start(raw: &str, busy: bool) -> Result<TestConfig> {
    let message = ControlMessage::parse(raw)?;
    match message.command()? {
        ControlCommand::Start if busy => Err(AppError::control("A test is already running on this session")),
        ControlCommand::Start => message.to_test_config(),
    }
}

fn spawn_run(
    state: &ServerState,
    config: TestConfig,
    publisher: ChannelPublisher,
    cancel: CancellationToken,
) -> Result<JoinHandle<RunReport>> {
    let transport = HttpTransport::new(&config, &state.engine_settings)?;
    let engine = MeasurementEngine::new(Arc::new(transport), state.engine_settings.clone(), state.logger.clone());

    Ok(tokio::spawn(async move { engine.run(&config, &publisher, cancel).await }))
}
