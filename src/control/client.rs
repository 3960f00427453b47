//! Controller side of the control channel

use super::control_url;
use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::{ControlMessage, StatsMessage, StatsSnapshot, TestConfig},
    output::SnapshotPublisher,
};
use futures::{SinkExt, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How a remote test ended
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOutcome {
    /// Snapshots received, in arrival order
    pub snapshots_received: usize,
    /// `done` arrived before the session ended
    pub completed: bool,
}

/// Starts a test on a remote agent and relays its snapshots
pub struct RemoteController {
    url: Url,
    connect_timeout: Duration,
    logger: Arc<Logger>,
}

impl RemoteController {
    /// Controller for the agent at `authority` ("host:port")
    pub fn new(authority: &str, connect_timeout: Duration, logger: Arc<Logger>) -> Result<Self> {
        Ok(Self {
            url: control_url(authority)?,
            connect_timeout,
            logger,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send `start` for `config` and publish every snapshot until `done`.
    ///
    /// Failing to connect is fatal. Undecodable frames are skipped. Cancelling
    /// `cancel` closes the session, which makes the agent stop the test.
    pub async fn run(
        &self,
        config: &TestConfig,
        publisher: &dyn SnapshotPublisher,
        cancel: CancellationToken,
    ) -> Result<RemoteOutcome> {
        let connect = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()));
        let (socket, _) = match connect.await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(AppError::control(format!("Failed to connect to agent {}: {}", self.url, e)));
            }
            Err(_) => {
                return Err(AppError::control(format!(
                    "Timed out connecting to agent {} after {:?}",
                    self.url, self.connect_timeout
                )));
            }
        };
        let (mut sink, mut frames) = socket.split();

        let start = serde_json::to_string(&ControlMessage::start(config))?;
        sink.send(Message::text(start)).await?;
        self.logger
            .info("Test initiated on agent")
            .field("agent", self.url.as_str())
            .field("target", config.authority())
            .log()
            .await;

        let mut outcome = RemoteOutcome {
            snapshots_received: 0,
            completed: false,
        };

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(outcome);
                }
                frame = frames.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let snapshot: StatsSnapshot = match StatsMessage::from_json(text.as_str()) {
                        Ok(message) => message.into(),
                        Err(e) => {
                            self.logger.debug("Skipping undecodable frame").error_info(&e).log().await;
                            continue;
                        }
                    };

                    outcome.snapshots_received += 1;
                    publisher.publish(&snapshot).await?;
                    if snapshot.is_done() {
                        outcome.completed = true;
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(outcome);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(AppError::control("Agent closed the session before the test completed"));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}
