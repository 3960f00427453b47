//! Control channel
//!
//! A controller opens a WebSocket to an agent's `/control` endpoint and sends
//! one `start` [`ControlMessage`](crate::models::ControlMessage). The agent runs
//! the measurement engine against the requested target and pushes one
//! [`StatsMessage`](crate::models::StatsMessage) per snapshot, ending with `done`.

pub mod agent;
pub mod client;

pub use client::{RemoteController, RemoteOutcome};

use crate::error::{AppError, Result};
use url::Url;

/// Path of the control endpoint on an agent
pub const CONTROL_PATH: &str = "/control";

/// WebSocket URL of the agent at `authority` ("host:port")
pub fn control_url(authority: &str) -> Result<Url> {
    let authority = authority.trim();
    if authority.is_empty() {
        return Err(AppError::config("Agent address cannot be empty"));
    }

    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if !has_port {
        return Err(AppError::config(format!(
            "Agent address '{}' must include a port (host:port)",
            authority
        )));
    }

    Ok(Url::parse(&format!("ws://{}{}", authority, CONTROL_PATH))?)
}
