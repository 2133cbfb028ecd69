//! IPC response types.

use serde::{Deserialize, Serialize};

use crate::{ServiceStatus, TouchOutcome};

/// IPC response from service to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Session is running and the overlay is shown
    SessionStarted,
    /// Stop processed; `was_running` is false for a no-op stop
    SessionStopped { was_running: bool },
    /// A burst was scheduled
    CaptureQueued,
    /// Result of an overlay pointer event
    TouchHandled { outcome: TouchOutcome },
    /// Current service state
    Status(ServiceStatus),
    /// Unlock window opened until `expiry_ms`
    UnlockGranted { expiry_ms: i64 },
    /// Request failed
    Error { message: String },
}

impl Response {
    /// Build an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
