//! IPC request types.

use serde::{Deserialize, Serialize};

use crate::TouchAction;

/// Longest accepted consent payload.
pub const MAX_CONSENT_LEN: usize = 4096;

/// Largest accepted absolute pointer coordinate.
const MAX_COORDINATE: f32 = 100_000.0;

/// IPC request from client to service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    // === Session Control ===
    /// Start a capture session with the system-granted mirroring consent
    StartSession { consent: String },
    /// Stop the current session (idempotent)
    StopSession,

    // === Capture ===
    /// Trigger one burst, equivalent to tapping the overlay
    Capture,
    /// Forward a pointer event from the overlay window
    OverlayTouch { action: TouchAction, x: f32, y: f32 },

    // === State ===
    /// Poll the running flag and related state
    GetStatus,
    /// Record a completed reward and open the unlock window
    GrantUnlock,
}

/// Request validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Consent payload empty or too long
    InvalidConsent(String),
    /// Pointer coordinates not finite or out of range
    InvalidCoordinates(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidConsent(msg) => write!(f, "invalid consent: {}", msg),
            ValidationError::InvalidCoordinates(msg) => {
                write!(f, "invalid coordinates: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl Request {
    /// Check request parameters before dispatch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Request::StartSession { consent } => {
                if consent.trim().is_empty() {
                    return Err(ValidationError::InvalidConsent("empty".to_string()));
                }
                if consent.len() > MAX_CONSENT_LEN {
                    return Err(ValidationError::InvalidConsent(format!(
                        "{} bytes (max {})",
                        consent.len(),
                        MAX_CONSENT_LEN
                    )));
                }
                Ok(())
            }
            Request::OverlayTouch { x, y, .. } => {
                for value in [x, y] {
                    if !value.is_finite() || value.abs() > MAX_COORDINATE {
                        return Err(ValidationError::InvalidCoordinates(format!(
                            "({}, {})",
                            x, y
                        )));
                    }
                }
                Ok(())
            }
            Request::StopSession | Request::Capture | Request::GetStatus | Request::GrantUnlock => {
                Ok(())
            }
        }
    }
}
