//! Error types for mirroring and frame capture.

use std::fmt;

/// Error type for capture operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Mirroring consent missing, expired or rejected
    ConsentInvalid(String),
    /// No frame arrived for a shot within its retry budget
    FrameTimeout { shot: u32, attempts: u32 },
    /// Raw frame layout could not be converted
    Conversion(String),
    /// The OS ended the mirroring session
    SessionRevoked,
    /// The frame sink was closed underneath the caller
    SinkClosed,
    /// All sink slots are held by unreleased frames
    TooManyAcquired { capacity: usize },
    /// No mirroring session is active
    NoSession,
    /// Platform-specific mirroring failure
    Platform(String),
}

impl CaptureError {
    /// Whether the error invalidates the whole session rather than one shot.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::SessionRevoked
                | CaptureError::SinkClosed
                | CaptureError::NoSession
                | CaptureError::ConsentInvalid(_)
        )
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::ConsentInvalid(msg) => write!(f, "Mirroring consent invalid: {}", msg),
            CaptureError::FrameTimeout { shot, attempts } => write!(
                f,
                "No frame for shot {} after {} attempts",
                shot, attempts
            ),
            CaptureError::Conversion(msg) => write!(f, "Frame conversion failed: {}", msg),
            CaptureError::SessionRevoked => write!(f, "Mirroring session revoked"),
            CaptureError::SinkClosed => write!(f, "Frame sink closed"),
            CaptureError::TooManyAcquired { capacity } => {
                write!(f, "All {} frame slots are in use", capacity)
            }
            CaptureError::NoSession => write!(f, "No mirroring session"),
            CaptureError::Platform(msg) => write!(f, "Platform error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}
