//! Errors surfaced by the capture service façade.

use crate::capture::CaptureError;
use crate::overlay::OverlayError;
use std::fmt;

/// Error type for service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No capture session is active
    NotRunning,
    /// A capture session is already active
    AlreadyRunning,
    /// Capture needs an unlock that is not active
    CaptureLocked,
    Capture(CaptureError),
    Overlay(OverlayError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotRunning => write!(f, "Capture session is not running"),
            ServiceError::AlreadyRunning => write!(f, "Capture session is already running"),
            ServiceError::CaptureLocked => {
                write!(f, "Capture is locked until an unlock is granted")
            }
            ServiceError::Capture(e) => write!(f, "{}", e),
            ServiceError::Overlay(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Capture(e) => Some(e),
            ServiceError::Overlay(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CaptureError> for ServiceError {
    fn from(err: CaptureError) -> Self {
        ServiceError::Capture(err)
    }
}

impl From<OverlayError> for ServiceError {
    fn from(err: OverlayError) -> Self {
        ServiceError::Overlay(err)
    }
}
