//! Shared types for the capture service and its clients.

use serde::{Deserialize, Deserializer, Serialize};

/// Encoded image format for saved screenshots.
///
/// Serialized lowercase. Deserialization goes through [`ImageFormat::parse`],
/// so `"PNG"`, `"JPEG"` and `"jpg"` are accepted and unknown names fall back
/// to PNG instead of failing the surrounding document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG (default)
    #[default]
    Png,
    /// JPEG, honoring the configured quality
    Jpeg,
}

impl ImageFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// MIME type recorded in shared storage.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Parse from string (case-insensitive). Unknown values are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ImageFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ImageFormat::parse(&name).unwrap_or_default())
    }
}

/// Visibility of the floating capture control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayVisibility {
    /// Not registered with the window system
    Removed,
    /// Registered and visible
    Shown,
    /// Registered but invisible (during a capture)
    Hidden,
}

/// Why a capture session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Stop requested by the user or a client
    User,
    /// The unlock window elapsed
    UnlockExpired,
    /// The OS ended the mirroring session
    SessionRevoked,
    /// The service process is shutting down
    Shutdown,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::User => write!(f, "user request"),
            StopReason::UnlockExpired => write!(f, "unlock window expired"),
            StopReason::SessionRevoked => write!(f, "mirroring session revoked"),
            StopReason::Shutdown => write!(f, "service shutdown"),
        }
    }
}

/// Pointer phase delivered by the overlay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// What a touch event resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchOutcome {
    /// Nothing user-visible happened (press, sub-threshold move)
    Ignored,
    /// The control followed the pointer
    Dragged,
    /// A drag ended and the control snapped to a screen edge
    Snapped,
    /// A tap was recognized and a capture was requested
    CaptureRequested,
}

/// Snapshot of the service state, polled by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Whether a capture session is active
    pub running: bool,
    /// Overlay visibility
    pub overlay: OverlayVisibility,
    /// Stored unlock expiry (epoch ms, 0 = locked)
    pub unlock_expiry_ms: i64,
    /// Time left in the unlock window by the service clock (0 = locked)
    pub unlock_remaining_ms: u64,
    /// Whether the unlock window gates capture at all
    pub ad_required: bool,
}
