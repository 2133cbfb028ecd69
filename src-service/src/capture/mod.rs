//! Screen mirroring for the capture service.
//!
//! The OS mirroring facility is abstracted behind [`MirrorFacility`],
//! [`MirrorHandle`] and [`OutputTarget`]; a platform backend is selected
//! at compile time.

pub mod convert;
pub mod error;
pub mod session;
pub mod sink;
pub mod types;

#[cfg(feature = "xcap")]
pub mod desktop;

pub use convert::frame_to_image;
pub use error::CaptureError;
pub use session::MirrorSession;
pub use sink::{AcquiredFrame, FrameSink};
pub use types::{ConsentToken, DisplayBounds, RawFrame, BASELINE_DENSITY_DPI};

/// Invoked when the OS ends a mirroring session on its own.
pub type RevokeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// The OS facility that turns a consent token into a mirroring handle.
pub trait MirrorFacility: Send + Sync {
    /// Open a mirroring handle. `on_revoked` must be called if the OS
    /// later terminates the session (e.g. the user withdraws consent).
    fn open(
        &self,
        consent: &ConsentToken,
        on_revoked: RevokeCallback,
    ) -> Result<Box<dyn MirrorHandle>, CaptureError>;
}

/// A granted mirroring capability.
pub trait MirrorHandle: Send + Sync {
    /// Create a virtual output of `bounds` that renders mirrored frames
    /// into `sink` until released.
    fn create_output_target(
        &self,
        name: &str,
        bounds: DisplayBounds,
        sink: FrameSink,
    ) -> Result<Box<dyn OutputTarget>, CaptureError>;

    /// Give the capability back to the OS.
    fn stop(&self);
}

/// A virtual display rendering into a frame sink.
pub trait OutputTarget: Send + Sync {
    /// Stop rendering and free the target.
    fn release(&self);
}

/// Facility used when the build has no mirroring backend.
pub struct UnavailableFacility;

impl MirrorFacility for UnavailableFacility {
    fn open(
        &self,
        _consent: &ConsentToken,
        _on_revoked: RevokeCallback,
    ) -> Result<Box<dyn MirrorHandle>, CaptureError> {
        Err(CaptureError::ConsentInvalid(
            "no screen mirroring backend in this build (enable the `xcap` feature)".to_string(),
        ))
    }
}

/// Get the platform mirroring facility.
#[cfg(feature = "xcap")]
pub fn platform_facility() -> Box<dyn MirrorFacility> {
    Box::new(desktop::DesktopMirror::new())
}

/// Get the platform mirroring facility.
#[cfg(not(feature = "xcap"))]
pub fn platform_facility() -> Box<dyn MirrorFacility> {
    Box::new(UnavailableFacility)
}

/// Primary display bounds as reported by the platform, if known.
#[cfg(feature = "xcap")]
pub fn probe_display_bounds() -> Option<DisplayBounds> {
    desktop::primary_bounds()
}

/// Primary display bounds as reported by the platform, if known.
#[cfg(not(feature = "xcap"))]
pub fn probe_display_bounds() -> Option<DisplayBounds> {
    None
}
