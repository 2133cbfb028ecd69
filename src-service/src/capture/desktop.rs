//! Desktop screen mirror built on xcap.
//!
//! Consent is implicit on desktop (the OS prompts on first capture), so the
//! token only has to be present. Each output target runs a worker thread
//! that grabs the primary monitor and feeds the frame sink until released.

use super::error::CaptureError;
use super::sink::FrameSink;
use super::types::{ConsentToken, DisplayBounds, RawFrame, BASELINE_DENSITY_DPI};
use super::{MirrorFacility, MirrorHandle, OutputTarget, RevokeCallback};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay between grabs; xcap is far slower than a compositor mirror.
const GRAB_INTERVAL: Duration = Duration::from_millis(40);

/// Consecutive grab failures after which the session counts as revoked.
const MAX_GRAB_FAILURES: u32 = 25;

fn grab_primary() -> Result<RawFrame, String> {
    let monitors = xcap::Monitor::all().map_err(|e| e.to_string())?;
    let monitor = monitors
        .into_iter()
        .next()
        .ok_or_else(|| "no monitors found".to_string())?;
    let image = monitor.capture_image().map_err(|e| e.to_string())?;
    let (width, height) = (image.width(), image.height());
    Ok(RawFrame::packed(width, height, image.into_raw()))
}

/// Size of the primary monitor, measured with a single grab.
pub fn primary_bounds() -> Option<DisplayBounds> {
    match grab_primary() {
        Ok(frame) => Some(DisplayBounds::new(
            frame.width,
            frame.height,
            BASELINE_DENSITY_DPI,
        )),
        Err(e) => {
            warn!("Could not probe primary monitor: {}", e);
            None
        }
    }
}

/// xcap-backed [`MirrorFacility`].
pub struct DesktopMirror;

impl DesktopMirror {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorFacility for DesktopMirror {
    fn open(
        &self,
        consent: &ConsentToken,
        on_revoked: RevokeCallback,
    ) -> Result<Box<dyn MirrorHandle>, CaptureError> {
        if consent.is_empty() {
            return Err(CaptureError::ConsentInvalid("empty consent token".to_string()));
        }
        grab_primary().map_err(CaptureError::ConsentInvalid)?;
        Ok(Box::new(DesktopHandle {
            on_revoked: Arc::new(on_revoked),
        }))
    }
}

struct DesktopHandle {
    on_revoked: Arc<RevokeCallback>,
}

impl MirrorHandle for DesktopHandle {
    fn create_output_target(
        &self,
        name: &str,
        bounds: DisplayBounds,
        sink: FrameSink,
    ) -> Result<Box<dyn OutputTarget>, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let on_revoked = Arc::clone(&self.on_revoked);

        thread::Builder::new()
            .name(format!("mirror-{}", name))
            .spawn(move || {
                let mut failures = 0u32;
                while !worker_stop.load(Ordering::SeqCst) {
                    match grab_primary() {
                        Ok(frame) => {
                            failures = 0;
                            if !sink.submit(frame) {
                                break;
                            }
                        }
                        Err(e) => {
                            failures += 1;
                            debug!("Grab failed ({}/{}): {}", failures, MAX_GRAB_FAILURES, e);
                            if failures >= MAX_GRAB_FAILURES {
                                warn!("Screen grabs keep failing, treating mirror as revoked");
                                (on_revoked.as_ref())();
                                break;
                            }
                        }
                    }
                    thread::sleep(GRAB_INTERVAL);
                }
                debug!("Mirror worker exiting");
            })
            .map_err(|e| CaptureError::Platform(format!("failed to spawn mirror worker: {}", e)))?;

        info!("Desktop mirror rendering {}x{}", bounds.width, bounds.height);
        Ok(Box::new(DesktopTarget { stop }))
    }

    fn stop(&self) {}
}

struct DesktopTarget {
    stop: Arc<AtomicBool>,
}

impl OutputTarget for DesktopTarget {
    fn release(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
