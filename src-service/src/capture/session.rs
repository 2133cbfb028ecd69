//! Mirror session: owns the system-granted mirroring handle and the
//! output target bound to the frame sink.
//!
//! The output binding is a cache keyed by [`DisplayBounds`]. It is created
//! on the first capture, reused by every later shot and burst, and only
//! replaced when the display geometry changes or the cache is invalidated.

use super::error::CaptureError;
use super::sink::FrameSink;
use super::types::{ConsentToken, DisplayBounds};
use super::{MirrorFacility, MirrorHandle, OutputTarget, RevokeCallback};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Name given to the virtual output the mirror renders into.
pub const OUTPUT_TARGET_NAME: &str = "ScreenCapture";

struct OutputBinding {
    sink: FrameSink,
    target: Box<dyn OutputTarget>,
}

impl OutputBinding {
    fn release(self) {
        self.target.release();
        self.sink.close();
    }
}

/// A live mirroring session.
pub struct MirrorSession {
    handle: Option<Box<dyn MirrorHandle>>,
    output: Option<OutputBinding>,
    revoked: Arc<AtomicBool>,
    targets_created: u32,
}

impl MirrorSession {
    /// Exchange a consent token for a mirroring handle.
    ///
    /// `on_revoked` fires (possibly from a platform thread) if the OS ends
    /// the session on its own.
    pub fn start(
        facility: &dyn MirrorFacility,
        consent: &ConsentToken,
        on_revoked: RevokeCallback,
    ) -> Result<Self, CaptureError> {
        if consent.is_empty() {
            return Err(CaptureError::ConsentInvalid("empty consent token".to_string()));
        }

        let revoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&revoked);
        let callback: RevokeCallback = Box::new(move || {
            flag.store(true, Ordering::SeqCst);
            on_revoked();
        });

        let handle = facility.open(consent, callback)?;
        info!("Mirroring session started");

        Ok(Self {
            handle: Some(handle),
            output: None,
            revoked,
            targets_created: 0,
        })
    }

    /// Whether the OS revoked the session.
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// How many output targets this session has created.
    pub fn targets_created(&self) -> u32 {
        self.targets_created
    }

    /// Return the sink bound to `bounds`, creating the sink and output
    /// target if none exists or the cached one was made for other bounds.
    pub fn ensure_output_target(&mut self, bounds: DisplayBounds) -> Result<FrameSink, CaptureError> {
        if self.is_revoked() {
            return Err(CaptureError::SessionRevoked);
        }
        let handle = self.handle.as_ref().ok_or(CaptureError::NoSession)?;

        if let Some(binding) = &self.output {
            if binding.sink.bounds() == bounds && !binding.sink.is_closed() {
                return Ok(binding.sink.clone());
            }
        }

        if let Some(stale) = self.output.take() {
            info!(
                "Display bounds changed ({:?} -> {:?}), recreating output target",
                stale.sink.bounds(),
                bounds
            );
            stale.release();
        }

        let sink = FrameSink::new(bounds);
        let target = handle.create_output_target(OUTPUT_TARGET_NAME, bounds, sink.clone())?;
        self.targets_created += 1;
        info!(
            "Output target created: {}x{} @ {}dpi",
            bounds.width, bounds.height, bounds.density_dpi
        );

        self.output = Some(OutputBinding {
            sink: sink.clone(),
            target,
        });
        Ok(sink)
    }

    /// Drop the cached output so the next capture recreates it.
    pub fn invalidate_output(&mut self) {
        if let Some(binding) = self.output.take() {
            binding.release();
        }
    }

    /// Release the output target and the mirroring handle. Safe to repeat.
    pub fn stop(&mut self) {
        self.invalidate_output();
        if let Some(handle) = self.handle.take() {
            handle.stop();
            info!("Mirroring session stopped");
        } else {
            debug!("Mirroring session already stopped");
        }
    }
}

impl Drop for MirrorSession {
    fn drop(&mut self) {
        if self.handle.is_some() || self.output.is_some() {
            self.stop();
        }
    }
}
