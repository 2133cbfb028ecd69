//! Burst capture: N sequential shots pulled from a shared frame sink.

use crate::capture::{frame_to_image, CaptureError, FrameSink};
use image::RgbaImage;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest number of shots in one burst.
pub const MAX_SHOTS: u32 = 5;

/// Interval used when settings carry no supported value.
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Bounded frame polling for one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of polls before the shot is given up
    pub attempts: u32,
    /// Wait before each poll
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Timing tunables for the burst loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstConfig {
    /// Pause after hiding the overlay so it is gone from the next frame
    pub settle_delay: Duration,
    pub first_shot: RetryPolicy,
    pub later_shots: RetryPolicy,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            first_shot: RetryPolicy::new(5, Duration::from_millis(50)),
            later_shots: RetryPolicy::new(3, Duration::from_millis(50)),
        }
    }
}

impl BurstConfig {
    /// Retry policy for a 1-based shot index.
    pub fn policy_for(&self, shot: u32) -> RetryPolicy {
        if shot <= 1 {
            self.first_shot
        } else {
            self.later_shots
        }
    }
}

/// One trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstRequest {
    pub shot_count: u32,
    pub interval: Duration,
    /// Wall time in epoch milliseconds, fixed when the trigger fired
    pub capture_timestamp_ms: i64,
}

impl BurstRequest {
    /// Build a request from raw settings values.
    ///
    /// A shot count of 0 means a single shot; counts above [`MAX_SHOTS`]
    /// are clamped.
    pub fn new(shot_count: u32, interval_ms: u64, capture_timestamp_ms: i64) -> Self {
        Self {
            shot_count: shot_count.clamp(1, MAX_SHOTS),
            interval: Duration::from_millis(interval_ms),
            capture_timestamp_ms,
        }
    }

    /// Sequence number for a 1-based shot, `None` for single-shot bursts.
    pub fn sequence_for(&self, shot: u32) -> Option<u32> {
        if self.shot_count > 1 {
            Some(shot)
        } else {
            None
        }
    }
}

/// A decoded frame tagged with its place in the burst.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub image: RgbaImage,
    pub sequence: Option<u32>,
    pub capture_timestamp_ms: i64,
}

impl CapturedImage {
    /// Effective "taken" time, offset by the sequence so burst members
    /// sort in capture order.
    pub fn taken_at_ms(&self) -> i64 {
        let offset = self.sequence.map_or(0, |s| s.saturating_sub(1));
        self.capture_timestamp_ms + offset as i64
    }
}

/// What a burst produced.
#[derive(Debug)]
pub struct BurstOutcome {
    pub request: BurstRequest,
    /// Successful shots in capture order
    pub images: Vec<CapturedImage>,
    /// Per-shot failures, in capture order
    pub failures: Vec<CaptureError>,
}

impl BurstOutcome {
    pub fn requested(&self) -> u32 {
        self.request.shot_count
    }
}

/// Poll the sink until a frame arrives or the policy runs out.
async fn capture_shot(
    sink: &FrameSink,
    shot: u32,
    policy: RetryPolicy,
) -> Result<RgbaImage, CaptureError> {
    let bounds = sink.bounds();

    for attempt in 1..=policy.attempts {
        tokio::time::sleep(policy.delay).await;

        let frame = match sink.acquire_latest() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Shot {}: no frame on attempt {}", shot, attempt);
                continue;
            }
            Err(e @ CaptureError::TooManyAcquired { .. }) => {
                warn!("Shot {}: {}", shot, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let converted = frame_to_image(&frame, bounds.width, bounds.height);
        frame.release();
        return converted;
    }

    Err(CaptureError::FrameTimeout {
        shot,
        attempts: policy.attempts,
    })
}

/// Run every shot of `request` against `sink`.
///
/// Shot failures are collected in the outcome. A session-fatal error
/// (closed sink, revoked session) aborts the burst and drops whatever was
/// already captured.
pub async fn run_burst(
    sink: &FrameSink,
    request: BurstRequest,
    config: &BurstConfig,
) -> Result<BurstOutcome, CaptureError> {
    info!(
        "Burst started: {} shot(s), {}ms interval",
        request.shot_count,
        request.interval.as_millis()
    );

    tokio::time::sleep(config.settle_delay).await;

    let mut images = Vec::with_capacity(request.shot_count as usize);
    let mut failures = Vec::new();

    for shot in 1..=request.shot_count {
        if shot > 1 {
            tokio::time::sleep(request.interval).await;
        }

        match capture_shot(sink, shot, config.policy_for(shot)).await {
            Ok(image) => {
                debug!("Shot {} captured ({}x{})", shot, image.width(), image.height());
                images.push(CapturedImage {
                    image,
                    sequence: request.sequence_for(shot),
                    capture_timestamp_ms: request.capture_timestamp_ms,
                });
            }
            Err(e) if e.is_session_fatal() => {
                warn!("Burst aborted at shot {}: {}", shot, e);
                return Err(e);
            }
            Err(e) => {
                warn!("Shot {} failed: {}", shot, e);
                failures.push(e);
            }
        }
    }

    info!(
        "Burst finished: {} of {} shot(s) captured",
        images.len(),
        request.shot_count
    );

    Ok(BurstOutcome {
        request,
        images,
        failures,
    })
}
