//! Frame sink: the bounded buffer the mirrored display renders into.
//!
//! The producer side (the platform output target) calls [`FrameSink::submit`];
//! the capture side pops the newest frame with [`FrameSink::acquire_latest`].
//! At most [`FrameSink::CAPACITY`] frames are queued and at most that many
//! may be held by consumers at once. A held frame gives its slot back when
//! the [`AcquiredFrame`] is released or dropped.

use super::error::CaptureError;
use super::types::{DisplayBounds, RawFrame};
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct SinkInner {
    queue: VecDeque<RawFrame>,
    outstanding: usize,
    closed: bool,
    submitted: u64,
}

/// Shared handle to a frame sink. Clones refer to the same buffer.
#[derive(Clone)]
pub struct FrameSink {
    bounds: DisplayBounds,
    inner: Arc<Mutex<SinkInner>>,
}

impl FrameSink {
    /// Ring capacity, matching the two-image reader the mirror renders into.
    pub const CAPACITY: usize = 2;

    pub fn new(bounds: DisplayBounds) -> Self {
        Self {
            bounds,
            inner: Arc::new(Mutex::new(SinkInner::default())),
        }
    }

    /// Display geometry this sink was created for.
    pub fn bounds(&self) -> DisplayBounds {
        self.bounds
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether two handles refer to the same underlying sink.
    pub fn same_as(&self, other: &FrameSink) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Push a rendered frame. The oldest queued frame is dropped when full.
    ///
    /// Returns false once the sink is closed.
    pub fn submit(&self, frame: RawFrame) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        if inner.queue.len() >= Self::CAPACITY {
            inner.queue.pop_front();
        }
        inner.queue.push_back(frame);
        inner.submitted += 1;
        true
    }

    /// Pop the newest frame, discarding any older ones.
    ///
    /// `Ok(None)` means no frame is ready yet.
    pub fn acquire_latest(&self) -> Result<Option<AcquiredFrame>, CaptureError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(CaptureError::SinkClosed);
        }
        if inner.queue.is_empty() {
            return Ok(None);
        }
        if inner.outstanding >= Self::CAPACITY {
            return Err(CaptureError::TooManyAcquired {
                capacity: Self::CAPACITY,
            });
        }

        let frame = inner.queue.pop_back();
        let discarded = inner.queue.len();
        inner.queue.clear();
        if discarded > 0 {
            debug!("Discarded {} stale frame(s)", discarded);
        }

        Ok(frame.map(|frame| {
            inner.outstanding += 1;
            AcquiredFrame {
                frame,
                sink: Arc::clone(&self.inner),
            }
        }))
    }

    /// Drop every queued frame, returning how many were discarded.
    ///
    /// Frames already acquired keep their slots.
    pub fn drain(&self) -> usize {
        let mut inner = self.lock();
        let stale = inner.queue.len();
        inner.queue.clear();
        stale
    }

    /// Close the sink. Queued frames are dropped; later acquisitions fail.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.queue.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of acquired frames not yet released.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Total frames ever submitted.
    pub fn submitted(&self) -> u64 {
        self.lock().submitted
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink")
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// A frame taken out of the sink. Holds one sink slot until released.
pub struct AcquiredFrame {
    frame: RawFrame,
    sink: Arc<Mutex<SinkInner>>,
}

impl AcquiredFrame {
    /// Give the slot back to the sink.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for AcquiredFrame {
    type Target = RawFrame;

    fn deref(&self) -> &RawFrame {
        &self.frame
    }
}

impl Drop for AcquiredFrame {
    fn drop(&mut self) {
        let mut inner = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        inner.outstanding = inner.outstanding.saturating_sub(1);
    }
}
