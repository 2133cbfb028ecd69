//! In-process window host for platforms without an overlay compositor.
//!
//! The control has no real pixels; pointer events arrive over IPC and the
//! current layout is kept so status and tests can inspect it.

use super::{OverlayError, OverlayLayout, WindowHost};
use crate::capture::DisplayBounds;
use std::sync::Mutex;
use tracing::trace;

#[derive(Debug, Default)]
struct HostState {
    layout: Option<OverlayLayout>,
    visible: bool,
    adds: usize,
    updates: usize,
}

/// A [`WindowHost`] that records layout changes without drawing.
#[derive(Debug)]
pub struct HeadlessWindowHost {
    bounds: DisplayBounds,
    control_size: (u32, u32),
    state: Mutex<HostState>,
}

impl HeadlessWindowHost {
    pub fn new(bounds: DisplayBounds, control_size: (u32, u32)) -> Self {
        Self {
            bounds,
            control_size,
            state: Mutex::new(HostState::default()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Layout of the registered view, if any.
    pub fn layout(&self) -> Option<OverlayLayout> {
        self.with_state(|s| s.layout)
    }

    pub fn is_visible(&self) -> bool {
        self.with_state(|s| s.layout.is_some() && s.visible)
    }

    pub fn add_count(&self) -> usize {
        self.with_state(|s| s.adds)
    }

    pub fn update_count(&self) -> usize {
        self.with_state(|s| s.updates)
    }
}

impl WindowHost for HeadlessWindowHost {
    fn display_bounds(&self) -> DisplayBounds {
        self.bounds
    }

    fn control_size(&self) -> (u32, u32) {
        self.control_size
    }

    fn add_view(&self, layout: &OverlayLayout) -> Result<(), OverlayError> {
        self.with_state(|s| {
            if s.layout.is_some() {
                return Err(OverlayError::WindowHost("view already added".to_string()));
            }
            s.layout = Some(*layout);
            s.visible = true;
            s.adds += 1;
            trace!("Headless view added: {:?}", layout);
            Ok(())
        })
    }

    fn update_view(&self, layout: &OverlayLayout) -> Result<(), OverlayError> {
        self.with_state(|s| {
            if s.layout.is_none() {
                return Err(OverlayError::WindowHost("view not attached".to_string()));
            }
            s.layout = Some(*layout);
            s.updates += 1;
            Ok(())
        })
    }

    fn set_visible(&self, visible: bool) -> Result<(), OverlayError> {
        self.with_state(|s| {
            if s.layout.is_none() {
                return Err(OverlayError::WindowHost("view not attached".to_string()));
            }
            s.visible = visible;
            Ok(())
        })
    }

    fn remove_view(&self) -> Result<(), OverlayError> {
        self.with_state(|s| {
            if s.layout.take().is_none() {
                return Err(OverlayError::WindowHost("view not attached".to_string()));
            }
            s.visible = false;
            Ok(())
        })
    }
}
