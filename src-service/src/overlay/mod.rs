//! Floating capture control rendered above other applications.
//!
//! [`OverlayController`] owns the single control instance and its
//! lifecycle (`Removed -> Shown -> Hidden -> Shown -> ... -> Removed`).
//! The window system is reached through [`WindowHost`].

pub mod gesture;
pub mod headless;

use crate::capture::DisplayBounds;
use gesture::{GestureState, GestureStep, Point, PointerEvent, Position};
use skusho_common::{OverlayVisibility, TouchAction, TouchOutcome};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use gesture::DRAG_THRESHOLD_DP;
pub use headless::HeadlessWindowHost;

/// Default vertical offset of a freshly shown control, in dp.
pub const DEFAULT_Y_DP: f32 = 200.0;

/// Window behavior flags for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFlags {
    /// Touches outside the control go to the app underneath
    pub not_touch_modal: bool,
    /// The control may be placed partly off screen
    pub layout_no_limits: bool,
    /// The control is notified of outside touches without consuming them
    pub watch_outside_touch: bool,
    /// The control never takes keyboard focus
    pub not_focusable: bool,
}

impl WindowFlags {
    /// Flags for a non-modal, unconstrained floating control.
    pub const FLOATING: WindowFlags = WindowFlags {
        not_touch_modal: true,
        layout_no_limits: true,
        watch_outside_touch: true,
        not_focusable: true,
    };
}

/// Placement of the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    pub position: Position,
    pub width: u32,
    pub height: u32,
    pub flags: WindowFlags,
}

/// Error type for overlay operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    /// Operation not valid in the current lifecycle state
    InvalidState {
        operation: &'static str,
        state: OverlayVisibility,
    },
    /// The window system rejected the request
    WindowHost(String),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::InvalidState { operation, state } => {
                write!(f, "Cannot {} overlay while {:?}", operation, state)
            }
            OverlayError::WindowHost(msg) => write!(f, "Window host error: {}", msg),
        }
    }
}

impl std::error::Error for OverlayError {}

/// The OS window facility that hosts the floating view.
pub trait WindowHost: Send + Sync {
    /// Current display geometry.
    fn display_bounds(&self) -> DisplayBounds;

    /// Measured size of the control view in pixels.
    fn control_size(&self) -> (u32, u32);

    /// Register the view above all other windows.
    fn add_view(&self, layout: &OverlayLayout) -> Result<(), OverlayError>;

    /// Move an already registered view.
    fn update_view(&self, layout: &OverlayLayout) -> Result<(), OverlayError>;

    /// Toggle visibility without unregistering.
    fn set_visible(&self, visible: bool) -> Result<(), OverlayError>;

    /// Unregister the view.
    fn remove_view(&self) -> Result<(), OverlayError>;
}

/// Lifecycle and gesture handling for the floating control.
pub struct OverlayController {
    host: Arc<dyn WindowHost>,
    state: OverlayVisibility,
    layout: Option<OverlayLayout>,
    gesture: GestureState,
    saved_position: Option<Position>,
}

impl OverlayController {
    /// Create a controller. `saved_position` is where the control was last
    /// snapped, if known.
    pub fn new(host: Arc<dyn WindowHost>, saved_position: Option<Position>) -> Self {
        Self {
            host,
            state: OverlayVisibility::Removed,
            layout: None,
            gesture: GestureState::Idle,
            saved_position,
        }
    }

    pub fn visibility(&self) -> OverlayVisibility {
        self.state
    }

    /// Current top-left position, if the control exists.
    pub fn position(&self) -> Option<Position> {
        self.layout.map(|layout| layout.position)
    }

    /// Last snapped position.
    pub fn saved_position(&self) -> Option<Position> {
        self.saved_position
    }

    fn default_position(&self) -> Position {
        let bounds = self.host.display_bounds();
        Position::new(0, bounds.dp_to_px(DEFAULT_Y_DP).round() as i32)
    }

    /// Build and register the control. No-op if it already exists.
    pub fn show(&mut self) -> Result<(), OverlayError> {
        if self.state != OverlayVisibility::Removed {
            debug!("Overlay already present ({:?})", self.state);
            return Ok(());
        }

        let (width, height) = self.host.control_size();
        let position = self
            .saved_position
            .unwrap_or_else(|| self.default_position());
        let layout = OverlayLayout {
            position,
            width,
            height,
            flags: WindowFlags::FLOATING,
        };

        self.host.add_view(&layout)?;
        self.layout = Some(layout);
        self.gesture = GestureState::Idle;
        self.state = OverlayVisibility::Shown;
        info!("Overlay shown at ({}, {})", position.x, position.y);
        Ok(())
    }

    /// Make the control invisible without unregistering it.
    pub fn hide(&mut self) -> Result<(), OverlayError> {
        match self.state {
            OverlayVisibility::Shown => {
                self.host.set_visible(false)?;
                self.gesture = GestureState::Idle;
                self.state = OverlayVisibility::Hidden;
                debug!("Overlay hidden");
                Ok(())
            }
            OverlayVisibility::Hidden | OverlayVisibility::Removed => Ok(()),
        }
    }

    /// Restore visibility after a capture. Never re-registers the view.
    pub fn show_after_capture(&mut self) -> Result<(), OverlayError> {
        match self.state {
            OverlayVisibility::Hidden => {
                self.host.set_visible(true)?;
                self.state = OverlayVisibility::Shown;
                debug!("Overlay restored after capture");
                Ok(())
            }
            OverlayVisibility::Shown | OverlayVisibility::Removed => Ok(()),
        }
    }

    /// Unregister and discard the control.
    pub fn remove(&mut self) -> Result<(), OverlayError> {
        if self.state == OverlayVisibility::Removed {
            return Err(OverlayError::InvalidState {
                operation: "remove",
                state: self.state,
            });
        }

        let result = self.host.remove_view();
        if let Err(e) = &result {
            warn!("Window host failed to remove overlay: {}", e);
        }
        self.layout = None;
        self.gesture = GestureState::Idle;
        self.state = OverlayVisibility::Removed;
        info!("Overlay removed");
        result
    }

    fn threshold_px(&self) -> f32 {
        self.host.display_bounds().dp_to_px(DRAG_THRESHOLD_DP)
    }

    /// Feed one pointer event from the control's window.
    ///
    /// Returns [`TouchOutcome::CaptureRequested`] for a recognized tap; the
    /// caller runs the capture.
    pub fn handle_touch(
        &mut self,
        action: TouchAction,
        x: f32,
        y: f32,
    ) -> Result<TouchOutcome, OverlayError> {
        let Some(mut layout) = self.layout else {
            return Ok(TouchOutcome::Ignored);
        };
        if self.state != OverlayVisibility::Shown {
            self.gesture = GestureState::Idle;
            return Ok(TouchOutcome::Ignored);
        }

        let at = Point::new(x, y);
        let event = match action {
            TouchAction::Down => PointerEvent::Down {
                origin: layout.position,
                touch: at,
            },
            TouchAction::Move => PointerEvent::Move(at),
            TouchAction::Up => PointerEvent::Up,
            TouchAction::Cancel => PointerEvent::Cancel,
        };

        let (next, step) = gesture::transition(self.gesture, event, self.threshold_px());
        self.gesture = next;

        match step {
            GestureStep::None => Ok(TouchOutcome::Ignored),
            GestureStep::Follow(position) => {
                layout.position = position;
                self.host.update_view(&layout)?;
                self.layout = Some(layout);
                Ok(TouchOutcome::Dragged)
            }
            GestureStep::SnapPending => {
                let screen_width = self.host.display_bounds().width;
                layout.position.x =
                    gesture::snap_to_edge(layout.position.x, layout.width, screen_width);
                self.host.update_view(&layout)?;
                self.layout = Some(layout);
                self.saved_position = Some(layout.position);
                debug!(
                    "Overlay snapped to ({}, {})",
                    layout.position.x, layout.position.y
                );
                Ok(TouchOutcome::Snapped)
            }
            GestureStep::TapFired => {
                info!("Overlay tapped");
                Ok(TouchOutcome::CaptureRequested)
            }
        }
    }
}
