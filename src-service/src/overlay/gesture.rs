//! Drag-versus-tap disambiguation for the floating control.
//!
//! The tracker is a small state machine driven by pure transition
//! functions:
//!
//! ```text
//! Idle --down--> Pressed --move beyond threshold--> Dragging
//!                  |                                   |
//!                  +--up--> Idle (TapFired)            +--up--> Idle (SnapPending)
//! ```
//!
//! A drag never fires the tap and a tap never moves the control.

use serde::{Deserialize, Serialize};

/// Drag threshold in density-independent pixels, per axis.
pub const DRAG_THRESHOLD_DP: f32 = 10.0;

/// Pointer coordinates in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Top-left position of the control in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Gesture tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Pointer is down but has not left the threshold box
    Pressed { origin: Position, touch: Point },
    /// Pointer left the threshold box; the control follows it
    Dragging { origin: Position, touch: Point },
}

/// Pointer input fed to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Pointer pressed at `touch` while the control sits at `origin`
    Down { origin: Position, touch: Point },
    Move(Point),
    Up,
    Cancel,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureStep {
    None,
    /// Move the control to this position
    Follow(Position),
    /// The drag ended: snap the control to the nearer edge
    SnapPending,
    /// A tap was recognized: run the capture action
    TapFired,
}

fn exceeds_threshold(from: Point, to: Point, threshold_px: f32) -> bool {
    (to.x - from.x).abs() > threshold_px || (to.y - from.y).abs() > threshold_px
}

fn follow(origin: Position, touch: Point, at: Point) -> Position {
    Position::new(
        origin.x + (at.x - touch.x) as i32,
        origin.y + (at.y - touch.y) as i32,
    )
}

/// Apply one pointer event.
pub fn transition(
    state: GestureState,
    event: PointerEvent,
    threshold_px: f32,
) -> (GestureState, GestureStep) {
    match (state, event) {
        (_, PointerEvent::Down { origin, touch }) => {
            (GestureState::Pressed { origin, touch }, GestureStep::None)
        }
        (GestureState::Pressed { origin, touch }, PointerEvent::Move(at)) => {
            if exceeds_threshold(touch, at, threshold_px) {
                (
                    GestureState::Dragging { origin, touch },
                    GestureStep::Follow(follow(origin, touch, at)),
                )
            } else {
                (state, GestureStep::None)
            }
        }
        (GestureState::Dragging { origin, touch }, PointerEvent::Move(at)) => {
            (state, GestureStep::Follow(follow(origin, touch, at)))
        }
        (GestureState::Pressed { .. }, PointerEvent::Up) => {
            (GestureState::Idle, GestureStep::TapFired)
        }
        (GestureState::Dragging { .. }, PointerEvent::Up) => {
            (GestureState::Idle, GestureStep::SnapPending)
        }
        (_, PointerEvent::Cancel) => (GestureState::Idle, GestureStep::None),
        (GestureState::Idle, PointerEvent::Move(_) | PointerEvent::Up) => {
            (GestureState::Idle, GestureStep::None)
        }
    }
}

/// X coordinate after snapping a control of `control_width` to the nearer
/// horizontal edge of a `screen_width` wide screen.
pub fn snap_to_edge(x: i32, control_width: u32, screen_width: u32) -> i32 {
    let center = x as i64 + control_width as i64 / 2;
    if center < screen_width as i64 / 2 {
        0
    } else {
        screen_width as i32 - control_width as i32
    }
}
