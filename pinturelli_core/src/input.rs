// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer input, debouncing, and per-frame input state.
//!
//! Hosts feed raw pointer events to
//! [`Scene::handle_pointer`](crate::Scene::handle_pointer). Presses and
//! releases pass through a [`Debounce`] each, so a touch screen that reports
//! the same contact twice in quick succession produces one gesture.
//! Widgets read the resulting [`InputState`] during the update pass.

use alloc::string::String;

use kurbo::Point;

use crate::node::NodeId;

/// Event emitted on the node under the pointer when it goes down.
pub const POINTER_DOWN: &str = "pointerdown";
/// Event emitted on the node under the pointer when it goes up.
pub const POINTER_UP: &str = "pointerup";
/// Event emitted on the node under the pointer when it moves.
pub const POINTER_MOVE: &str = "pointermove";
/// Event emitted when the pointer goes up on the node it went down on.
pub const CLICK: &str = "click";

/// The phase of a pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Button pressed or touch started.
    Down,
    /// Button released or touch ended.
    Up,
    /// Pointer moved.
    Move,
}

/// A pointer event in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Event phase.
    pub kind: PointerKind,
    /// Pointer position on the canvas.
    pub position: Point,
    /// Host timestamp in milliseconds.
    pub timestamp: u64,
}

impl PointerEvent {
    /// Creates a pointer-down event.
    #[must_use]
    pub fn down(position: impl Into<Point>, timestamp: u64) -> Self {
        Self {
            kind: PointerKind::Down,
            position: position.into(),
            timestamp,
        }
    }

    /// Creates a pointer-up event.
    #[must_use]
    pub fn up(position: impl Into<Point>, timestamp: u64) -> Self {
        Self {
            kind: PointerKind::Up,
            position: position.into(),
            timestamp,
        }
    }

    /// Creates a pointer-move event.
    #[must_use]
    pub fn moved(position: impl Into<Point>, timestamp: u64) -> Self {
        Self {
            kind: PointerKind::Move,
            position: position.into(),
            timestamp,
        }
    }
}

/// Drops events arriving within a cooldown window of the last accepted one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Debounce {
    window_ms: u64,
    last: Option<u64>,
}

impl Debounce {
    /// Creates a debouncer with the given window.
    #[must_use]
    pub const fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last: None,
        }
    }

    /// Returns whether an event at `now` passes, and if so starts a new
    /// cooldown window.
    ///
    /// A timestamp earlier than the last accepted one (a host clock reset)
    /// always passes.
    pub fn accept(&mut self, now: u64) -> bool {
        match self.last {
            Some(last) if now >= last && now - last < self.window_ms => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forgets the last accepted event.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Pointer state as seen by widgets during a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InputState {
    /// Last known pointer position.
    pub pointer: Point,
    /// Whether the pointer is currently down.
    pub pressed: bool,
    /// A press was accepted since the last update pass.
    pub pressed_this_frame: bool,
    /// A release was accepted since the last update pass.
    pub released_this_frame: bool,
    /// The node the current (or last) press landed on.
    pub pressed_on: Option<NodeId>,
    /// The node under the pointer at the last event.
    pub hovered: Option<NodeId>,
    pub(crate) press_debounce: Debounce,
    pub(crate) release_debounce: Debounce,
}

impl InputState {
    /// Creates an idle input state with the given debounce window.
    #[must_use]
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pointer: Point::ORIGIN,
            pressed: false,
            pressed_this_frame: false,
            released_this_frame: false,
            pressed_on: None,
            hovered: None,
            press_debounce: Debounce::new(debounce_ms),
            release_debounce: Debounce::new(debounce_ms),
        }
    }

    /// Applies an event. Returns `false` when it was debounced.
    pub(crate) fn apply(&mut self, event: &PointerEvent) -> bool {
        let accepted = match event.kind {
            PointerKind::Down => self.press_debounce.accept(event.timestamp),
            PointerKind::Up => self.release_debounce.accept(event.timestamp),
            PointerKind::Move => true,
        };
        if !accepted {
            tracing::debug!(kind = ?event.kind, timestamp = event.timestamp, "pointer event debounced");
            return false;
        }
        self.pointer = event.position;
        match event.kind {
            PointerKind::Down => {
                self.pressed = true;
                self.pressed_this_frame = true;
            }
            PointerKind::Up => {
                self.pressed = false;
                self.released_this_frame = true;
            }
            PointerKind::Move => {}
        }
        true
    }

    /// Clears the per-frame flags. Called after each update pass.
    pub(crate) fn end_frame(&mut self) {
        self.pressed_this_frame = false;
        self.released_this_frame = false;
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(crate::SceneConfig::DEFAULT_DEBOUNCE_MS)
    }
}

/// Payload carried by channel events.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EventData {
    /// No payload.
    #[default]
    Empty,
    /// A pointer event, with the position relative to the target node.
    Pointer {
        /// The event as received.
        event: PointerEvent,
        /// Position relative to the target's origin.
        local: Point,
    },
    /// A number.
    Number(f64),
    /// A string.
    Text(String),
}

impl EventData {
    /// Returns the pointer event, if this is one.
    #[must_use]
    pub fn pointer(&self) -> Option<&PointerEvent> {
        match self {
            Self::Pointer { event, .. } => Some(event),
            _ => None,
        }
    }

    /// Returns whether this carries a pointer event.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }
}

impl From<f64> for EventData {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for EventData {
    fn from(value: &str) -> Self {
        Self::Text(String::from(value))
    }
}

impl From<String> for EventData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
