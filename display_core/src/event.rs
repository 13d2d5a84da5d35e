use std::fmt;

use crate::geometry::{Point, Rect, Size};

/// Native window identity. `0` means "no window" (connection-level event).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct WindowId(pub u64);

impl WindowId {
    pub const NONE: WindowId = WindowId(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// X11 event type codes for the window-scoped kinds.
pub mod codes {
    pub const KEY_PRESS: i32 = 2;
    pub const BUTTON_PRESS: i32 = 4;
    pub const MOTION_NOTIFY: i32 = 6;
    pub const EXPOSE: i32 = 12;
    pub const CONFIGURE_NOTIFY: i32 = 22;
}

/// Decoded event payload. Window identity lives in [`RawEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Motion { pos: Point, root: Point },
    Expose(Rect),
    ButtonPress { button: u32, pos: Point },
    /// Key code as delivered by the binding (see [`crate::keys::translate`]).
    KeyPress(u32),
    Configure { pos: Point, size: Size },
    /// Any other native event type; never routed to windows.
    Other(i32),
}

impl Event {
    pub fn code(&self) -> i32 {
        match self {
            Event::Motion { .. } => codes::MOTION_NOTIFY,
            Event::Expose(_) => codes::EXPOSE,
            Event::ButtonPress { .. } => codes::BUTTON_PRESS,
            Event::KeyPress(_) => codes::KEY_PRESS,
            Event::Configure { .. } => codes::CONFIGURE_NOTIFY,
            Event::Other(code) => *code,
        }
    }

    #[inline]
    pub fn is_window_scoped(&self) -> bool {
        !matches!(self, Event::Other(_))
    }
}

/// One entry of the flat stream produced by the native binding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub window: WindowId,
    pub event: Event,
}

impl RawEvent {
    #[inline]
    pub fn new(window: WindowId, event: Event) -> Self {
        Self { window, event }
    }

    /// Event not tied to any window.
    #[inline]
    pub fn connection(event: Event) -> Self {
        Self { window: WindowId::NONE, event }
    }

    /// True when the demultiplexer should route this event to a window.
    #[inline]
    pub fn is_routable(&self) -> bool {
        self.event.is_window_scoped() && !self.window.is_none()
    }
}
