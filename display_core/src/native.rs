//! Boundary to the native display binding.
//!
//! Handles are shared and interior-mutable on the binding side (like the
//! underlying C handles), so every operation takes `&self`.

use crate::error::DisplayResult;
use crate::event::{RawEvent, WindowId};
use crate::geometry::{Geometry, Point, Size};
use crate::render::RenderEngine;

pub trait NativeDisplay {
    fn name(&self) -> &str;

    /// Drain the events available right now. Never blocks.
    fn poll_events(&self) -> DisplayResult<Vec<RawEvent>>;

    fn create_window(&self, size: Size, title: &str) -> DisplayResult<Box<dyn NativeWindow>>;

    /// Screen size; `None` selects the default screen.
    fn screen_size(&self, screen: Option<u32>) -> Size;

    fn sync(&self);

    /// Drawing lock. Every `lock` must be paired with `unlock`.
    fn lock(&self);

    fn unlock(&self);

    /// Connection file descriptor for socket-readiness triggers.
    fn socket(&self) -> Option<i32> {
        None
    }

    fn composite_supported(&self) -> bool {
        false
    }

    fn supports_engine(&self, engine: RenderEngine) -> bool {
        engine == RenderEngine::Software
    }
}

pub trait NativeWindow {
    fn id(&self) -> WindowId;

    fn show(&self, raise: bool);

    fn hide(&self);

    fn is_visible(&self) -> bool;

    fn raise_window(&self);

    fn lower(&self);

    /// `None` leaves that axis unchanged.
    fn set_geometry(&self, pos: Option<Point>, size: Option<Size>);

    fn geometry(&self) -> Geometry;

    fn set_cursor_visible(&self, visible: bool);

    /// Returns whether the window manager hint was accepted.
    fn set_fullscreen(&self, fullscreen: bool) -> bool;

    fn focus(&self);

    fn set_title(&self, title: &str);

    fn title(&self) -> String;

    fn set_decorated(&self, decorated: bool);
}
