//! In-memory display server.
//!
//! Behaves like a minimal X server from the connection's point of view:
//! geometry changes queue a ConfigureNotify, mapping queues a full Expose,
//! and hosts can inject arbitrary raw events. Used by the demo host and
//! by tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::debug;

use crate::error::{DisplayError, DisplayResult};
use crate::event::{Event, RawEvent, WindowId};
use crate::geometry::{Geometry, Point, Rect, Size};
use crate::native::{NativeDisplay, NativeWindow};
use crate::render::RenderEngine;

const FIRST_WINDOW_ID: u64 = 0x40_0001;

/// Snapshot of one headless window.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindowInfo {
    pub geometry: Geometry,
    pub visible: bool,
    pub cursor_visible: bool,
    pub fullscreen: bool,
    pub title: String,
    pub decorated: bool,
    pub stacking: i32,
}

struct HeadlessState {
    screen: Size,
    next_id: u64,
    windows: HashMap<WindowId, HeadlessWindowInfo>,
    queue: VecDeque<RawEvent>,
    focused: Option<WindowId>,
    lock_depth: u32,
    syncs: u64,
    gl: bool,
    composite: bool,
}

#[derive(Clone)]
pub struct HeadlessDisplay {
    name: Rc<str>,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessDisplay {
    pub fn new(name: impl Into<String>, screen: Size) -> Self {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            state: Rc::new(RefCell::new(HeadlessState {
                screen,
                next_id: FIRST_WINDOW_ID,
                windows: HashMap::new(),
                queue: VecDeque::new(),
                focused: None,
                lock_depth: 0,
                syncs: 0,
                gl: false,
                composite: false,
            })),
        }
    }

    /// Advertise the GL render engine.
    pub fn with_gl(self, enabled: bool) -> Self {
        self.state.borrow_mut().gl = enabled;
        self
    }

    pub fn with_composite(self, enabled: bool) -> Self {
        self.state.borrow_mut().composite = enabled;
        self
    }

    pub fn push_event(&self, event: RawEvent) {
        self.state.borrow_mut().queue.push_back(event);
    }

    pub fn push(&self, window: WindowId, event: Event) {
        self.push_event(RawEvent::new(window, event));
    }

    #[inline]
    pub fn pending_events(&self) -> usize {
        self.state.borrow().queue.len()
    }

    pub fn window_info(&self, id: WindowId) -> Option<HeadlessWindowInfo> {
        self.state.borrow().windows.get(&id).cloned()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self.state.borrow().windows.keys().copied().collect();
        ids.sort();
        ids
    }

    #[inline]
    pub fn focused(&self) -> Option<WindowId> {
        self.state.borrow().focused
    }

    #[inline]
    pub fn lock_depth(&self) -> u32 {
        self.state.borrow().lock_depth
    }

    #[inline]
    pub fn sync_count(&self) -> u64 {
        self.state.borrow().syncs
    }

    /// Handle to a window this connection did not create; dropping it
    /// leaves the window alone.
    pub fn foreign_window(&self, id: WindowId) -> Option<Box<dyn NativeWindow>> {
        if !self.state.borrow().windows.contains_key(&id) {
            return None;
        }
        Some(Box::new(HeadlessWindow {
            id,
            owner: false,
            state: self.state.clone(),
        }))
    }
}

impl NativeDisplay for HeadlessDisplay {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_events(&self) -> DisplayResult<Vec<RawEvent>> {
        // Flush requests first, like XSync before XPending.
        let mut s = self.state.borrow_mut();
        s.syncs += 1;
        Ok(s.queue.drain(..).collect())
    }

    fn create_window(&self, size: Size, title: &str) -> DisplayResult<Box<dyn NativeWindow>> {
        if size.width == 0 || size.height == 0 {
            return Err(DisplayError::Native(format!(
                "bad window size {}x{}",
                size.width, size.height
            )));
        }

        let mut s = self.state.borrow_mut();
        let id = WindowId(s.next_id);
        s.next_id += 1;

        s.windows.insert(
            id,
            HeadlessWindowInfo {
                geometry: Geometry::new(Point::ORIGIN, size),
                visible: false,
                cursor_visible: true,
                fullscreen: false,
                title: title.to_string(),
                decorated: true,
                stacking: 0,
            },
        );
        debug!(target: "display", "headless.create window={} size={}x{}", id, size.width, size.height);

        Ok(Box::new(HeadlessWindow {
            id,
            owner: true,
            state: self.state.clone(),
        }))
    }

    fn screen_size(&self, _screen: Option<u32>) -> Size {
        self.state.borrow().screen
    }

    fn sync(&self) {
        self.state.borrow_mut().syncs += 1;
    }

    fn lock(&self) {
        self.state.borrow_mut().lock_depth += 1;
    }

    fn unlock(&self) {
        let mut s = self.state.borrow_mut();
        s.lock_depth = s.lock_depth.saturating_sub(1);
    }

    fn composite_supported(&self) -> bool {
        self.state.borrow().composite
    }

    fn supports_engine(&self, engine: RenderEngine) -> bool {
        match engine {
            RenderEngine::Software => true,
            RenderEngine::Gl => self.state.borrow().gl,
        }
    }
}

struct HeadlessWindow {
    id: WindowId,
    owner: bool,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessWindow {
    fn update<R>(&self, f: impl FnOnce(&mut HeadlessWindowInfo) -> R) -> Option<R> {
        self.state.borrow_mut().windows.get_mut(&self.id).map(f)
    }

    fn read<R>(&self, f: impl FnOnce(&HeadlessWindowInfo) -> R) -> Option<R> {
        self.state.borrow().windows.get(&self.id).map(f)
    }
}

impl NativeWindow for HeadlessWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn show(&self, raise: bool) {
        let mapped = self.update(|w| {
            let was = w.visible;
            w.visible = true;
            if raise {
                w.stacking += 1;
            }
            (!was).then_some(w.geometry.size)
        });

        if let Some(Some(size)) = mapped {
            self.state
                .borrow_mut()
                .queue
                .push_back(RawEvent::new(self.id, Event::Expose(Rect::from_parts(Point::ORIGIN, size))));
        }
    }

    fn hide(&self) {
        self.update(|w| w.visible = false);
    }

    fn is_visible(&self) -> bool {
        self.read(|w| w.visible).unwrap_or(false)
    }

    fn raise_window(&self) {
        self.update(|w| w.stacking += 1);
    }

    fn lower(&self) {
        self.update(|w| w.stacking -= 1);
    }

    fn set_geometry(&self, pos: Option<Point>, size: Option<Size>) {
        let changed = self.update(|w| {
            let before = w.geometry;
            if let Some(pos) = pos {
                w.geometry.pos = pos;
            }
            if let Some(size) = size {
                w.geometry.size = size;
            }
            (w.geometry != before).then_some(w.geometry)
        });

        let mut s = self.state.borrow_mut();
        s.syncs += 1;
        if let Some(Some(g)) = changed {
            s.queue.push_back(RawEvent::new(
                self.id,
                Event::Configure {
                    pos: g.pos,
                    size: g.size,
                },
            ));
        }
    }

    fn geometry(&self) -> Geometry {
        self.read(|w| w.geometry).unwrap_or_default()
    }

    fn set_cursor_visible(&self, visible: bool) {
        self.update(|w| w.cursor_visible = visible);
    }

    fn set_fullscreen(&self, fullscreen: bool) -> bool {
        self.update(|w| w.fullscreen = fullscreen).is_some()
    }

    fn focus(&self) {
        self.state.borrow_mut().focused = Some(self.id);
    }

    fn set_title(&self, title: &str) {
        self.update(|w| w.title = title.to_string());
    }

    fn title(&self) -> String {
        self.read(|w| w.title.clone()).unwrap_or_default()
    }

    fn set_decorated(&self, decorated: bool) {
        self.update(|w| w.decorated = decorated);
    }
}

impl Drop for HeadlessWindow {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        let mut s = self.state.borrow_mut();
        s.windows.remove(&self.id);
        if s.focused == Some(self.id) {
            s.focused = None;
        }
        debug!(target: "display", "headless.destroy window={}", self.id);
    }
}
