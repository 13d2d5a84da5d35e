use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::config::WindowConfig;
use crate::display::{self, DisplayConnection};
use crate::error::{DisplayError, DisplayResult};
use crate::event::{Event, WindowId};
use crate::geometry::{Geometry, Point, Rect, Size};
use crate::keys;
use crate::native::NativeWindow;
use crate::registry::EventHandler;
use crate::signals::{ButtonPress, WindowSignals};
use crate::timer::CursorHideTimer;

/// Cursor auto-hide policy.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CursorHideTimeout {
    /// Never hide (negative seconds).
    Disabled,
    /// Hide as soon as the timer service runs (zero seconds).
    Immediate,
    After(Duration),
}

impl CursorHideTimeout {
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs < 0.0 {
            Self::Disabled
        } else if secs == 0.0 {
            Self::Immediate
        } else {
            Self::After(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Self::Disabled => -1.0,
            Self::Immediate => 0.0,
            Self::After(d) => d.as_secs_f64(),
        }
    }

    /// Timer delay, `None` when auto-hide is off.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Immediate => Some(Duration::ZERO),
            Self::After(d) => Some(*d),
        }
    }
}

/// How to obtain the native window.
///
/// Either `existing` is set, or both `size` and `title` are.
pub struct WindowOptions {
    pub size: Option<Size>,
    pub title: Option<String>,
    pub existing: Option<Box<dyn NativeWindow>>,
    pub cursor_hide_timeout_sec: f64,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            size: None,
            title: None,
            existing: None,
            cursor_hide_timeout_sec: -1.0,
        }
    }
}

impl WindowOptions {
    /// Create a new native window.
    pub fn new(size: Size, title: impl Into<String>) -> Self {
        Self {
            size: Some(size),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Wrap a native window that already exists.
    pub fn wrap(native: Box<dyn NativeWindow>) -> Self {
        Self {
            existing: Some(native),
            ..Self::default()
        }
    }

    pub fn from_config(cfg: &WindowConfig) -> Self {
        Self::new(Size::new(cfg.width, cfg.height), cfg.title.clone())
            .cursor_hide_timeout(cfg.cursor_hide_timeout_sec)
    }

    pub fn cursor_hide_timeout(mut self, secs: f64) -> Self {
        self.cursor_hide_timeout_sec = secs;
        self
    }

    /// Fails unless a native handle, or both size and title, are present.
    pub fn validate(&self) -> DisplayResult<()> {
        if self.existing.is_some() || (self.size.is_some() && self.title.is_some()) {
            return Ok(());
        }
        Err(DisplayError::configuration(MISSING_SOURCE))
    }
}

const MISSING_SOURCE: &str = "window needs an existing native handle or both size and title";

enum NativeSource {
    Existing(Box<dyn NativeWindow>),
    Create { size: Size, title: String },
}

/// Per-window state machine.
///
/// Owned by the application through `Rc<Window>`; the display registry only
/// holds a weak handle, so dropping the last `Rc` ends the window.
pub struct Window {
    id: WindowId,
    native: Box<dyn NativeWindow>,
    display: DisplayConnection,
    signals: WindowSignals,

    cursor_timer: CursorHideTimer,
    cursor_visible: Cell<bool>,
    hide_timeout: Cell<CursorHideTimeout>,

    /// Present ⇔ fullscreen. Size to restore on leave.
    fullscreen_saved: Cell<Option<Size>>,
    transitioning: Cell<bool>,
}

impl Window {
    /// Create or wrap a native window and register it with `display`
    /// (the default connection when `None`).
    pub fn new(display: Option<&DisplayConnection>, opts: WindowOptions) -> DisplayResult<Rc<Self>> {
        let WindowOptions {
            size,
            title,
            existing,
            cursor_hide_timeout_sec,
        } = opts;

        let source = match (existing, size, title) {
            (Some(native), _, _) => NativeSource::Existing(native),
            (None, Some(size), Some(title)) => NativeSource::Create { size, title },
            _ => return Err(DisplayError::configuration(MISSING_SOURCE)),
        };

        let display = display::resolve(display)?;
        let native = match source {
            NativeSource::Existing(native) => native,
            NativeSource::Create { size, title } => display.native().create_window(size, &title)?,
        };

        let window = Self::build(display, native, CursorHideTimeout::from_secs_f64(cursor_hide_timeout_sec));
        let handler = Rc::downgrade(&window) as Weak<dyn EventHandler>;
        window.display.register(window.id, handler);
        // A configured timeout counts from creation, like a later setter call.
        window.restart_hide_timer();

        let g = window.native.geometry();
        info!(
            target: "window",
            "window.new window={} size={}x{} title='{}'",
            window.id,
            g.size.width,
            g.size.height,
            window.native.title()
        );
        Ok(window)
    }

    fn build(display: DisplayConnection, native: Box<dyn NativeWindow>, timeout: CursorHideTimeout) -> Rc<Self> {
        let timers = display.timers().clone();
        Rc::new_cyclic(|me: &Weak<Window>| {
            let me = me.clone();
            Window {
                id: native.id(),
                native,
                display,
                signals: WindowSignals::new(),
                cursor_timer: CursorHideTimer::new(timers, move || {
                    if let Some(window) = me.upgrade() {
                        window.on_cursor_hide_timer();
                    }
                }),
                cursor_visible: Cell::new(true),
                hide_timeout: Cell::new(timeout),
                fullscreen_saved: Cell::new(None),
                transitioning: Cell::new(false),
            }
        })
    }

    #[inline]
    pub fn id(&self) -> WindowId {
        self.id
    }

    #[inline]
    pub fn display(&self) -> &DisplayConnection {
        &self.display
    }

    #[inline]
    pub fn signals(&self) -> &WindowSignals {
        &self.signals
    }

    #[inline]
    pub fn native(&self) -> &dyn NativeWindow {
        self.native.as_ref()
    }

    // -- visibility / stacking -------------------------------------------------

    pub fn show(&self, raise: bool) {
        self.native.show(raise);
    }

    pub fn hide(&self) {
        self.native.hide();
    }

    pub fn is_visible(&self) -> bool {
        self.native.is_visible()
    }

    pub fn raise_window(&self) {
        self.native.raise_window();
    }

    pub fn lower(&self) {
        self.native.lower();
    }

    pub fn focus(&self) {
        self.native.focus();
    }

    pub fn set_title(&self, title: &str) {
        self.native.set_title(title);
    }

    pub fn title(&self) -> String {
        self.native.title()
    }

    pub fn set_decorated(&self, decorated: bool) {
        self.native.set_decorated(decorated);
    }

    // -- cursor ----------------------------------------------------------------

    /// Show or hide the pointer, then flush so the change is visible on return.
    pub fn set_cursor_visible(&self, visible: bool) -> DisplayResult<()> {
        self.native.set_cursor_visible(visible);
        self.cursor_visible.set(visible);
        debug!(target: "window", "cursor.visible window={} visible={}", self.id, visible);
        self.display.pump().map(|_| ())
    }

    #[inline]
    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible.get()
    }

    /// Negative disables auto-hide, zero hides immediately. Takes effect now,
    /// without waiting for the next pointer motion.
    pub fn set_cursor_hide_timeout(&self, secs: f64) {
        self.hide_timeout.set(CursorHideTimeout::from_secs_f64(secs));
        self.restart_hide_timer();
    }

    #[inline]
    pub fn cursor_hide_timeout(&self) -> CursorHideTimeout {
        self.hide_timeout.get()
    }

    fn restart_hide_timer(&self) {
        match self.hide_timeout.get().delay() {
            Some(delay) => self.cursor_timer.start(delay),
            None => self.cursor_timer.cancel(),
        }
    }

    fn on_cursor_hide_timer(&self) {
        if self.hide_timeout.get() == CursorHideTimeout::Disabled {
            return;
        }
        debug!(target: "window", "cursor.autohide window={}", self.id);
        if let Err(e) = self.set_cursor_visible(false) {
            warn!(target: "window", "cursor.autohide failed window={}: {}", self.id, e);
        }
    }

    fn on_motion(&self) -> DisplayResult<()> {
        if !self.cursor_visible.get() && self.hide_timeout.get() != CursorHideTimeout::Immediate {
            self.set_cursor_visible(true)?;
        }
        self.restart_hide_timer();
        Ok(())
    }

    // -- geometry --------------------------------------------------------------

    /// Apply geometry; `None` leaves that axis unchanged.
    ///
    /// While fullscreen and not forced, nothing is applied: a requested size
    /// becomes the size restored on leaving fullscreen, and `false` is returned.
    pub fn set_geometry(&self, pos: Option<Point>, size: Option<Size>, force: bool) -> DisplayResult<bool> {
        if self.is_fullscreen() && !force {
            if let Some(size) = size {
                self.fullscreen_saved.set(Some(size));
            }
            debug!(target: "window", "geometry.deferred window={} size={:?}", self.id, size);
            return Ok(false);
        }

        self.native.set_geometry(pos, size);
        self.display.pump()?;
        Ok(true)
    }

    pub fn move_to(&self, pos: Point) -> DisplayResult<bool> {
        self.set_geometry(Some(pos), None, false)
    }

    pub fn resize(&self, size: Size, force: bool) -> DisplayResult<bool> {
        self.set_geometry(None, Some(size), force)
    }

    pub fn geometry(&self) -> Geometry {
        self.native.geometry()
    }

    // -- fullscreen ------------------------------------------------------------

    /// Returns whether a transition happened. Entering twice, or leaving
    /// while not fullscreen, is a no-op reported as `false`.
    pub fn set_fullscreen(&self, fullscreen: bool) -> DisplayResult<bool> {
        if self.transitioning.get() {
            return Ok(false);
        }
        let applied = if fullscreen {
            self.enter_fullscreen()?
        } else {
            self.leave_fullscreen()?
        };
        if applied {
            self.signals.fullscreen.emit(&fullscreen);
        }
        Ok(applied)
    }

    #[inline]
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen_saved.get().is_some()
    }

    /// Size restored when fullscreen ends.
    #[inline]
    pub fn fullscreen_restore_size(&self) -> Option<Size> {
        self.fullscreen_saved.get()
    }

    fn enter_fullscreen(&self) -> DisplayResult<bool> {
        if self.is_fullscreen() {
            return Ok(false);
        }

        let _transition = Transition::begin(&self.transitioning);
        let saved = self.native.geometry().size;
        self.fullscreen_saved.set(Some(saved));
        self.native.set_fullscreen(true);

        let screen = self.display.get_size(None);
        debug!(
            target: "window",
            "fullscreen.enter window={} saved={}x{} screen={}x{}",
            self.id, saved.width, saved.height, screen.width, screen.height
        );
        self.resize(screen, true)?;
        Ok(true)
    }

    fn leave_fullscreen(&self) -> DisplayResult<bool> {
        let Some(saved) = self.fullscreen_saved.get() else {
            return Ok(false);
        };

        let _transition = Transition::begin(&self.transitioning);
        debug!(target: "window", "fullscreen.leave window={} restore={}x{}", self.id, saved.width, saved.height);
        let resized = self.resize(saved, true);
        self.native.set_fullscreen(false);
        self.fullscreen_saved.set(None);
        resized?;
        Ok(true)
    }
}

impl EventHandler for Window {
    fn handle_events(&self, events: &[Event]) -> DisplayResult<()> {
        let mut exposed: Vec<Rect> = Vec::new();

        for event in events {
            trace!(target: "window", "window.event window={} {:?}", self.id, event);
            match event {
                Event::Motion { .. } => self.on_motion()?,
                Event::KeyPress(code) => {
                    self.signals.key_press.emit(&keys::translate(*code));
                }
                Event::Expose(rect) => exposed.push(*rect),
                Event::ButtonPress { button, pos } => {
                    self.signals.button_press.emit(&ButtonPress {
                        button: *button,
                        pos: *pos,
                    });
                }
                Event::Configure { pos, size } => {
                    self.signals.configure.emit(&Geometry::new(*pos, *size));
                }
                Event::Other(_) => {}
            }
        }

        // One redraw request per dispatch cycle, however many regions arrived.
        if !exposed.is_empty() {
            self.signals.expose.emit(&exposed);
        }
        Ok(())
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("cursor_visible", &self.cursor_visible.get())
            .field("hide_timeout", &self.hide_timeout.get())
            .field("fullscreen_saved", &self.fullscreen_saved.get())
            .finish()
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        debug!(target: "window", "window.drop window={}", self.id);
    }
}

/// Re-entrancy guard around a fullscreen transition.
struct Transition<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> Transition<'a> {
    fn begin(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
