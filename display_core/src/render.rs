//! Render-aware windows.
//!
//! A [`RenderableWindow`] wraps a plain [`Window`] and an external
//! [`Renderer`]. Exposure becomes damage, a size change resizes the render
//! surface, and either one triggers a render pass followed by a flush.
//! Plain windows carry no renderer at all.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use log::{debug, info, warn};

use crate::display::{self, DisplayConnection};
use crate::error::{DisplayError, DisplayResult};
use crate::event::Event;
use crate::geometry::{Point, Rect, Size};
use crate::native::NativeDisplay;
use crate::registry::EventHandler;
use crate::window::{Window, WindowOptions};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderEngine {
    Software,
    Gl,
}

impl RenderEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Software => "software_x11",
            Self::Gl => "gl_x11",
        }
    }
}

impl FromStr for RenderEngine {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software_x11" | "software" => Ok(Self::Software),
            "gl_x11" | "gl" => Ok(Self::Gl),
            other => Err(DisplayError::configuration(format!("unsupported render engine '{other}'"))),
        }
    }
}

impl fmt::Display for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drawing backend behind a [`RenderableWindow`].
pub trait Renderer {
    fn output_size(&self) -> Size;

    fn set_output_size(&mut self, size: Size);

    fn set_viewport(&mut self, origin: Point, size: Size);

    fn add_damage(&mut self, rect: Rect);

    /// Draw pending damage; returns the regions actually updated.
    fn render(&mut self) -> anyhow::Result<Vec<Rect>>;
}

/// Capability of windows that own a render surface.
pub trait Renderable {
    fn window(&self) -> &Rc<Window>;

    /// Render pass under the display lock, then flush.
    fn render(&self) -> DisplayResult<Vec<Rect>>;
}

pub struct RenderableWindow {
    window: Rc<Window>,
    engine: RenderEngine,
    renderer: RefCell<Box<dyn Renderer>>,
    last_damage: RefCell<Vec<Rect>>,
    frames: Cell<u64>,
    // Declared last: the surface is released before the display handle.
    _native: Rc<dyn NativeDisplay>,
}

impl RenderableWindow {
    /// Build the base window, size the surface to it, and take over event
    /// routing for its identity.
    pub fn new(
        display: Option<&DisplayConnection>,
        engine: &str,
        opts: WindowOptions,
        renderer: Box<dyn Renderer>,
    ) -> DisplayResult<Rc<Self>> {
        let engine: RenderEngine = engine.parse()?;
        opts.validate()?;
        let display = display::resolve(display)?;
        if !display.native().supports_engine(engine) {
            return Err(DisplayError::configuration(format!(
                "render engine '{engine}' is not available on display '{}'",
                display.native().name()
            )));
        }

        let window = Window::new(Some(&display), opts)?;
        let size = window.geometry().size;

        let mut renderer = renderer;
        renderer.set_output_size(size);
        renderer.set_viewport(Point::ORIGIN, size);

        let this = Rc::new(Self {
            window,
            engine,
            renderer: RefCell::new(renderer),
            last_damage: RefCell::new(Vec::new()),
            frames: Cell::new(0),
            _native: display.native().clone(),
        });

        let handler = Rc::downgrade(&this) as Weak<dyn EventHandler>;
        display.register(this.window.id(), handler);

        info!(
            target: "render",
            "render.window window={} engine={} surface={}x{}",
            this.window.id(),
            engine,
            size.width,
            size.height
        );
        Ok(this)
    }

    #[inline]
    pub fn engine(&self) -> RenderEngine {
        self.engine
    }

    /// Damage collected by the most recent dispatch cycle.
    pub fn last_damage(&self) -> Vec<Rect> {
        self.last_damage.borrow().clone()
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// Scoped access to the renderer. Do not call back into this window
    /// from `f`.
    pub fn with_renderer<R>(&self, f: impl FnOnce(&mut dyn Renderer) -> R) -> R {
        let mut renderer = self.renderer.borrow_mut();
        f(renderer.as_mut())
    }

    fn resize_surface(&self, size: Size) -> bool {
        let mut renderer = self.renderer.borrow_mut();
        if renderer.output_size() == size {
            return false;
        }
        // Best effort on accelerated surfaces: the server may still be
        // resizing the window when this runs.
        if self.engine == RenderEngine::Gl {
            warn!(target: "render", "surface.resize gl window={} may race the server", self.window.id());
        }
        renderer.set_output_size(size);
        renderer.set_viewport(Point::ORIGIN, size);
        debug!(target: "render", "surface.resize window={} size={}x{}", self.window.id(), size.width, size.height);
        true
    }
}

impl Renderable for RenderableWindow {
    #[inline]
    fn window(&self) -> &Rc<Window> {
        &self.window
    }

    fn render(&self) -> DisplayResult<Vec<Rect>> {
        let display = self.window.display();
        let updated = {
            let _lock = display.lock();
            let drawn = self.renderer.borrow_mut().render();
            drawn.map_err(|source| DisplayError::Render { source })?
        };
        self.frames.set(self.frames.get() + 1);
        debug!(target: "render", "render.frame window={} regions={}", self.window.id(), updated.len());

        display.pump()?;
        Ok(updated)
    }
}

impl EventHandler for RenderableWindow {
    fn handle_events(&self, events: &[Event]) -> DisplayResult<()> {
        let mut damage = Vec::new();
        let mut needs_render = false;

        for event in events {
            match event {
                Event::Expose(rect) => {
                    damage.push(*rect);
                    needs_render = true;
                }
                Event::Configure { size, .. } => {
                    needs_render |= self.resize_surface(*size);
                }
                _ => {}
            }
        }

        if !damage.is_empty() {
            let mut renderer = self.renderer.borrow_mut();
            for rect in &damage {
                renderer.add_damage(*rect);
            }
        }
        *self.last_damage.borrow_mut() = damage;

        self.window.handle_events(events)?;

        if needs_render {
            self.render()?;
        }
        Ok(())
    }
}

impl fmt::Debug for RenderableWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderableWindow")
            .field("window", &self.window)
            .field("engine", &self.engine)
            .field("frames", &self.frames.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDisplay;
    use crate::sched::Scheduler;

    #[derive(Default)]
    struct Log {
        size: Size,
        viewport: Option<(Point, Size)>,
        damage: Vec<Rect>,
        frames: usize,
        fail: bool,
    }

    struct Recording(Rc<RefCell<Log>>);

    impl Renderer for Recording {
        fn output_size(&self) -> Size {
            self.0.borrow().size
        }

        fn set_output_size(&mut self, size: Size) {
            self.0.borrow_mut().size = size;
        }

        fn set_viewport(&mut self, origin: Point, size: Size) {
            self.0.borrow_mut().viewport = Some((origin, size));
        }

        fn add_damage(&mut self, rect: Rect) {
            self.0.borrow_mut().damage.push(rect);
        }

        fn render(&mut self) -> anyhow::Result<Vec<Rect>> {
            let mut log = self.0.borrow_mut();
            if log.fail {
                anyhow::bail!("surface lost");
            }
            log.frames += 1;
            Ok(std::mem::take(&mut log.damage))
        }
    }

    struct Rig {
        native: HeadlessDisplay,
        conn: DisplayConnection,
        log: Rc<RefCell<Log>>,
    }

    fn rig(native: HeadlessDisplay) -> Rig {
        let conn = DisplayConnection::new(Rc::new(native.clone()), Rc::new(Scheduler::new()));
        Rig {
            native,
            conn,
            log: Rc::new(RefCell::new(Log::default())),
        }
    }

    fn open(r: &Rig, engine: &str) -> DisplayResult<Rc<RenderableWindow>> {
        RenderableWindow::new(
            Some(&r.conn),
            engine,
            WindowOptions::new(Size::new(320, 200), "canvas"),
            Box::new(Recording(r.log.clone())),
        )
    }

    #[test]
    fn engine_names() {
        assert_eq!("software_x11".parse::<RenderEngine>().unwrap(), RenderEngine::Software);
        assert_eq!("GL".parse::<RenderEngine>().unwrap(), RenderEngine::Gl);
        assert!(matches!(
            "vulkan".parse::<RenderEngine>(),
            Err(DisplayError::Configuration(_))
        ));
    }

    #[test]
    fn unsupported_engine_is_a_configuration_error() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        assert!(matches!(open(&r, "gl_x11"), Err(DisplayError::Configuration(_))));
        assert_eq!(r.conn.window_count(), 0);

        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)).with_gl(true));
        assert_eq!(open(&r, "gl_x11").unwrap().engine(), RenderEngine::Gl);
    }

    #[test]
    fn surface_starts_at_window_size() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let _w = open(&r, "software").unwrap();
        let log = r.log.borrow();
        assert_eq!(log.size, Size::new(320, 200));
        assert_eq!(log.viewport, Some((Point::ORIGIN, Size::new(320, 200))));
    }

    #[test]
    fn exposure_renders_once_per_cycle() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();
        let exposes = Rc::new(Cell::new(0));
        let e = exposes.clone();
        w.window().signals().expose.connect(move |_| e.set(e.get() + 1));

        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 5, 5);
        r.native.push(w.window().id(), Event::Expose(a));
        r.native.push(w.window().id(), Event::Expose(b));
        r.conn.pump().unwrap();

        assert_eq!(w.frames(), 1);
        assert_eq!(w.last_damage(), vec![a, b]);
        assert_eq!(exposes.get(), 1);
        assert_eq!(r.log.borrow().frames, 1);
        assert!(r.log.borrow().damage.is_empty());
    }

    #[test]
    fn resize_follows_configure() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();

        w.window().resize(Size::new(640, 400), false).unwrap();
        assert_eq!(r.log.borrow().size, Size::new(640, 400));
        assert_eq!(r.log.borrow().viewport, Some((Point::ORIGIN, Size::new(640, 400))));
        assert_eq!(w.frames(), 1);

        // Move only: same size, no render.
        w.window().move_to(Point::new(10, 10)).unwrap();
        assert_eq!(w.frames(), 1);
    }

    #[test]
    fn show_exposes_and_renders() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();
        w.window().show(true);
        r.conn.pump().unwrap();
        assert_eq!(w.last_damage(), vec![Rect::new(0, 0, 320, 200)]);
        assert_eq!(w.frames(), 1);
    }

    #[test]
    fn render_failure_releases_the_lock() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();
        r.log.borrow_mut().fail = true;

        r.native.push(w.window().id(), Event::Expose(Rect::new(0, 0, 1, 1)));
        let err = r.conn.pump().unwrap_err();
        assert!(matches!(err, DisplayError::Render { .. }));
        assert_eq!(r.native.lock_depth(), 0);
        assert_eq!(w.frames(), 0);
    }

    #[test]
    fn failing_render_does_not_starve_other_windows() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let canvas = open(&r, "software").unwrap();
        let plain = Window::new(Some(&r.conn), WindowOptions::new(Size::new(50, 50), "plain")).unwrap();
        let keys = Rc::new(RefCell::new(Vec::new()));
        let k = keys.clone();
        plain.signals().key_press.connect(move |key| k.borrow_mut().push(*key));
        r.log.borrow_mut().fail = true;

        r.native.push(canvas.window().id(), Event::Expose(Rect::new(0, 0, 8, 8)));
        r.native.push(plain.id(), Event::KeyPress(97));
        let err = r.conn.pump().unwrap_err();

        assert!(matches!(err, DisplayError::Render { .. }));
        assert_eq!(*keys.borrow(), vec![crate::keys::Key::Char('a')]);
        assert_eq!(r.conn.stats().cycles, 1);
        assert_eq!(r.conn.stats().dispatched, 2);
    }

    #[test]
    fn bad_options_never_open_the_default_display() {
        display::reset_default_connection();
        display::set_default_factory(|| Err(DisplayError::Native("no display".into())));

        let log = Rc::new(RefCell::new(Log::default()));
        let err = RenderableWindow::new(None, "software", WindowOptions::default(), Box::new(Recording(log)))
            .unwrap_err();
        assert!(matches!(err, DisplayError::Configuration(_)));

        display::reset_default_connection();
        display::set_default_factory(|| DisplayConnection::open(""));
    }

    #[test]
    fn base_window_signals_still_fire() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();
        let keys = Rc::new(Cell::new(0));
        let k = keys.clone();
        w.window().signals().key_press.connect(move |_| k.set(k.get() + 1));

        r.native.push(w.window().id(), Event::KeyPress(97));
        r.conn.pump().unwrap();
        assert_eq!(keys.get(), 1);
        assert_eq!(w.frames(), 0);
    }

    #[test]
    fn explicit_render_runs_under_the_lock() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();

        w.with_renderer(|renderer| renderer.add_damage(Rect::new(1, 2, 3, 4)));
        let drawn = w.render().unwrap();
        assert_eq!(drawn, vec![Rect::new(1, 2, 3, 4)]);
        assert_eq!(r.native.lock_depth(), 0);
        assert_eq!(w.with_renderer(|renderer| renderer.output_size()), Size::new(320, 200));
    }

    #[test]
    fn dropping_the_renderable_prunes_its_entry() {
        let r = rig(HeadlessDisplay::new("", Size::new(1024, 768)));
        let w = open(&r, "software").unwrap();
        let id = w.window().id();
        drop(w);

        r.native.push(id, Event::Expose(Rect::new(0, 0, 1, 1)));
        r.conn.pump().unwrap();
        assert!(!r.conn.is_registered(id));
        assert!(r.native.window_info(id).is_none());
    }
}
