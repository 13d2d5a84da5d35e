//! Connection-level event fan-out.
//!
//! # Re-entrancy
//!
//! `pump()` is the single entry point for both host triggers: socket
//! readiness and idle. Hosts must call it on *either* trigger (level
//! triggered), since a long draw can starve the socket callback. Window
//! methods call `pump()` again from inside a dispatch to flush their own side
//! effects; each call only drains what the binding has at that moment, so no
//! event is ever delivered twice.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use log::{debug, error, info, trace, warn};

use crate::config::DisplayConfig;
use crate::error::{DisplayError, DisplayResult};
use crate::event::{Event, RawEvent, WindowId};
use crate::geometry::Size;
use crate::headless::HeadlessDisplay;
use crate::native::NativeDisplay;
use crate::registry::{EventHandler, Lookup, WindowRegistry};
use crate::sched::{Scheduler, TimerService};
use crate::telemetry::{CycleReport, PumpStats, Telemetry};

/// Per-window batches in first-arrival order of the window identity.
pub type Batches = Vec<(WindowId, Vec<Event>)>;

/// Group a flat event stream by window.
///
/// Arrival order is kept inside every group. Events that are not
/// window-scoped, or carry no window identity, are dropped; the second
/// value counts them.
pub fn demultiplex(raw: Vec<RawEvent>) -> (Batches, usize) {
    let mut batches: Batches = Vec::new();
    let mut index: HashMap<WindowId, usize> = HashMap::new();
    let mut dropped = 0usize;

    for raw_event in raw {
        if !raw_event.is_routable() {
            trace!(
                target: "display",
                "pump.drop window={} code={}",
                raw_event.window,
                raw_event.event.code()
            );
            dropped += 1;
            continue;
        }
        let RawEvent { window, event } = raw_event;
        let slot = *index.entry(window).or_insert_with(|| {
            batches.push((window, Vec::new()));
            batches.len() - 1
        });
        batches[slot].1.push(event);
    }

    (batches, dropped)
}

struct DisplayInner {
    native: Rc<dyn NativeDisplay>,
    timers: Rc<dyn TimerService>,
    registry: RefCell<WindowRegistry>,
    telemetry: RefCell<Telemetry>,
    depth: Cell<u32>,
}

/// Shared handle to one native display connection.
///
/// Cloning is cheap and shares the registry. Windows keep a clone, the
/// registry only keeps weak handles back to windows.
#[derive(Clone)]
pub struct DisplayConnection {
    inner: Rc<DisplayInner>,
}

impl DisplayConnection {
    pub fn new(native: Rc<dyn NativeDisplay>, timers: Rc<dyn TimerService>) -> Self {
        info!(target: "display", "display.open name='{}'", native.name());
        Self {
            inner: Rc::new(DisplayInner {
                native,
                timers,
                registry: RefCell::new(WindowRegistry::new()),
                telemetry: RefCell::new(Telemetry::new()),
                depth: Cell::new(0),
            }),
        }
    }

    /// Headless connection with its own [`Scheduler`].
    pub fn open(name: &str) -> DisplayResult<Self> {
        let cfg = DisplayConfig {
            display: name.to_string(),
            ..DisplayConfig::default()
        };
        Self::open_with(&cfg)
    }

    pub fn open_with(cfg: &DisplayConfig) -> DisplayResult<Self> {
        if cfg.screen_width == 0 || cfg.screen_height == 0 {
            return Err(DisplayError::configuration(format!(
                "screen size {}x{} is empty",
                cfg.screen_width, cfg.screen_height
            )));
        }

        let native = HeadlessDisplay::new(cfg.display.clone(), Size::new(cfg.screen_width, cfg.screen_height));
        let conn = Self::new(Rc::new(native), Rc::new(Scheduler::new()));
        conn.set_stats_logging(cfg.stats_log, cfg.stats_log_period_sec);
        Ok(conn)
    }

    /// Periodic `pump.stats` log line.
    pub fn set_stats_logging(&self, enabled: bool, period_sec: f32) {
        self.inner
            .telemetry
            .borrow_mut()
            .configure_logging(enabled, period_sec);
    }

    #[inline]
    pub fn native(&self) -> &Rc<dyn NativeDisplay> {
        &self.inner.native
    }

    #[inline]
    pub fn timers(&self) -> &Rc<dyn TimerService> {
        &self.inner.timers
    }

    /// Track `handler` for events addressed to `id`. Does not keep it alive.
    pub fn register(&self, id: WindowId, handler: Weak<dyn EventHandler>) {
        self.inner.registry.borrow_mut().insert(id, handler);
        debug!(target: "display", "registry.insert window={}", id);
    }

    /// Registry entries, including dead ones that were not pruned yet.
    #[inline]
    pub fn window_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    #[inline]
    pub fn is_registered(&self, id: WindowId) -> bool {
        self.inner.registry.borrow().contains(id)
    }

    /// Drain and dispatch everything the binding has right now.
    ///
    /// Always returns `Ok(true)`: the host keeps calling on every trigger.
    /// Fails with [`DisplayError::InvariantViolation`] when a batch targets
    /// an identity that was never registered; nothing is dispatched then.
    /// A window whose handler fails does not stop the others; the first such
    /// error is returned once every batch has been dispatched.
    pub fn pump(&self) -> DisplayResult<bool> {
        let raw = self.inner.native.poll_events()?;
        if raw.is_empty() {
            return Ok(true);
        }

        let _depth = DepthGuard::enter(&self.inner.depth);
        let mut report = CycleReport {
            events: raw.len(),
            depth: self.inner.depth.get(),
            ..CycleReport::default()
        };

        let (batches, dropped) = demultiplex(raw);
        report.dropped = dropped;

        // Resolve every target before dispatching anything: handlers re-enter
        // `pump()` and register windows, so the registry borrow must be short.
        let mut targets = Vec::with_capacity(batches.len());
        {
            let mut registry = self.inner.registry.borrow_mut();
            for (id, events) in batches {
                match registry.lookup(id) {
                    Lookup::Live(handler) => targets.push((id, handler, events)),
                    Lookup::Pruned => {
                        debug!(target: "display", "pump.prune window={} events={}", id, events.len());
                        report.pruned += 1;
                        report.orphaned += events.len();
                    }
                    Lookup::Retired => {
                        trace!(target: "display", "pump.orphan window={} events={}", id, events.len());
                        report.orphaned += events.len();
                    }
                    Lookup::Unknown => {
                        error!(target: "display", "pump.unregistered window={}", id);
                        return Err(DisplayError::InvariantViolation { window: id });
                    }
                }
            }
        }

        // Every batch is dispatched; the first handler error is returned after.
        let mut failure = None;
        for (id, handler, events) in targets {
            trace!(target: "display", "pump.dispatch window={} events={}", id, events.len());
            report.dispatched += events.len();
            if let Err(e) = handler.handle_events(&events) {
                warn!(target: "display", "pump.handler_failed window={}: {}", id, e);
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }

        self.inner.telemetry.borrow_mut().record_cycle(&report);
        match failure {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Flush pending requests to the display server.
    #[inline]
    pub fn sync(&self) {
        self.inner.native.sync();
    }

    /// Take the drawing lock; released when the guard drops.
    pub fn lock(&self) -> DisplayLock<'_> {
        self.inner.native.lock();
        DisplayLock {
            native: &*self.inner.native,
        }
    }

    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    /// Screen size; `None` selects the default screen.
    #[inline]
    pub fn get_size(&self, screen: Option<u32>) -> Size {
        self.inner.native.screen_size(screen)
    }

    #[inline]
    pub fn socket(&self) -> Option<i32> {
        self.inner.native.socket()
    }

    #[inline]
    pub fn composite_supported(&self) -> bool {
        self.inner.native.composite_supported()
    }

    #[inline]
    pub fn stats(&self) -> PumpStats {
        self.inner.telemetry.borrow().stats()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &DisplayConnection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Scoped drawing lock, see [`DisplayConnection::lock`].
pub struct DisplayLock<'a> {
    native: &'a dyn NativeDisplay,
}

impl Drop for DisplayLock<'_> {
    fn drop(&mut self) {
        self.native.unlock();
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

// -----------------------------------------------------------------------------
// Default connection
// -----------------------------------------------------------------------------

type Factory = Box<dyn Fn() -> DisplayResult<DisplayConnection>>;

thread_local! {
    static DEFAULT: RefCell<Option<DisplayConnection>> = const { RefCell::new(None) };
    static FACTORY: RefCell<Option<Factory>> = const { RefCell::new(None) };
}

/// The lazily created default connection of this thread.
///
/// Built by the factory installed with [`set_default_factory`], or by
/// [`DisplayConnection::open`] with an empty name. Created on first use and
/// then reused until [`reset_default_connection`].
pub fn default_connection() -> DisplayResult<DisplayConnection> {
    if let Some(conn) = DEFAULT.with(|d| d.borrow().clone()) {
        return Ok(conn);
    }

    // Factory runs without any borrow held; it may open windows itself.
    let factory = FACTORY.with(|f| f.borrow_mut().take());
    let created = match &factory {
        Some(f) => f(),
        None => DisplayConnection::open(""),
    };
    FACTORY.with(|f| {
        let mut slot = f.borrow_mut();
        if slot.is_none() {
            *slot = factory;
        }
    });

    let conn = created?;
    DEFAULT.with(|d| *d.borrow_mut() = Some(conn.clone()));
    Ok(conn)
}

/// Replace the factory used for the next default connection.
pub fn set_default_factory<F>(factory: F)
where
    F: Fn() -> DisplayResult<DisplayConnection> + 'static,
{
    FACTORY.with(|f| *f.borrow_mut() = Some(Box::new(factory)));
}

/// Forget the current default so the next use creates a fresh one.
pub fn reset_default_connection() {
    let old = DEFAULT.with(|d| d.borrow_mut().take());
    drop(old);
}

/// Explicit connection if given, default otherwise.
pub fn resolve(display: Option<&DisplayConnection>) -> DisplayResult<DisplayConnection> {
    match display {
        Some(d) => Ok(d.clone()),
        None => default_connection(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect};

    fn key(w: u64, code: u32) -> RawEvent {
        RawEvent::new(WindowId(w), Event::KeyPress(code))
    }

    #[test]
    fn demultiplex_groups_by_first_arrival() {
        let raw = vec![
            key(2, 1),
            key(1, 2),
            RawEvent::connection(Event::Other(34)),
            key(2, 3),
            RawEvent::new(WindowId(1), Event::Other(19)),
            RawEvent::new(WindowId(1), Event::Expose(Rect::new(0, 0, 1, 1))),
            RawEvent::connection(Event::KeyPress(9)),
        ];

        let (batches, dropped) = demultiplex(raw);
        assert_eq!(dropped, 3);
        assert_eq!(
            batches,
            vec![
                (WindowId(2), vec![Event::KeyPress(1), Event::KeyPress(3)]),
                (WindowId(1), vec![Event::KeyPress(2), Event::Expose(Rect::new(0, 0, 1, 1))]),
            ]
        );
    }

    #[test]
    fn unregistered_identity_is_an_invariant_violation() {
        let native = HeadlessDisplay::new("", Size::new(100, 100));
        let conn = DisplayConnection::new(Rc::new(native.clone()), Rc::new(Scheduler::new()));

        native.push(WindowId(0x99), Event::Motion { pos: Point::ORIGIN, root: Point::ORIGIN });
        let err = conn.pump().unwrap_err();
        assert!(matches!(err, DisplayError::InvariantViolation { window: WindowId(0x99) }));
    }

    #[test]
    fn empty_pump_keeps_polling() {
        let conn = DisplayConnection::open("").unwrap();
        assert!(conn.pump().unwrap());
        assert_eq!(conn.stats().cycles, 0);
    }

    #[test]
    fn lock_guard_unlocks_on_every_exit() {
        let native = HeadlessDisplay::new("", Size::new(100, 100));
        let conn = DisplayConnection::new(Rc::new(native.clone()), Rc::new(Scheduler::new()));

        let result: Result<(), &str> = conn.with_lock(|| {
            assert_eq!(native.lock_depth(), 1);
            Err("draw failed")
        });
        assert!(result.is_err());
        assert_eq!(native.lock_depth(), 0);

        {
            let _outer = conn.lock();
            let _inner = conn.lock();
            assert_eq!(native.lock_depth(), 2);
        }
        assert_eq!(native.lock_depth(), 0);
    }

    #[test]
    fn capability_and_flush_passthroughs() {
        let native = HeadlessDisplay::new(":2", Size::new(100, 100)).with_composite(true);
        let conn = DisplayConnection::new(Rc::new(native.clone()), Rc::new(Scheduler::new()));

        assert!(conn.composite_supported());
        assert_eq!(conn.socket(), None);
        assert_eq!(conn.native().name(), ":2");

        let before = native.sync_count();
        conn.sync();
        conn.pump().unwrap();
        assert_eq!(native.sync_count(), before + 2);
    }

    #[test]
    fn unbounded_stats_period_opens() {
        let cfg = DisplayConfig::from_toml_str("stats_log = true\nstats_log_period_sec = inf").unwrap();
        let conn = DisplayConnection::open_with(&cfg).unwrap();
        assert!(conn.pump().unwrap());
    }

    #[test]
    fn default_connection_is_lazy_and_resettable() {
        reset_default_connection();
        set_default_factory(|| {
            let cfg = DisplayConfig {
                screen_width: 320,
                screen_height: 240,
                ..DisplayConfig::default()
            };
            DisplayConnection::open_with(&cfg)
        });

        let a = default_connection().unwrap();
        let b = default_connection().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.get_size(None), Size::new(320, 240));

        reset_default_connection();
        let c = default_connection().unwrap();
        assert!(!a.ptr_eq(&c));
        reset_default_connection();
    }
}
