mod renderer;
mod shutdown;

use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use display_core::{
    logging, DisplayConfig, DisplayConnection, Event, HeadlessDisplay, Key, Point, Rect, Renderable,
    RenderableWindow, Scheduler, Size, Window, WindowOptions,
};
use log::{info, warn};

use crate::renderer::BufferRenderer;
use crate::shutdown::{ShutdownFlag, StopReason};

const STEP: Duration = Duration::from_millis(16);
const RUN_LIMIT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "display.toml".to_string());
    let cfg = DisplayConfig::load_or_default(&path)?;
    logging::init(&cfg.log_filter);

    let shutdown = ShutdownFlag::new();
    if let Err(e) = shutdown.install_ctrlc() {
        warn!(target: "display", "ctrlc handler not installed: {}", e);
    }

    let native = HeadlessDisplay::new(cfg.display.clone(), Size::new(cfg.screen_width, cfg.screen_height));
    let sched = Scheduler::new();
    let conn = DisplayConnection::new(Rc::new(native.clone()), Rc::new(sched.clone()));
    conn.set_stats_logging(cfg.stats_log, cfg.stats_log_period_sec);

    let canvas = RenderableWindow::new(
        Some(&conn),
        "software_x11",
        WindowOptions::from_config(&cfg.window),
        Box::new(BufferRenderer::new()),
    )?;
    bind_keys(canvas.window(), &shutdown);
    canvas.window().show(true);

    let mut script = demo_script();
    let started = Instant::now();
    let mut last = started;

    info!(target: "display", "host.start window={} file='{}'", canvas.window().id(), path);
    while !shutdown.is_set() {
        let now = Instant::now();
        let elapsed = now - started;

        while script.front().is_some_and(|(at, _)| *at <= elapsed) {
            if let Some((_, event)) = script.pop_front() {
                native.push(canvas.window().id(), event);
            }
        }

        sched.tick(now - last);
        last = now;
        conn.pump()?;

        if elapsed >= RUN_LIMIT {
            shutdown.request(StopReason::RunLimit);
            break;
        }
        thread::sleep(STEP);
    }

    let stats = conn.stats();
    info!(
        target: "display",
        "host.stop reason={} frames={} cycles={} events={} dispatched={}",
        shutdown.reason().map_or_else(|| "unknown".to_string(), |r| r.to_string()),
        canvas.frames(),
        stats.cycles,
        stats.events,
        stats.dispatched
    );
    Ok(())
}

/// `q`/`esc` quit, `f` toggles fullscreen.
fn bind_keys(window: &Rc<Window>, shutdown: &ShutdownFlag) {
    let weak: Weak<Window> = Rc::downgrade(window);
    let shutdown = shutdown.clone();

    window.signals().key_press.connect(move |key| {
        info!(target: "window", "key.press key={}", key);
        match key {
            Key::Char('q') | Key::Named("esc") => {
                shutdown.request(StopReason::QuitKey);
            }
            Key::Char('f') => {
                let Some(window) = weak.upgrade() else { return };
                if let Err(e) = window.set_fullscreen(!window.is_fullscreen()) {
                    warn!(target: "window", "fullscreen toggle failed: {}", e);
                }
            }
            _ => {}
        }
    });

    window.signals().fullscreen.connect(|on| {
        info!(target: "window", "fullscreen.changed on={}", on);
    });
}

/// Input the headless display replays, as offsets from start.
fn demo_script() -> VecDeque<(Duration, Event)> {
    let ms = Duration::from_millis;
    let motion = |x, y| Event::Motion {
        pos: Point::new(x, y),
        root: Point::new(x, y),
    };

    VecDeque::from(vec![
        (ms(100), motion(10, 10)),
        (ms(150), motion(40, 25)),
        (ms(300), Event::KeyPress(u32::from(b'f'))),
        (ms(600), Event::Expose(Rect::new(0, 0, 64, 64))),
        (ms(900), Event::KeyPress(u32::from(b'f'))),
        (ms(1200), Event::KeyPress(338)),
        (ms(1500), Event::KeyPress(u32::from(b'q'))),
    ])
}
