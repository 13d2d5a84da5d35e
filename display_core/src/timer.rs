use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::sched::{TimerId, TimerService};

/// Single-shot, restartable timer owned by one window.
///
/// `start` cancels any pending fire first. A generation counter also guards
/// the callback, so a fire that the service could not cancel is ignored.
pub struct CursorHideTimer {
    service: Rc<dyn TimerService>,
    on_fire: Rc<dyn Fn()>,
    pending: Rc<Cell<Option<TimerId>>>,
    generation: Rc<Cell<u64>>,
}

impl CursorHideTimer {
    pub fn new<F>(service: Rc<dyn TimerService>, on_fire: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            service,
            on_fire: Rc::new(on_fire),
            pending: Rc::new(Cell::new(None)),
            generation: Rc::new(Cell::new(0)),
        }
    }

    /// (Re)arm with a fresh deadline.
    pub fn start(&self, delay: Duration) {
        self.cancel();

        let armed = self.generation.get();
        let generation = self.generation.clone();
        let pending = self.pending.clone();
        let on_fire = self.on_fire.clone();

        let id = self.service.schedule(
            delay,
            Box::new(move || {
                if generation.get() != armed {
                    return;
                }
                pending.set(None);
                on_fire();
            }),
        );
        self.pending.set(Some(id));
    }

    pub fn cancel(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        if let Some(id) = self.pending.take() {
            self.service.cancel(id);
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

impl Drop for CursorHideTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
