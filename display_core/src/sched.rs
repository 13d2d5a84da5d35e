use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TimerId(u64);

/// Cooperative one-shot timer facility.
///
/// Timers are never periodic: to "restart" one, cancel it and schedule a new one.
/// Callbacks run on the thread that drives the service.
pub trait TimerService {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Returns false when the timer already fired or was cancelled.
    fn cancel(&self, id: TimerId) -> bool;

    /// Advance host-driven services. Services with their own clock ignore it.
    fn tick(&self, _elapsed: Duration) -> usize {
        0
    }
}

/// Host-driven timer queue on a virtual clock.
///
/// The host calls [`Scheduler::tick`] with the elapsed wall time (or any
/// synthetic step in tests). Cloning shares the same queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerState>>,
}

#[derive(Default)]
struct SchedulerState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Box<dyn FnOnce()>>,
    deadlines: HashMap<u64, Duration>,
}

impl Scheduler {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time since creation.
    #[inline]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Time until the earliest pending timer, `None` if idle.
    pub fn next_deadline(&self) -> Option<Duration> {
        let s = self.inner.borrow();
        s.queue.keys().next().map(|(deadline, _)| deadline.saturating_sub(s.now))
    }

    /// Advance the clock and fire every timer that is due, earliest first.
    ///
    /// Timers scheduled by a callback during this tick wait for the next one,
    /// so a tick always terminates.
    pub fn tick(&self, elapsed: Duration) -> usize {
        let (now, watermark) = {
            let mut s = self.inner.borrow_mut();
            s.now = s.now.saturating_add(elapsed);
            (s.now, s.next_id)
        };

        let mut fired = 0usize;
        loop {
            // Borrow released before the callback runs; callbacks reschedule.
            let due = {
                let mut s = self.inner.borrow_mut();
                let key = s
                    .queue
                    .keys()
                    .take_while(|(deadline, _)| *deadline <= now)
                    .find(|(_, id)| *id < watermark)
                    .copied();
                key.and_then(|k| {
                    s.deadlines.remove(&k.1);
                    s.queue.remove(&k)
                })
            };

            let Some(callback) = due else { break };
            callback();
            fired += 1;
        }
        fired
    }
}

impl TimerService for Scheduler {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut s = self.inner.borrow_mut();
        let id = s.next_id;
        s.next_id += 1;

        let deadline = s.now.saturating_add(delay);
        s.queue.insert((deadline, id), callback);
        s.deadlines.insert(id, deadline);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let mut s = self.inner.borrow_mut();
        match s.deadlines.remove(&id.0) {
            Some(deadline) => s.queue.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    fn tick(&self, elapsed: Duration) -> usize {
        Scheduler::tick(self, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_in_deadline_order() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (name, delay) in [("late", 30), ("early", 10), ("mid", 20)] {
            let log = log.clone();
            sched.schedule(ms(delay), Box::new(move || log.borrow_mut().push(name)));
        }

        assert_eq!(sched.tick(ms(15)), 1);
        assert_eq!(sched.tick(ms(100)), 2);
        assert_eq!(*log.borrow(), vec!["early", "mid", "late"]);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn cancel_prevents_fire() {
        let sched = Scheduler::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let id = sched.schedule(ms(5), Box::new(move || h.set(h.get() + 1)));
        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));

        sched.tick(ms(10));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn zero_delay_from_callback_waits_for_next_tick() {
        let sched = Scheduler::new();
        let hits = Rc::new(Cell::new(0));

        let s = sched.clone();
        let h = hits.clone();
        sched.schedule(
            Duration::ZERO,
            Box::new(move || {
                let h = h.clone();
                s.schedule(Duration::ZERO, Box::new(move || h.set(h.get() + 1)));
            }),
        );

        assert_eq!(sched.tick(Duration::ZERO), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(sched.tick(Duration::ZERO), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn next_deadline_is_relative() {
        let sched = Scheduler::new();
        assert_eq!(sched.next_deadline(), None);
        sched.schedule(ms(50), Box::new(|| {}));
        sched.tick(ms(20));
        assert_eq!(sched.next_deadline(), Some(ms(30)));
        assert_eq!(sched.now(), ms(20));
    }
}
