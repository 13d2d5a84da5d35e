//! Named per-window signal channels.
//!
//! Single-threaded by design: handlers are `Rc<dyn Fn>` and may connect,
//! disconnect or emit again while an emission is running. An emission works
//! on a snapshot of the subscriber list taken when it starts.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::geometry::{Geometry, Point, Rect};
use crate::keys::Key;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

type Slot<T> = Rc<dyn Fn(&T)>;

pub struct Signal<T> {
    name: &'static str,
    slots: RefCell<Vec<(SubscriptionId, Slot<T>)>>,
    next_id: Cell<u64>,
}

impl<T> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn connect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.slots.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Returns false when `id` was not connected (or already removed).
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|(sid, _)| *sid != id);
        slots.len() != before
    }

    pub fn disconnect_all(&self) {
        self.slots.borrow_mut().clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Call every subscriber in connection order. Returns how many ran.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Slot<T>> = self.slots.borrow().iter().map(|(_, s)| s.clone()).collect();
        for slot in &snapshot {
            slot(value);
        }
        snapshot.len()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("subscribers", &self.len())
            .finish()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ButtonPress {
    pub button: u32,
    pub pos: Point,
}

/// Signal bus owned by every window.
#[derive(Debug)]
pub struct WindowSignals {
    /// One emission per KeyPress, carrying the translated key.
    pub key_press: Signal<Key>,
    /// One emission per dispatch cycle with every exposed region, in arrival order.
    pub expose: Signal<Vec<Rect>>,
    pub button_press: Signal<ButtonPress>,
    /// One emission per ConfigureNotify.
    pub configure: Signal<Geometry>,
    /// Emitted after a fullscreen transition was applied.
    pub fullscreen: Signal<bool>,
}

impl WindowSignals {
    pub fn new() -> Self {
        Self {
            key_press: Signal::new("key_press"),
            expose: Signal::new("expose"),
            button_press: Signal::new("button_press"),
            configure: Signal::new("configure"),
            fullscreen: Signal::new("fullscreen"),
        }
    }
}

impl Default for WindowSignals {
    fn default() -> Self {
        Self::new()
    }
}
