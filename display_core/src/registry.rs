use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use crate::error::DisplayResult;
use crate::event::{Event, WindowId};

/// Receiver of one window's ordered event batch.
pub trait EventHandler {
    fn handle_events(&self, events: &[Event]) -> DisplayResult<()>;
}

pub enum Lookup {
    Live(Rc<dyn EventHandler>),
    /// Entry existed but its window is gone; the entry has been removed.
    Pruned,
    /// Identity was pruned by an earlier lookup (late events are benign).
    Retired,
    /// Identity was never registered.
    Unknown,
}

/// Tombstones kept for pruned identities; the oldest are forgotten first.
pub const RETIRED_LIMIT: usize = 1024;

/// Window identity → non-owning handle.
///
/// Dead entries are only discovered (and removed) when a dispatch looks them up.
pub struct WindowRegistry {
    entries: HashMap<WindowId, Weak<dyn EventHandler>>,
    retired: HashSet<WindowId>,
    retired_order: VecDeque<WindowId>,
    retired_limit: usize,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::with_retired_limit(RETIRED_LIMIT)
    }
}

impl WindowRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retired_limit(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            retired: HashSet::new(),
            retired_order: VecDeque::new(),
            retired_limit: limit.max(1),
        }
    }

    /// Later registrations for the same identity replace earlier ones.
    pub fn insert(&mut self, id: WindowId, handler: Weak<dyn EventHandler>) {
        if self.retired.remove(&id) {
            self.retired_order.retain(|r| *r != id);
        }
        self.entries.insert(id, handler);
    }

    pub fn lookup(&mut self, id: WindowId) -> Lookup {
        let Some(weak) = self.entries.get(&id) else {
            if self.retired.contains(&id) {
                return Lookup::Retired;
            }
            return Lookup::Unknown;
        };
        match weak.upgrade() {
            Some(handler) => Lookup::Live(handler),
            None => {
                self.entries.remove(&id);
                self.retire(id);
                Lookup::Pruned
            }
        }
    }

    fn retire(&mut self, id: WindowId) {
        if !self.retired.insert(id) {
            return;
        }
        self.retired_order.push_back(id);
        while self.retired_order.len() > self.retired_limit {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }

    #[inline]
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    #[inline]
    pub fn contains(&self, id: WindowId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of entries, dead ones included until pruned.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
