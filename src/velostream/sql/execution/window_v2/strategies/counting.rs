//! Counting Window Strategy Implementation
//!
//! Each group key has its own window that closes the moment it holds `N` records,
//! independent of time. Groups advance independently: with `N = 10`, a group that
//! has seen 30 records has fired three times, whatever the other groups did.
//!
//! The window reported on fire spans the first and last record times it saw.

use crate::velostream::sql::execution::internal::GroupKey;
use crate::velostream::sql::execution::window_v2::traits::WindowStrategy;
use crate::velostream::sql::execution::window_v2::types::{
    Assignment, ClosedWindow, WindowAssignment, WindowBounds, WindowId, WindowIdAllocator,
};
use rustc_hash::FxHashMap;

#[derive(Debug)]
struct CountingInstance {
    id: WindowId,
    count: u64,
    first: i64,
    last: i64,
}

impl CountingInstance {
    fn bounds(&self) -> WindowBounds {
        WindowBounds::new(self.first, self.last.saturating_add(1))
    }

    fn closed(&self) -> ClosedWindow {
        ClosedWindow {
            id: self.id,
            bounds: self.bounds(),
        }
    }
}

#[derive(Debug)]
pub struct CountingWindowStrategy {
    capacity: u64,
    open: FxHashMap<GroupKey, CountingInstance>,
    /// Open order of groups, for deterministic flushes
    order: Vec<GroupKey>,
    ready: Vec<ClosedWindow>,
    ids: WindowIdAllocator,
}

impl CountingWindowStrategy {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity: capacity.max(1),
            open: FxHashMap::default(),
            order: Vec::new(),
            ready: Vec::new(),
            ids: WindowIdAllocator::default(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl WindowStrategy for CountingWindowStrategy {
    fn assign(&mut self, timestamp: i64, group: &GroupKey) -> Assignment {
        if !self.open.contains_key(group) {
            let instance = CountingInstance {
                id: self.ids.allocate(),
                count: 0,
                first: timestamp,
                last: timestamp,
            };
            self.open.insert(group.clone(), instance);
            self.order.push(group.clone());
        }

        let mut full = false;
        let mut assigned = None;
        if let Some(instance) = self.open.get_mut(group) {
            instance.count += 1;
            instance.first = instance.first.min(timestamp);
            instance.last = instance.last.max(timestamp);
            assigned = Some(WindowAssignment {
                id: instance.id,
                bounds: instance.bounds(),
            });
            full = instance.count >= self.capacity;
        }

        if full {
            if let Some(instance) = self.open.remove(group) {
                self.order.retain(|key| key != group);
                self.ready.push(instance.closed());
            }
        }

        Assignment {
            windows: assigned.into_iter().collect(),
            closed: Vec::new(),
        }
    }

    fn drain_ready(&mut self) -> Vec<ClosedWindow> {
        std::mem::take(&mut self.ready)
    }

    /// Counting windows never close on time.
    fn close_due(&mut self, _now: i64) -> Vec<ClosedWindow> {
        Vec::new()
    }

    fn close_all(&mut self) -> Vec<ClosedWindow> {
        let mut closed = std::mem::take(&mut self.ready);
        for key in std::mem::take(&mut self.order) {
            if let Some(instance) = self.open.remove(&key) {
                closed.push(instance.closed());
            }
        }
        closed
    }

    fn open_windows(&self) -> usize {
        self.open.len()
    }

    fn window_type(&self) -> &'static str {
        "COUNTING"
    }
}
