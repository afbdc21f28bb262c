//! Sliding Window Strategy Implementation
//!
//! Overlapping windows of `size` starting at every multiple of `slide`. A record at
//! time `t` belongs to every instance with `start <= t < start + size`, so with
//! `size = 30s, slide = 10s` each record lands in three instances.
//!
//! ```text
//! [00:00-00:30)
//!       [00:10-00:40)
//!             [00:20-00:50)
//! ```
//!
//! Every instance keeps its own accumulators and fires independently when its end
//! passes; records are folded in once per instance instead of being buffered and
//! re-aggregated on each slide.

use crate::velostream::sql::execution::internal::GroupKey;
use crate::velostream::sql::execution::window_v2::traits::WindowStrategy;
use crate::velostream::sql::execution::window_v2::types::{
    Assignment, ClosedWindow, WindowAssignment, WindowBounds, WindowId, WindowIdAllocator,
};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct SlidingWindowStrategy {
    window_size_ms: i64,
    slide_ms: i64,
    /// Open instances by start time
    open: BTreeMap<i64, WindowId>,
    ids: WindowIdAllocator,
}

impl SlidingWindowStrategy {
    pub fn new(window_size_ms: i64, slide_ms: i64) -> Self {
        Self {
            window_size_ms: window_size_ms.max(1),
            slide_ms: slide_ms.max(1),
            open: BTreeMap::new(),
            ids: WindowIdAllocator::default(),
        }
    }

    /// Start times of every instance containing `timestamp`, oldest first.
    pub fn starts_for(&self, timestamp: i64) -> Vec<i64> {
        let last = timestamp.div_euclid(self.slide_ms);
        let first = timestamp
            .saturating_sub(self.window_size_ms)
            .div_euclid(self.slide_ms)
            + 1;
        (first..=last)
            .map(|k| k.saturating_mul(self.slide_ms))
            .filter(|start| timestamp < start.saturating_add(self.window_size_ms))
            .collect()
    }

    fn bounds(&self, start: i64) -> WindowBounds {
        WindowBounds::new(start, start.saturating_add(self.window_size_ms))
    }
}

impl WindowStrategy for SlidingWindowStrategy {
    fn assign(&mut self, timestamp: i64, _group: &GroupKey) -> Assignment {
        let mut windows = Vec::new();
        for start in self.starts_for(timestamp) {
            let bounds = self.bounds(start);
            let ids = &mut self.ids;
            let id = *self.open.entry(start).or_insert_with(|| ids.allocate());
            windows.push(WindowAssignment { id, bounds });
        }
        Assignment {
            windows,
            closed: Vec::new(),
        }
    }

    fn close_due(&mut self, now: i64) -> Vec<ClosedWindow> {
        let cutoff = now.saturating_sub(self.window_size_ms).saturating_add(1);
        let still_open = self.open.split_off(&cutoff);
        let due = std::mem::replace(&mut self.open, still_open);
        due.into_iter()
            .map(|(start, id)| ClosedWindow {
                id,
                bounds: self.bounds(start),
            })
            .collect()
    }

    fn close_all(&mut self) -> Vec<ClosedWindow> {
        let all = std::mem::take(&mut self.open);
        all.into_iter()
            .map(|(start, id)| ClosedWindow {
                id,
                bounds: self.bounds(start),
            })
            .collect()
    }

    fn open_windows(&self) -> usize {
        self.open.len()
    }

    fn window_type(&self) -> &'static str {
        "SLIDING"
    }
}
