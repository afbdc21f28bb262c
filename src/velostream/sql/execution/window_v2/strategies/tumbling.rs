//! Tumbling Window Strategy Implementation
//!
//! Non-overlapping fixed-size windows aligned to the Unix epoch: a record at time
//! `t` belongs to `[k * size, (k + 1) * size)` with `k = floor(t / size)`.
//!
//! Example: 5-minute tumbling windows
//! ```text
//! [00:00-05:00) [05:00-10:00) [10:00-15:00)
//! ```

use crate::velostream::sql::execution::internal::GroupKey;
use crate::velostream::sql::execution::window_v2::traits::WindowStrategy;
use crate::velostream::sql::execution::window_v2::types::{
    Assignment, ClosedWindow, WindowAssignment, WindowBounds, WindowId, WindowIdAllocator,
};
use std::collections::BTreeMap;

/// Tumbling window strategy with fixed-size non-overlapping windows.
///
/// One instance per window start, shared by all groups.
#[derive(Debug)]
pub struct TumblingWindowStrategy {
    /// Window size in milliseconds
    window_size_ms: i64,
    /// Open instances by start time
    open: BTreeMap<i64, WindowId>,
    ids: WindowIdAllocator,
}

impl TumblingWindowStrategy {
    pub fn new(window_size_ms: i64) -> Self {
        Self {
            window_size_ms: window_size_ms.max(1),
            open: BTreeMap::new(),
            ids: WindowIdAllocator::default(),
        }
    }

    /// Bounds of the window containing `timestamp`.
    pub fn bounds_for(&self, timestamp: i64) -> WindowBounds {
        let start = timestamp
            .div_euclid(self.window_size_ms)
            .saturating_mul(self.window_size_ms);
        WindowBounds::new(start, start.saturating_add(self.window_size_ms))
    }

    fn close(&self, start: i64, id: WindowId) -> ClosedWindow {
        ClosedWindow {
            id,
            bounds: WindowBounds::new(start, start.saturating_add(self.window_size_ms)),
        }
    }
}

impl WindowStrategy for TumblingWindowStrategy {
    fn assign(&mut self, timestamp: i64, _group: &GroupKey) -> Assignment {
        let bounds = self.bounds_for(timestamp);
        let ids = &mut self.ids;
        let id = *self
            .open
            .entry(bounds.start)
            .or_insert_with(|| ids.allocate());
        Assignment {
            windows: vec![WindowAssignment { id, bounds }],
            closed: Vec::new(),
        }
    }

    fn close_due(&mut self, now: i64) -> Vec<ClosedWindow> {
        // Windows with start + size <= now
        let cutoff = now.saturating_sub(self.window_size_ms).saturating_add(1);
        let still_open = self.open.split_off(&cutoff);
        let due = std::mem::replace(&mut self.open, still_open);
        due.into_iter()
            .map(|(start, id)| self.close(start, id))
            .collect()
    }

    fn close_all(&mut self) -> Vec<ClosedWindow> {
        let all = std::mem::take(&mut self.open);
        all.into_iter()
            .map(|(start, id)| self.close(start, id))
            .collect()
    }

    fn open_windows(&self) -> usize {
        self.open.len()
    }

    fn window_type(&self) -> &'static str {
        "TUMBLING"
    }
}
