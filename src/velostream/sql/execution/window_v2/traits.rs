//! Core Traits for Window Processing V2
//!
//! A [`WindowStrategy`] decides which window instances a record belongs to and when
//! an instance closes. It never sees aggregate state: the window processor keeps the
//! per-(window, group) accumulators and folds records into the instances the
//! strategy names.

use super::types::{Assignment, ClosedWindow};
use crate::velostream::sql::execution::internal::GroupKey;

/// Strategy trait for window boundary detection.
///
/// Implementations:
/// - TumblingWindowStrategy: non-overlapping, epoch-aligned windows
/// - SlidingWindowStrategy: overlapping windows starting at multiples of the slide
/// - CountingWindowStrategy: per-group windows closing at N records
/// - SessionWindowStrategy: per-group windows closing after an idle gap
pub trait WindowStrategy: Send + Sync {
    /// Assign a record with the given time to its window instances, opening
    /// instances as needed.
    fn assign(&mut self, timestamp: i64, group: &GroupKey) -> Assignment;

    /// Instances that became full as a result of the last assignment.
    fn drain_ready(&mut self) -> Vec<ClosedWindow> {
        Vec::new()
    }

    /// Close every instance that ends at or before `now`.
    fn close_due(&mut self, now: i64) -> Vec<ClosedWindow>;

    /// Close every open instance.
    fn close_all(&mut self) -> Vec<ClosedWindow>;

    /// Number of open instances.
    fn open_windows(&self) -> usize;

    /// Window type name for diagnostics.
    fn window_type(&self) -> &'static str;
}

/// Window processing statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Open window instances
    pub open_windows: usize,
    /// Window instances fired so far
    pub fired_windows: u64,
    /// Records assigned to a window the watermark had already passed
    pub late_records: u64,
    /// Records whose event time could not be read
    pub timestamp_fallbacks: u64,
    /// Current watermark (event-time mode only)
    pub watermark: Option<i64>,
}
