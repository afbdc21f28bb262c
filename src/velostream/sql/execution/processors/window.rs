//! Window Query Processor
//!
//! Routes records of a windowed query through its [`WindowStrategy`] and keeps the
//! per-(window, group) accumulator arena. All state sits behind one lock, so a record
//! and a window firing never interleave: a record is folded either before its
//! window fires or into the next instance.
//!
//! Time comes from the query's `WITH (TIMESTAMP=...)` field (event time) or from the
//! injected [`Clock`] (processing time). In event-time mode the watermark is the
//! largest event time seen minus `max_out_of_orderness_ms`; windows whose end the
//! watermark has passed fire inline. A record for a window the watermark already
//! passed reopens that window, is counted as late, and fires at once.

use super::aggregate::Aggregator;
use super::select::SelectProcessor;
use crate::velostream::sql::SqlError;
use crate::velostream::sql::config::EngineConfig;
use crate::velostream::sql::execution::internal::WindowInstance;
use crate::velostream::sql::execution::planner::QueryPlan;
use crate::velostream::sql::execution::types::{ResultBatch, StreamRecord};
use crate::velostream::sql::execution::window_v2::{
    ClosedWindow, Clock, WindowId, WindowStats, WindowStrategy, create_strategy,
};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct WindowState {
    strategy: Box<dyn WindowStrategy>,
    instances: FxHashMap<WindowId, WindowInstance>,
    max_event_time: Option<i64>,
    last_processing_time: i64,
    stats: WindowStats,
}

/// Windowed aggregation for one query.
pub struct WindowProcessor {
    aggregator: Aggregator,
    clock: Arc<dyn Clock>,
    max_out_of_orderness_ms: i64,
    time_based: bool,
    state: Mutex<WindowState>,
}

impl WindowProcessor {
    pub fn new(
        plan: Arc<QueryPlan>,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SqlError> {
        let spec = plan.window.clone().ok_or_else(|| {
            SqlError::window_error("Query has no window in GROUP BY", "NONE")
        })?;
        debug!(
            "Window processor for {} window over '{}' ({} time)",
            spec.window_type(),
            plan.query.from,
            if plan.timestamp.is_some() { "event" } else { "processing" }
        );

        let state = WindowState {
            strategy: create_strategy(&spec),
            instances: FxHashMap::default(),
            max_event_time: None,
            last_processing_time: i64::MIN,
            stats: WindowStats::default(),
        };
        Ok(Self {
            aggregator: Aggregator::new(plan, config.projection_error_policy),
            clock,
            max_out_of_orderness_ms: config.max_out_of_orderness_ms,
            time_based: spec.is_time_based(),
            state: Mutex::new(state),
        })
    }

    pub fn is_event_time(&self) -> bool {
        self.aggregator.plan().timestamp.is_some()
    }

    /// Assign a WHERE-filtered record to its windows. Returns the batches of every
    /// window that closed as a result, in firing order.
    pub fn process_record(&self, record: &StreamRecord) -> Result<Vec<ResultBatch>, SqlError> {
        let plan = self.aggregator.plan();
        let key = plan.group_key(record);
        let contributions = plan.contributions(record);
        let event_time = plan
            .timestamp
            .as_ref()
            .map(|extractor| extractor.extract(record));

        let mut state = self.lock();
        let timestamp = match event_time {
            Some(Ok(ts)) => {
                state.max_event_time = Some(state.max_event_time.map_or(ts, |max| max.max(ts)));
                ts
            }
            Some(Err(e)) => {
                state.stats.timestamp_fallbacks += 1;
                if state.stats.timestamp_fallbacks == 1 {
                    warn!("Event time unavailable, falling back to processing time: {}", e);
                } else {
                    debug!("Event time unavailable, falling back to processing time: {}", e);
                }
                self.processing_time(&mut state)
            }
            None => self.processing_time(&mut state),
        };

        let assignment = state.strategy.assign(timestamp, &key);
        let mut batches = self.fire(&mut state, assignment.closed);

        let watermark = self.watermark(&state);
        if self.time_based
            && watermark.is_some_and(|wm| assignment.windows.iter().any(|w| w.bounds.end <= wm))
        {
            state.stats.late_records += 1;
            debug!("Late record at {} (watermark {:?})", timestamp, watermark);
        }

        for window in &assignment.windows {
            let instance = state
                .instances
                .entry(window.id)
                .or_insert_with(|| WindowInstance::new(window.bounds));
            instance.bounds = window.bounds;
            match instance.group_mut(&key) {
                Some(group) => self.aggregator.add_record(group, &contributions, timestamp),
                None => {
                    let mut group = self.aggregator.new_group(record, timestamp)?;
                    self.aggregator.add_record(&mut group, &contributions, timestamp);
                    instance.insert_group(key.clone(), group);
                }
            }
        }

        let ready = state.strategy.drain_ready();
        batches.extend(self.fire(&mut state, ready));

        let horizon = if self.is_event_time() {
            watermark
        } else {
            Some(timestamp)
        };
        if let Some(now) = horizon {
            let due = state.strategy.close_due(now);
            batches.extend(self.fire(&mut state, due));
        }
        Ok(batches)
    }

    /// Close time-based windows that have ended by the clock (processing time) or the
    /// watermark (event time).
    pub fn poll(&self) -> Vec<ResultBatch> {
        let mut state = self.lock();
        let now = if self.is_event_time() {
            match self.watermark(&state) {
                Some(wm) => wm,
                None => return Vec::new(),
            }
        } else {
            self.processing_time(&mut state)
        };
        let due = state.strategy.close_due(now);
        self.fire(&mut state, due)
    }

    /// Fire every open, non-empty window.
    pub fn trigger(&self) -> Vec<ResultBatch> {
        let mut state = self.lock();
        let all = state.strategy.close_all();
        self.fire(&mut state, all)
    }

    /// Drop every open window without firing. Returns how many were dropped.
    pub fn discard(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.strategy.close_all().len();
        state.instances.clear();
        dropped
    }

    pub fn stats(&self) -> WindowStats {
        let state = self.lock();
        WindowStats {
            open_windows: state.strategy.open_windows(),
            watermark: self.watermark(&state),
            ..state.stats.clone()
        }
    }

    fn fire(&self, state: &mut WindowState, closed: Vec<ClosedWindow>) -> Vec<ResultBatch> {
        let plan = self.aggregator.plan();
        let mut batches = Vec::with_capacity(closed.len());
        for window in closed {
            let Some(instance) = state.instances.remove(&window.id) else {
                continue;
            };
            if instance.is_empty() {
                continue;
            }
            let bounds = window.bounds.as_tuple();
            let rows = instance
                .into_groups()
                .into_iter()
                .filter_map(|(_, group)| self.aggregator.finalize(&group, Some(bounds)))
                .collect();
            let rows = SelectProcessor::finish_batch(plan, rows);
            state.stats.fired_windows += 1;
            debug!(
                "Fired {} window [{}, {}) with {} row(s)",
                state.strategy.window_type(),
                bounds.0,
                bounds.1,
                rows.len()
            );
            batches.push(ResultBatch::new(rows, Some(bounds)));
        }
        batches
    }

    fn watermark(&self, state: &WindowState) -> Option<i64> {
        state
            .max_event_time
            .map(|max| max.saturating_sub(self.max_out_of_orderness_ms))
    }

    /// Clock time, never moving backwards.
    fn processing_time(&self, state: &mut WindowState) -> i64 {
        let now = self.clock.now_millis().max(state.last_processing_time);
        state.last_processing_time = now;
        now
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Window state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
