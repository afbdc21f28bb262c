//! Processors for SQL query execution
//!
//! - [`SelectProcessor`]: WHERE filtering, projection, DISTINCT and LIMIT
//! - [`Aggregator`]: per-group accumulator folding and HAVING
//! - [`WindowProcessor`]: window assignment, firing and the group-state arena
//!
//! [`QueryProcessor`] routes one record through the processors its plan needs.

pub mod aggregate;
pub mod select;
pub mod window;

pub use aggregate::Aggregator;
pub use select::{DistinctRows, SelectProcessor};
pub use window::WindowProcessor;

use crate::velostream::sql::SqlError;
use crate::velostream::sql::config::{EngineConfig, ProjectionErrorPolicy};
use crate::velostream::sql::execution::expression::RowScope;
use crate::velostream::sql::execution::planner::QueryPlan;
use crate::velostream::sql::execution::types::{ResultBatch, StreamRecord};
use crate::velostream::sql::execution::window_v2::{Clock, WindowStats};
use log::warn;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// WHERE was false or failed
    Filtered,
    /// Projected and emitted as its own batch
    Projected,
    /// Folded into one or more windows
    Windowed,
    /// Non-windowed DISTINCT query already emitted an equal row
    Duplicate,
    /// Non-windowed query already emitted LIMIT rows
    LimitReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorResult {
    pub outcome: RecordOutcome,
    /// Batches ready for the sinks, in order
    pub batches: Vec<ResultBatch>,
}

impl ProcessorResult {
    fn new(outcome: RecordOutcome, batches: Vec<ResultBatch>) -> Self {
        Self { outcome, batches }
    }
}

/// Main processor coordination interface
pub struct QueryProcessor {
    plan: Arc<QueryPlan>,
    policy: ProjectionErrorPolicy,
    window: Option<WindowProcessor>,
    /// Rows emitted by a non-windowed query, for LIMIT
    emitted: AtomicU64,
    /// Rows emitted so far by a non-windowed DISTINCT query
    distinct: Mutex<DistinctRows>,
}

impl QueryProcessor {
    pub fn new(
        plan: Arc<QueryPlan>,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SqlError> {
        let window = if plan.is_aggregated() {
            Some(WindowProcessor::new(Arc::clone(&plan), config, clock)?)
        } else {
            None
        };
        Ok(Self {
            plan,
            policy: config.projection_error_policy,
            window,
            emitted: AtomicU64::new(0),
            distinct: Mutex::new(DistinctRows::default()),
        })
    }

    pub fn plan(&self) -> &Arc<QueryPlan> {
        &self.plan
    }

    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// Process a query against a record.
    ///
    /// Windowed queries only fail on internal errors; per-record evaluation failures
    /// follow the WHERE, GROUP BY and projection policies instead.
    pub fn process(&self, record: &StreamRecord) -> Result<ProcessorResult, SqlError> {
        if !SelectProcessor::matches_where(&self.plan, record) {
            return Ok(ProcessorResult::new(RecordOutcome::Filtered, Vec::new()));
        }

        if let Some(window) = &self.window {
            let batches = window.process_record(record)?;
            return Ok(ProcessorResult::new(RecordOutcome::Windowed, batches));
        }

        if let Some(limit) = self.plan.query.limit {
            if self.emitted.load(Ordering::SeqCst) >= limit {
                return Ok(ProcessorResult::new(RecordOutcome::LimitReached, Vec::new()));
            }
        }

        let row = SelectProcessor::project(&self.plan, record, &RowScope::default(), self.policy);
        if self.plan.query.distinct && !self.lock_distinct().insert(&row) {
            return Ok(ProcessorResult::new(RecordOutcome::Duplicate, Vec::new()));
        }

        if let Some(limit) = self.plan.query.limit {
            let claimed = self
                .emitted
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < limit).then_some(n + 1)
                });
            if claimed.is_err() {
                return Ok(ProcessorResult::new(RecordOutcome::LimitReached, Vec::new()));
            }
        }

        Ok(ProcessorResult::new(
            RecordOutcome::Projected,
            vec![ResultBatch::new(vec![row], None)],
        ))
    }

    /// Timer hook: close time-based windows that are due.
    pub fn poll(&self) -> Vec<ResultBatch> {
        self.window.as_ref().map(WindowProcessor::poll).unwrap_or_default()
    }

    pub fn trigger(&self) -> Vec<ResultBatch> {
        self.window
            .as_ref()
            .map(WindowProcessor::trigger)
            .unwrap_or_default()
    }

    pub fn discard(&self) -> usize {
        self.window.as_ref().map_or(0, WindowProcessor::discard)
    }

    pub fn window_stats(&self) -> Option<WindowStats> {
        self.window.as_ref().map(WindowProcessor::stats)
    }

    fn lock_distinct(&self) -> std::sync::MutexGuard<'_, DistinctRows> {
        self.distinct.lock().unwrap_or_else(|poisoned| {
            warn!("DISTINCT state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
