//! Group aggregation.
//!
//! [`Aggregator::add_record`] folds one record's per-slot contributions into a group's
//! accumulators; [`Aggregator::finalize`] reads the accumulators, projects the output
//! row and applies HAVING to it.
//!
//! NULL handling follows SQL: a `Null` contribution is skipped, so `SUM`, `AVG`,
//! `MIN` and `MAX` over only nulls report `Null` and `COUNT(expr)` reports `0`.
//! `COUNT(*)` contributes a non-null marker for every record.

use super::select::SelectProcessor;
use crate::velostream::sql::SqlError;
use crate::velostream::sql::config::ProjectionErrorPolicy;
use crate::velostream::sql::execution::expression::RowScope;
use crate::velostream::sql::execution::internal::GroupState;
use crate::velostream::sql::execution::planner::QueryPlan;
use crate::velostream::sql::execution::types::{FieldValue, ResultRow, StreamRecord};
use log::debug;
use std::sync::Arc;

pub struct Aggregator {
    plan: Arc<QueryPlan>,
    policy: ProjectionErrorPolicy,
}

impl Aggregator {
    pub fn new(plan: Arc<QueryPlan>, policy: ProjectionErrorPolicy) -> Self {
        Self { plan, policy }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Empty state for a group whose first record is `record`.
    pub fn new_group(&self, record: &StreamRecord, timestamp: i64) -> Result<GroupState, SqlError> {
        Ok(GroupState::new(
            self.plan.new_accumulators()?,
            record.clone(),
            timestamp,
        ))
    }

    /// Fold one record's contributions (see [`QueryPlan::contributions`]) into `state`.
    pub fn add_record(&self, state: &mut GroupState, contributions: &[FieldValue], timestamp: i64) {
        state.touch(timestamp);
        for (slot, (acc, value)) in state
            .accumulators
            .iter_mut()
            .zip(contributions)
            .enumerate()
        {
            if value.is_null() {
                continue;
            }
            if let Err(e) = acc.add(value) {
                debug!(
                    "Skipping value {} for {}: {}",
                    value,
                    self.plan
                        .slots
                        .get(slot)
                        .map(|s| s.signature.as_str())
                        .unwrap_or("aggregate"),
                    e
                );
            }
        }
    }

    /// Output row for a group, or `None` when HAVING rejects it.
    ///
    /// HAVING sees the finalized row: output aliases resolve first, then the group's
    /// first record. A HAVING evaluation error rejects the row.
    pub fn finalize(&self, state: &GroupState, window: Option<(i64, i64)>) -> Option<ResultRow> {
        let aggregates = state.results();
        let scope = RowScope {
            aggregates: &aggregates,
            window,
            aliases: None,
        };
        let row = SelectProcessor::project(&self.plan, &state.sample, &scope, self.policy);

        if let Some(having) = &self.plan.having {
            let having_scope = RowScope {
                aliases: Some(&row),
                ..scope
            };
            match having.evaluate_predicate_in(&state.sample, &having_scope) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    debug!("HAVING {} failed, dropping group: {}", having, e);
                    return None;
                }
            }
        }
        Some(row)
    }
}
