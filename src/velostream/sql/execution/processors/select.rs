//! SELECT Query Processor
//!
//! Handles WHERE filtering, column projection, and the DISTINCT and LIMIT row
//! post-processing shared by record-at-a-time and windowed queries.

use crate::velostream::sql::config::ProjectionErrorPolicy;
use crate::velostream::sql::execution::expression::RowScope;
use crate::velostream::sql::execution::planner::{OutputColumn, QueryPlan};
use crate::velostream::sql::execution::types::{FieldValue, ResultRow, StreamRecord};
use log::debug;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};

/// SELECT query processor
pub struct SelectProcessor;

impl SelectProcessor {
    /// Evaluate WHERE. A record passes when there is no WHERE clause or it is true;
    /// evaluation errors count as "not satisfied".
    pub fn matches_where(plan: &QueryPlan, record: &StreamRecord) -> bool {
        let Some(condition) = &plan.where_clause else {
            return true;
        };
        match condition.evaluate_predicate(record) {
            Ok(matched) => matched,
            Err(e) => {
                debug!("WHERE {} failed, treating as false: {}", condition, e);
                false
            }
        }
    }

    /// Project one record, or one aggregated group when `scope` carries aggregates.
    ///
    /// A column that fails to evaluate gets the policy's substitute value.
    pub fn project(
        plan: &QueryPlan,
        record: &StreamRecord,
        scope: &RowScope<'_>,
        policy: ProjectionErrorPolicy,
    ) -> ResultRow {
        let mut row = ResultRow::with_capacity(plan.outputs.len());
        for output in &plan.outputs {
            match output {
                OutputColumn::Wildcard => {
                    for (name, value) in &record.fields {
                        row.insert(name.clone(), value.clone());
                    }
                }
                OutputColumn::Expression { name, expr } => {
                    let value = expr.evaluate_in(record, scope).unwrap_or_else(|e| {
                        debug!("Column '{}' failed, substituting {:?}: {}", name, policy, e);
                        Self::substitute(policy)
                    });
                    row.insert(name.clone(), value);
                }
            }
        }
        row
    }

    pub fn substitute(policy: ProjectionErrorPolicy) -> FieldValue {
        match policy {
            ProjectionErrorPolicy::Null => FieldValue::Null,
            ProjectionErrorPolicy::Zero => FieldValue::Integer(0),
        }
    }

    /// Drop repeated rows, keeping the first occurrence.
    pub fn distinct(rows: Vec<ResultRow>) -> Vec<ResultRow> {
        let mut seen = DistinctRows::default();
        rows.into_iter().filter(|row| seen.insert(row)).collect()
    }

    /// Apply DISTINCT and LIMIT to one batch, in that order.
    pub fn finish_batch(plan: &QueryPlan, rows: Vec<ResultRow>) -> Vec<ResultRow> {
        let mut rows = if plan.query.distinct {
            Self::distinct(rows)
        } else {
            rows
        };
        if let Some(limit) = plan.query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        rows
    }
}

/// Rows seen so far, bucketed by hash; equal hashes fall back to full comparison.
#[derive(Debug, Default)]
pub struct DistinctRows {
    seen: FxHashMap<u64, Vec<ResultRow>>,
}

impl DistinctRows {
    /// Record `row`; false when an equal row was seen before.
    pub fn insert(&mut self, row: &ResultRow) -> bool {
        let bucket = self.seen.entry(row_hash(row)).or_default();
        if bucket.iter().any(|seen| rows_equal(seen, row)) {
            return false;
        }
        bucket.push(row.clone());
        true
    }
}

fn rows_equal(a: &ResultRow, b: &ResultRow) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, value)| b.get(name).is_some_and(|other| value.key_eq(other)))
}

fn row_hash(row: &ResultRow) -> u64 {
    let mut entries: Vec<(&String, &FieldValue)> = row.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let mut hasher = FxHasher::default();
    for (name, value) in entries {
        name.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    hasher.finish()
}
