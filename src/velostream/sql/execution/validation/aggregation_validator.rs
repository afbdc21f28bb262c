//! Aggregation Function Validation
//!
//! Validates that aggregate functions are used where a windowed query can compute them:
//! - aggregates only in SELECT and HAVING, never in WHERE or GROUP BY
//! - no aggregate nested inside another aggregate's arguments
//! - aggregates, GROUP BY and HAVING only together with a window
//! - `SELECT *` only in non-aggregated queries

use crate::velostream::sql::SqlError;
use crate::velostream::sql::ast::{Expr, SelectField, StreamingQuery};
use crate::velostream::sql::execution::expression::FunctionRegistry;

pub struct AggregationValidator;

impl AggregationValidator {
    pub fn validate(query: &StreamingQuery, registry: &FunctionRegistry) -> Result<(), SqlError> {
        let is_aggregate = |name: &str| registry.is_aggregate(name);

        if let Some(where_clause) = &query.where_clause {
            if let Some(name) = Self::first_aggregate(where_clause, &is_aggregate) {
                return Err(SqlError::validation_error(format!(
                    "Aggregate function {} is not allowed in WHERE; use HAVING",
                    name
                )));
            }
        }

        for expr in &query.group_by {
            if let Some(name) = Self::first_aggregate(expr, &is_aggregate) {
                return Err(SqlError::validation_error(format!(
                    "Aggregate function {} is not allowed in GROUP BY",
                    name
                )));
            }
        }

        for field in &query.fields {
            if let SelectField::Expression { expr, .. } = field {
                Self::check_nesting(expr, &is_aggregate)?;
            }
        }
        if let Some(having) = &query.having {
            Self::check_nesting(having, &is_aggregate)?;
        }

        let has_aggregates = query.has_aggregates(&is_aggregate);
        if query.window.is_none() {
            if has_aggregates {
                return Err(SqlError::validation_error(
                    "Aggregate functions require a window in GROUP BY, e.g. TumblingWindow('1m')",
                ));
            }
            if !query.group_by.is_empty() {
                return Err(SqlError::validation_error(
                    "GROUP BY requires a window, e.g. GROUP BY key, CountingWindow(100)",
                ));
            }
            if query.having.is_some() {
                return Err(SqlError::validation_error(
                    "HAVING requires an aggregated (windowed) query",
                ));
            }
        } else if query
            .fields
            .iter()
            .any(|field| matches!(field, SelectField::Wildcard))
        {
            return Err(SqlError::validation_error(
                "SELECT * cannot be used in a windowed query; list the output columns",
            ));
        }

        Ok(())
    }

    /// Name of the first aggregate call in `expr`, parents first.
    pub fn first_aggregate(expr: &Expr, is_aggregate: &dyn Fn(&str) -> bool) -> Option<String> {
        let mut found = None;
        expr.walk(&mut |node| {
            if found.is_none() {
                if let Expr::Function { name, .. } = node {
                    if is_aggregate(name) {
                        found = Some(name.to_uppercase());
                    }
                }
            }
        });
        found
    }

    fn check_nesting(expr: &Expr, is_aggregate: &dyn Fn(&str) -> bool) -> Result<(), SqlError> {
        let mut nested = None;
        expr.walk(&mut |node| {
            if nested.is_some() {
                return;
            }
            if let Expr::Function { name, args } = node {
                if is_aggregate(name) {
                    if let Some(inner) = args
                        .iter()
                        .find_map(|arg| Self::first_aggregate(arg, is_aggregate))
                    {
                        nested = Some((name.to_uppercase(), inner));
                    }
                }
            }
        });
        match nested {
            Some((outer, inner)) => Err(SqlError::validation_error(format!(
                "Aggregate function {} cannot be nested inside {}",
                inner, outer
            ))),
            None => Ok(()),
        }
    }
}
