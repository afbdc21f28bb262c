//! Query validation.
//!
//! Runs every setup-time check on a parsed query. A query either passes all of them
//! or `execute` fails with the first error and no pipeline state is created.

use super::aggregation_validator::AggregationValidator;
use super::function_validator::FunctionValidator;
use super::window_validator::WindowValidator;
use crate::velostream::sql::SqlError;
use crate::velostream::sql::ast::{SelectField, StreamingQuery};
use crate::velostream::sql::execution::expression::FunctionRegistry;
use log::debug;
use std::sync::Arc;

pub struct QueryValidator;

impl QueryValidator {
    pub fn validate(
        query: &StreamingQuery,
        registry: &Arc<FunctionRegistry>,
    ) -> Result<(), SqlError> {
        if query.from.trim().is_empty() {
            return Err(SqlError::validation_error("Query has no source (FROM)"));
        }
        if query.fields.is_empty() {
            return Err(SqlError::validation_error("Query selects no columns"));
        }

        for field in &query.fields {
            if let SelectField::Expression { expr, .. } = field {
                FunctionValidator::validate_expr(expr, registry, "SELECT")?;
            }
        }
        if let Some(where_clause) = &query.where_clause {
            FunctionValidator::validate_expr(where_clause, registry, "WHERE")?;
        }
        for expr in &query.group_by {
            FunctionValidator::validate_expr(expr, registry, "GROUP BY")?;
        }
        if let Some(having) = &query.having {
            FunctionValidator::validate_expr(having, registry, "HAVING")?;
        }

        AggregationValidator::validate(query, registry)?;
        WindowValidator::validate_query(query)?;

        debug!("Query over '{}' passed validation", query.from);
        Ok(())
    }
}
