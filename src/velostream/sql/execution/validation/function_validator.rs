//! Function call validation.
//!
//! Every function call the query makes is checked against the registry before the
//! first record arrives, so an unknown name or a bad argument count fails `execute`
//! instead of failing every record.

use crate::velostream::sql::SqlError;
use crate::velostream::sql::ast::Expr;
use crate::velostream::sql::execution::expression::{
    Expression, FunctionRegistry, is_context_function,
};
use crate::velostream::sql::execution::types::{FieldValue, StreamRecord};
use crate::velostream::sql::parser::clauses::is_window_constructor;
use std::sync::Arc;

pub struct FunctionValidator;

impl FunctionValidator {
    /// Check every call in `expr`. `clause` names the clause in error messages.
    pub fn validate_expr(
        expr: &Expr,
        registry: &Arc<FunctionRegistry>,
        clause: &str,
    ) -> Result<(), SqlError> {
        let mut calls = Vec::new();
        expr.walk(&mut |node| {
            if let Expr::Function { name, args } = node {
                calls.push((name, args));
            }
        });

        for (name, args) in calls {
            Self::validate_call(name, args, registry, clause)?;
        }
        Ok(())
    }

    fn validate_call(
        name: &str,
        args: &[Expr],
        registry: &Arc<FunctionRegistry>,
        clause: &str,
    ) -> Result<(), SqlError> {
        if is_window_constructor(name) {
            return Err(SqlError::validation_error(format!(
                "{} is only allowed in GROUP BY, found in {}",
                name, clause
            )));
        }

        if is_context_function(name) {
            if !args.is_empty() {
                return Err(SqlError::validation_error(format!(
                    "{}() takes no arguments",
                    name.to_uppercase()
                )));
            }
            return Ok(());
        }

        if !registry.contains(name) {
            return Err(SqlError::validation_error(format!(
                "Unknown function '{}' in {}",
                name.to_uppercase(),
                clause
            )));
        }

        registry
            .check_arity(name, args.len())
            .map_err(|e| SqlError::validation_error(e.to_string()))?;

        if let Some(entry) = registry.lookup_aggregate(name) {
            let params = Self::aggregate_params(name, args, registry)?;
            entry.create(&params)?;
        }
        Ok(())
    }

    /// Constant parameters following an aggregate's input expression.
    pub fn aggregate_params(
        name: &str,
        args: &[Expr],
        registry: &Arc<FunctionRegistry>,
    ) -> Result<Vec<FieldValue>, SqlError> {
        args.iter()
            .skip(1)
            .map(|arg| Self::constant_value(name, arg, registry))
            .collect()
    }

    fn constant_value(
        name: &str,
        arg: &Expr,
        registry: &Arc<FunctionRegistry>,
    ) -> Result<FieldValue, SqlError> {
        let mut constant = true;
        arg.walk(&mut |node| {
            if matches!(node, Expr::Column(_) | Expr::Function { .. } | Expr::AggregateRef(_)) {
                constant = false;
            }
        });
        if !constant {
            return Err(SqlError::validation_error(format!(
                "Parameter {} of {} must be a constant",
                arg,
                name.to_uppercase()
            )));
        }
        Expression::from_expr(arg.clone(), Arc::clone(registry))
            .evaluate(&StreamRecord::default())
            .map_err(|e| {
                SqlError::validation_error(format!(
                    "Invalid parameter {} of {}: {}",
                    arg,
                    name.to_uppercase(),
                    e
                ))
            })
    }
}
