//! Expression evaluator for SQL expressions.
//!
//! Evaluates an [`Expr`] tree against one record. The evaluator is pure: it reads the
//! record and the [`EvaluationContext`], never mutates either, and reports failures
//! as [`SqlError`] values. NULL rules:
//!
//! - arithmetic and comparison with a NULL operand yield NULL
//! - `IS [NOT] NULL` always yields a boolean
//! - `AND`/`OR` use three-valued logic and short-circuit left to right
//! - `NOT NULL` is NULL; `NOT` of a non-boolean is a type error

use super::function_registry::FunctionRegistry;
use crate::velostream::sql::ast::{BinaryOperator, Expr, LiteralValue, UnaryOperator};
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::types::{FieldValue, ResultRow, StreamRecord};
use log::warn;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

/// Functions answered from the evaluation context rather than the registry.
pub const CONTEXT_FUNCTIONS: [&str; 2] = ["WINDOW_START", "WINDOW_END"];

pub fn is_context_function(name: &str) -> bool {
    CONTEXT_FUNCTIONS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

/// Compiled LIKE patterns
static LIKE_CACHE: LazyLock<Mutex<HashMap<String, Arc<Regex>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Maximum number of compiled patterns to keep
const MAX_LIKE_CACHE_SIZE: usize = 1000;

fn like_regex(pattern: &str) -> Result<Arc<Regex>, SqlError> {
    let mut cache = LIKE_CACHE.lock().unwrap_or_else(|poisoned| {
        warn!("LIKE pattern cache lock poisoned, recovering");
        poisoned.into_inner()
    });
    if let Some(regex) = cache.get(pattern) {
        return Ok(Arc::clone(regex));
    }

    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    translated.push('$');

    let regex = Regex::new(&translated).map(Arc::new).map_err(|e| {
        SqlError::execution_error(format!("Invalid LIKE pattern '{}': {}", pattern, e), None)
    })?;
    if cache.len() >= MAX_LIKE_CACHE_SIZE {
        cache.clear();
    }
    cache.insert(pattern.to_string(), Arc::clone(&regex));
    Ok(regex)
}

/// Everything an expression can see besides its own tree.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub record: &'a StreamRecord,
    pub functions: &'a FunctionRegistry,
    /// Finalized aggregate values, indexed by `Expr::AggregateRef` slot
    pub aggregates: &'a [FieldValue],
    /// Bounds of the firing window, epoch milliseconds
    pub window: Option<(i64, i64)>,
    /// Output columns already computed for this row; consulted before the record
    pub aliases: Option<&'a ResultRow>,
}

impl<'a> EvaluationContext<'a> {
    /// Context for evaluating against a bare record.
    pub fn for_record(record: &'a StreamRecord, functions: &'a FunctionRegistry) -> Self {
        Self {
            record,
            functions,
            aggregates: &[],
            window: None,
            aliases: None,
        }
    }

    fn resolve_column(&self, name: &str) -> FieldValue {
        if let Some(value) = self.aliases.and_then(|row| row.get(name)) {
            return value.clone();
        }
        self.record.get_path(name)
    }
}

/// Main expression evaluator that handles all SQL expression types
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate an expression to a value.
    pub fn evaluate_expression_value(
        expr: &Expr,
        ctx: &EvaluationContext<'_>,
    ) -> Result<FieldValue, SqlError> {
        match expr {
            Expr::Column(name) => Ok(ctx.resolve_column(name)),
            Expr::Literal(literal) => Ok(Self::literal_value(literal)),
            Expr::BinaryOp { left, op, right } => Self::evaluate_binary(left, *op, right, ctx),
            Expr::UnaryOp { op, expr } => {
                let value = Self::evaluate_expression_value(expr, ctx)?;
                match op {
                    UnaryOperator::IsNull => Ok(FieldValue::Boolean(value.is_null())),
                    UnaryOperator::IsNotNull => Ok(FieldValue::Boolean(!value.is_null())),
                    UnaryOperator::Not => match Self::logical_operand(&value, "NOT")? {
                        Some(b) => Ok(FieldValue::Boolean(!b)),
                        None => Ok(FieldValue::Null),
                    },
                    UnaryOperator::Minus => value.negate(),
                    UnaryOperator::Plus if value.is_null() => Ok(FieldValue::Null),
                    UnaryOperator::Plus => value.to_number(),
                }
            }
            Expr::Function { name, args } => Self::evaluate_function(name, args, ctx),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => Self::evaluate_case(operand.as_deref(), when_clauses, else_clause.as_deref(), ctx),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = Self::evaluate_expression_value(expr, ctx)?;
                let low = Self::evaluate_expression_value(low, ctx)?;
                let high = Self::evaluate_expression_value(high, ctx)?;
                if value.is_null() || low.is_null() || high.is_null() {
                    return Ok(FieldValue::Null);
                }
                let inside = value.compare(&low)? != Ordering::Less
                    && value.compare(&high)? != Ordering::Greater;
                Ok(FieldValue::Boolean(inside != *negated))
            }
            Expr::List(_) => Err(SqlError::execution_error(
                "A value list is only valid on the right of IN",
                None,
            )),
            Expr::AggregateRef(slot) => ctx.aggregates.get(*slot).cloned().ok_or_else(|| {
                SqlError::execution_error(
                    format!("Aggregate result {} is not available here", slot),
                    None,
                )
            }),
        }
    }

    /// Evaluate an expression as a condition (WHERE, HAVING, WHEN).
    pub fn evaluate_expression(
        expr: &Expr,
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, SqlError> {
        Ok(Self::is_truthy(&Self::evaluate_expression_value(expr, ctx)?))
    }

    /// Condition truthiness: booleans as-is, numbers when non-zero, strings when
    /// non-empty and not "false". NULL and containers are not true.
    pub fn is_truthy(value: &FieldValue) -> bool {
        match value {
            FieldValue::Boolean(b) => *b,
            FieldValue::Integer(i) => *i != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            FieldValue::Null | FieldValue::Array(_) | FieldValue::Map(_) => false,
        }
    }

    pub fn literal_value(literal: &LiteralValue) -> FieldValue {
        match literal {
            LiteralValue::String(s) => FieldValue::String(s.clone()),
            LiteralValue::Integer(i) => FieldValue::Integer(*i),
            LiteralValue::Float(f) => FieldValue::Float(*f),
            LiteralValue::Boolean(b) => FieldValue::Boolean(*b),
            LiteralValue::Null => FieldValue::Null,
        }
    }

    /// Operand of AND/OR/NOT: a boolean, or NULL for unknown.
    fn logical_operand(value: &FieldValue, op: &str) -> Result<Option<bool>, SqlError> {
        match value {
            FieldValue::Boolean(b) => Ok(Some(*b)),
            FieldValue::Null => Ok(None),
            other => Err(SqlError::type_error(
                format!("boolean operand for {}", op),
                other.type_name(),
                Some(other.to_string()),
            )),
        }
    }

    fn evaluate_binary(
        left: &Expr,
        op: BinaryOperator,
        right: &Expr,
        ctx: &EvaluationContext<'_>,
    ) -> Result<FieldValue, SqlError> {
        match op {
            BinaryOperator::And | BinaryOperator::Or => {
                return Self::evaluate_logical(left, op, right, ctx);
            }
            BinaryOperator::In | BinaryOperator::NotIn => {
                return Self::evaluate_in(left, op == BinaryOperator::NotIn, right, ctx);
            }
            _ => {}
        }

        let left_val = Self::evaluate_expression_value(left, ctx)?;
        let right_val = Self::evaluate_expression_value(right, ctx)?;

        match op {
            BinaryOperator::Add => left_val.add(&right_val),
            BinaryOperator::Subtract => left_val.subtract(&right_val),
            BinaryOperator::Multiply => left_val.multiply(&right_val),
            BinaryOperator::Divide => left_val.divide(&right_val),
            BinaryOperator::Modulo => left_val.modulo(&right_val),
            _ if left_val.is_null() || right_val.is_null() => Ok(FieldValue::Null),
            BinaryOperator::Concat => Ok(FieldValue::String(format!(
                "{}{}",
                left_val.to_display_string(),
                right_val.to_display_string()
            ))),
            BinaryOperator::Equal => Ok(FieldValue::Boolean(left_val.sql_equals(&right_val))),
            BinaryOperator::NotEqual => Ok(FieldValue::Boolean(!left_val.sql_equals(&right_val))),
            BinaryOperator::LessThan => Ok(FieldValue::Boolean(
                left_val.compare(&right_val)? == Ordering::Less,
            )),
            BinaryOperator::LessThanOrEqual => Ok(FieldValue::Boolean(
                left_val.compare(&right_val)? != Ordering::Greater,
            )),
            BinaryOperator::GreaterThan => Ok(FieldValue::Boolean(
                left_val.compare(&right_val)? == Ordering::Greater,
            )),
            BinaryOperator::GreaterThanOrEqual => Ok(FieldValue::Boolean(
                left_val.compare(&right_val)? != Ordering::Less,
            )),
            BinaryOperator::Like | BinaryOperator::NotLike => {
                let pattern = match &right_val {
                    FieldValue::String(p) => p,
                    other => {
                        return Err(SqlError::type_error(
                            "string pattern for LIKE",
                            other.type_name(),
                            Some(other.to_string()),
                        ));
                    }
                };
                let matched = like_regex(pattern)?.is_match(&left_val.to_display_string());
                Ok(FieldValue::Boolean(matched == (op == BinaryOperator::Like)))
            }
            BinaryOperator::And
            | BinaryOperator::Or
            | BinaryOperator::In
            | BinaryOperator::NotIn => Err(SqlError::execution_error(
                format!("Operator {} was not dispatched", op.symbol()),
                None,
            )),
        }
    }

    fn evaluate_logical(
        left: &Expr,
        op: BinaryOperator,
        right: &Expr,
        ctx: &EvaluationContext<'_>,
    ) -> Result<FieldValue, SqlError> {
        let symbol = op.symbol();
        let is_and = op == BinaryOperator::And;
        let left_val = Self::logical_operand(&Self::evaluate_expression_value(left, ctx)?, symbol)?;

        // FALSE AND x, TRUE OR x
        if left_val == Some(!is_and) {
            return Ok(FieldValue::Boolean(!is_and));
        }
        let right_val =
            Self::logical_operand(&Self::evaluate_expression_value(right, ctx)?, symbol)?;

        let result = match (left_val, right_val) {
            (_, Some(b)) if b != is_and => Some(b),
            (Some(_), Some(_)) => Some(is_and),
            _ => None,
        };
        Ok(result.map(FieldValue::Boolean).unwrap_or(FieldValue::Null))
    }

    fn evaluate_in(
        left: &Expr,
        negated: bool,
        right: &Expr,
        ctx: &EvaluationContext<'_>,
    ) -> Result<FieldValue, SqlError> {
        let items = match right {
            Expr::List(items) => items,
            other => {
                return Err(SqlError::execution_error(
                    format!("IN requires a value list, got {}", other),
                    None,
                ));
            }
        };
        let value = Self::evaluate_expression_value(left, ctx)?;
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        let mut saw_null = false;
        for item in items {
            let candidate = Self::evaluate_expression_value(item, ctx)?;
            if candidate.is_null() {
                saw_null = true;
            } else if value.sql_equals(&candidate) {
                return Ok(FieldValue::Boolean(!negated));
            }
        }
        if saw_null {
            Ok(FieldValue::Null)
        } else {
            Ok(FieldValue::Boolean(negated))
        }
    }

    /// Branches are tried in source order and the first match wins. A simple CASE
    /// compares each WHEN value with the subject; NULL never matches.
    fn evaluate_case(
        operand: Option<&Expr>,
        when_clauses: &[(Expr, Expr)],
        else_clause: Option<&Expr>,
        ctx: &EvaluationContext<'_>,
    ) -> Result<FieldValue, SqlError> {
        let subject = match operand {
            Some(expr) => Some(Self::evaluate_expression_value(expr, ctx)?),
            None => None,
        };

        for (when, then) in when_clauses {
            let matched = match &subject {
                Some(subject) => {
                    let candidate = Self::evaluate_expression_value(when, ctx)?;
                    !subject.is_null() && !candidate.is_null() && subject.sql_equals(&candidate)
                }
                None => Self::evaluate_expression(when, ctx)?,
            };
            if matched {
                return Self::evaluate_expression_value(then, ctx);
            }
        }

        match else_clause {
            Some(expr) => Self::evaluate_expression_value(expr, ctx),
            None => Ok(FieldValue::Null),
        }
    }

    fn evaluate_function(
        name: &str,
        args: &[Expr],
        ctx: &EvaluationContext<'_>,
    ) -> Result<FieldValue, SqlError> {
        if is_context_function(name) {
            if !args.is_empty() {
                return Err(SqlError::execution_error(
                    format!("{} takes no arguments", name.to_uppercase()),
                    None,
                ));
            }
            let is_start = name.eq_ignore_ascii_case("WINDOW_START");
            return Ok(match ctx.window {
                Some((start, end)) => FieldValue::Integer(if is_start { start } else { end }),
                None => FieldValue::Null,
            });
        }

        let values = args
            .iter()
            .map(|arg| Self::evaluate_expression_value(arg, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        ctx.functions.call(name, &values)
    }
}
