//! Query planning.
//!
//! Turns a validated [`StreamingQuery`] into a [`QueryPlan`]: compiled WHERE, GROUP BY,
//! output and HAVING expressions, plus one [`AggregateSlot`] per distinct aggregate
//! call. Aggregate calls inside SELECT and HAVING are rewritten to
//! `Expr::AggregateRef(slot)`, so finalizing a group evaluates the rewritten tree
//! against the slot results:
//!
//! ```text
//! SELECT SUM(t) AS total, SUM(t) / COUNT(*) AS mean ... HAVING COUNT(*) > 2
//!   slots:   [0] SUM(t)   [1] COUNT(*)
//!   outputs: total = $agg0, mean = ($agg0 / $agg1)
//!   having:  ($agg1 > 2)
//! ```

use crate::velostream::sql::SqlError;
use crate::velostream::sql::ast::{Expr, SelectField, StreamingQuery, WindowSpec};
use crate::velostream::sql::execution::aggregation::Accumulator;
use crate::velostream::sql::execution::expression::{AggregateEntry, Expression, FunctionRegistry};
use crate::velostream::sql::execution::internal::GroupKey;
use crate::velostream::sql::execution::types::{FieldValue, StreamRecord};
use crate::velostream::sql::execution::validation::{FunctionValidator, QueryValidator};
use crate::velostream::sql::execution::window_v2::TimestampExtractor;
use log::debug;
use std::sync::Arc;

/// One aggregate computation shared by every identical call in the query.
#[derive(Clone)]
pub struct AggregateSlot {
    /// Upper-cased function name
    pub name: String,
    /// Per-record input; `None` for `COUNT(*)`
    pub input: Option<Expression>,
    /// Constant parameters after the input, e.g. the fraction of PERCENTILE
    pub params: Vec<FieldValue>,
    /// Rendered call, used to share slots between identical calls
    pub signature: String,
    entry: AggregateEntry,
}

impl AggregateSlot {
    pub fn create_accumulator(&self) -> Result<Box<dyn Accumulator>, SqlError> {
        self.entry.create(&self.params)
    }

    /// Value folded into this slot for `record`; `Null` values are skipped by the fold.
    ///
    /// `COUNT(*)` folds a marker for every record. An input that fails to evaluate
    /// contributes `Null`.
    pub fn contribution(&self, record: &StreamRecord) -> FieldValue {
        match &self.input {
            None => FieldValue::Boolean(true),
            Some(expr) => expr.evaluate(record).unwrap_or_else(|e| {
                debug!("{} input failed, skipping record: {}", self.signature, e);
                FieldValue::Null
            }),
        }
    }
}

impl std::fmt::Debug for AggregateSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateSlot")
            .field("signature", &self.signature)
            .field("params", &self.params)
            .finish()
    }
}

/// One output column of the query.
#[derive(Debug, Clone)]
pub enum OutputColumn {
    /// `SELECT *`: every top-level field of the record
    Wildcard,
    Expression { name: String, expr: Expression },
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub query: StreamingQuery,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub slots: Vec<AggregateSlot>,
    pub outputs: Vec<OutputColumn>,
    pub having: Option<Expression>,
    pub window: Option<WindowSpec>,
    pub timestamp: Option<TimestampExtractor>,
    registry: Arc<FunctionRegistry>,
}

impl QueryPlan {
    /// Validate `query` and build its plan. Fails without side effects.
    pub fn build(query: StreamingQuery, registry: Arc<FunctionRegistry>) -> Result<Self, SqlError> {
        QueryValidator::validate(&query, &registry)?;

        let compile = |expr: &Expr| Expression::from_expr(expr.clone(), Arc::clone(&registry));

        let where_clause = query.where_clause.as_ref().map(compile);
        let group_by = query.group_by.iter().map(compile).collect();

        let mut slots = Vec::new();
        let mut outputs = Vec::with_capacity(query.fields.len());
        for field in &query.fields {
            match field {
                SelectField::Wildcard => outputs.push(OutputColumn::Wildcard),
                SelectField::Expression { expr, .. } => {
                    let rewritten = rewrite_aggregates(expr.clone(), &mut slots, &registry)?;
                    outputs.push(OutputColumn::Expression {
                        name: field.output_name(),
                        expr: Expression::from_expr(rewritten, Arc::clone(&registry)),
                    });
                }
            }
        }

        let having = match &query.having {
            Some(expr) => {
                let rewritten = rewrite_aggregates(expr.clone(), &mut slots, &registry)?;
                Some(Expression::from_expr(rewritten, Arc::clone(&registry)))
            }
            None => None,
        };

        let timestamp = TimestampExtractor::from_query(&query)?;
        debug!(
            "Planned query over '{}': {} output(s), {} aggregate slot(s), window {:?}",
            query.from,
            outputs.len(),
            slots.len(),
            query.window.as_ref().map(WindowSpec::window_type)
        );

        Ok(Self {
            where_clause,
            group_by,
            slots,
            outputs,
            having,
            window: query.window.clone(),
            timestamp,
            query,
            registry,
        })
    }

    /// Windowed queries aggregate; everything else projects record by record.
    pub fn is_aggregated(&self) -> bool {
        self.window.is_some()
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Group key of `record`. A GROUP BY expression that fails evaluates to `Null`.
    pub fn group_key(&self, record: &StreamRecord) -> GroupKey {
        if self.group_by.is_empty() {
            return GroupKey::empty();
        }
        let values = self
            .group_by
            .iter()
            .map(|expr| {
                expr.evaluate(record).unwrap_or_else(|e| {
                    debug!("GROUP BY {} failed, grouping under NULL: {}", expr, e);
                    FieldValue::Null
                })
            })
            .collect();
        GroupKey::new(values)
    }

    /// Fresh accumulators for a new (group, window), in slot order.
    pub fn new_accumulators(&self) -> Result<Vec<Box<dyn Accumulator>>, SqlError> {
        self.slots
            .iter()
            .map(AggregateSlot::create_accumulator)
            .collect()
    }

    /// Per-slot contributions of one record.
    pub fn contributions(&self, record: &StreamRecord) -> Vec<FieldValue> {
        self.slots
            .iter()
            .map(|slot| slot.contribution(record))
            .collect()
    }
}

/// Replace aggregate calls with slot references, registering new slots as needed.
fn rewrite_aggregates(
    expr: Expr,
    slots: &mut Vec<AggregateSlot>,
    registry: &Arc<FunctionRegistry>,
) -> Result<Expr, SqlError> {
    let boxed = |e: Box<Expr>, slots: &mut Vec<AggregateSlot>| -> Result<Box<Expr>, SqlError> {
        Ok(Box::new(rewrite_aggregates(*e, slots, registry)?))
    };

    Ok(match expr {
        Expr::Function { name, args } => match registry.lookup_aggregate(&name) {
            Some(entry) => {
                let name = name.to_uppercase();
                let signature = Expr::function(name.clone(), args.clone()).to_string();
                if let Some(index) = slots.iter().position(|s| s.signature == signature) {
                    return Ok(Expr::AggregateRef(index));
                }
                let params = FunctionValidator::aggregate_params(&name, &args, registry)?;
                let input = args
                    .into_iter()
                    .next()
                    .map(|arg| Expression::from_expr(arg, Arc::clone(registry)));
                slots.push(AggregateSlot {
                    name,
                    input,
                    params,
                    signature,
                    entry,
                });
                Expr::AggregateRef(slots.len() - 1)
            }
            None => Expr::Function {
                name,
                args: args
                    .into_iter()
                    .map(|arg| rewrite_aggregates(arg, slots, registry))
                    .collect::<Result<_, _>>()?,
            },
        },
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: boxed(left, slots)?,
            op,
            right: boxed(right, slots)?,
        },
        Expr::UnaryOp { op, expr } => Expr::UnaryOp {
            op,
            expr: boxed(expr, slots)?,
        },
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let operand = operand.map(|e| boxed(e, slots)).transpose()?;
            let mut branches = Vec::with_capacity(when_clauses.len());
            for (when, then) in when_clauses {
                branches.push((
                    rewrite_aggregates(when, slots, registry)?,
                    rewrite_aggregates(then, slots, registry)?,
                ));
            }
            Expr::Case {
                operand,
                when_clauses: branches,
                else_clause: else_clause.map(|e| boxed(e, slots)).transpose()?,
            }
        }
        Expr::List(items) => Expr::List(
            items
                .into_iter()
                .map(|item| rewrite_aggregates(item, slots, registry))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: boxed(expr, slots)?,
            low: boxed(low, slots)?,
            high: boxed(high, slots)?,
            negated,
        },
        leaf @ (Expr::Column(_) | Expr::Literal(_) | Expr::AggregateRef(_)) => leaf,
    })
}
