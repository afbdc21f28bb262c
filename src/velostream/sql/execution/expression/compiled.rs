//! Compiled expressions.
//!
//! [`Expression::compile`] parses text with the restricted grammar. Text that uses a
//! construct the restricted grammar rejects (a CASE nested inside another CASE) is
//! re-parsed with the permissive grammar and kept as a *delegated* expression: the
//! raw text plus the fallback tree. Both forms evaluate through the same contract
//! and report the same field set.

use super::evaluator::{EvaluationContext, ExpressionEvaluator};
use super::function_registry::FunctionRegistry;
use crate::velostream::sql::ast::Expr;
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::types::{FieldValue, ResultRow, StreamRecord};
use crate::velostream::sql::parser::{ParseMode, StreamingSqlParser};
use log::debug;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum CompiledForm {
    Native(Expr),
    Delegated { text: String, tree: Expr },
}

/// Extra inputs for evaluating an expression inside an aggregated row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowScope<'a> {
    /// Finalized aggregate slots
    pub aggregates: &'a [FieldValue],
    /// Firing window bounds, epoch milliseconds
    pub window: Option<(i64, i64)>,
    /// Columns already computed for the row
    pub aliases: Option<&'a ResultRow>,
}

/// An expression ready to evaluate against records.
///
/// Evaluation is pure and holds no mutable state, so an `Expression` can be shared
/// across threads and evaluated repeatedly with identical results.
#[derive(Clone)]
pub struct Expression {
    form: CompiledForm,
    registry: Arc<FunctionRegistry>,
}

impl Expression {
    /// Compile expression text. Function names are not resolved until evaluation.
    pub fn compile(text: &str, registry: Arc<FunctionRegistry>) -> Result<Self, SqlError> {
        let parser = StreamingSqlParser::new();
        match parser.parse_expression(text, ParseMode::Restricted) {
            Ok(expr) => Ok(Self {
                form: CompiledForm::Native(expr),
                registry,
            }),
            Err(SqlError::UnsupportedExpression { message }) => {
                debug!("Delegating expression '{}': {}", text, message);
                let tree = parser.parse_expression(text, ParseMode::Permissive)?;
                Ok(Self {
                    form: CompiledForm::Delegated {
                        text: text.to_string(),
                        tree,
                    },
                    registry,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Wrap an already parsed tree, delegating when it nests CASE expressions.
    pub fn from_expr(expr: Expr, registry: Arc<FunctionRegistry>) -> Self {
        let form = if expr.case_depth() > 1 {
            CompiledForm::Delegated {
                text: expr.to_string(),
                tree: expr,
            }
        } else {
            CompiledForm::Native(expr)
        };
        Self { form, registry }
    }

    /// Evaluate against a record.
    pub fn evaluate(&self, record: &StreamRecord) -> Result<FieldValue, SqlError> {
        self.evaluate_in(record, &RowScope::default())
    }

    /// Evaluate against a record with aggregate, window and alias inputs.
    pub fn evaluate_in(
        &self,
        record: &StreamRecord,
        scope: &RowScope<'_>,
    ) -> Result<FieldValue, SqlError> {
        let ctx = EvaluationContext {
            record,
            functions: &self.registry,
            aggregates: scope.aggregates,
            window: scope.window,
            aliases: scope.aliases,
        };
        ExpressionEvaluator::evaluate_expression_value(self.tree(), &ctx)
    }

    /// Evaluate as a condition. NULL and non-truthy values are `false`.
    pub fn evaluate_predicate(&self, record: &StreamRecord) -> Result<bool, SqlError> {
        self.evaluate_predicate_in(record, &RowScope::default())
    }

    pub fn evaluate_predicate_in(
        &self,
        record: &StreamRecord,
        scope: &RowScope<'_>,
    ) -> Result<bool, SqlError> {
        Ok(ExpressionEvaluator::is_truthy(
            &self.evaluate_in(record, scope)?,
        ))
    }

    /// Names of all record fields the expression reads.
    pub fn fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.tree().walk(&mut |node| {
            if let Expr::Column(name) = node {
                fields.insert(name.clone());
            }
        });
        fields
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.form, CompiledForm::Delegated { .. })
    }

    /// Source text for delegated expressions, rendered SQL otherwise.
    pub fn text(&self) -> String {
        match &self.form {
            CompiledForm::Native(expr) => expr.to_string(),
            CompiledForm::Delegated { text, .. } => text.clone(),
        }
    }

    pub fn tree(&self) -> &Expr {
        match &self.form {
            CompiledForm::Native(expr) => expr,
            CompiledForm::Delegated { tree, .. } => tree,
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("form", &self.form)
            .finish()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}
