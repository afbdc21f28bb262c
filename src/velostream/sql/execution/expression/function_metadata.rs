//! Function Metadata and Self-Registration System
//!
//! Built-in SQL functions declare their metadata next to their implementation and
//! register themselves at link time through `inventory`. [`FunctionRegistry`] copies
//! the collected definitions into its runtime tables.
//!
//! [`FunctionRegistry`]: super::function_registry::FunctionRegistry

use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::aggregation::accumulator::Accumulator;
use crate::velostream::sql::execution::types::FieldValue;

/// Scalar implementation: evaluated arguments in, value out.
pub type ScalarHandler = fn(&[FieldValue]) -> Result<FieldValue, SqlError>;

/// Aggregate factory: literal parameters (e.g. the `p` of PERCENTILE) in, fresh accumulator out.
pub type AggregateFactory = fn(&[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError>;

/// What a registered name resolves to.
#[derive(Debug, Clone, Copy)]
pub enum FunctionKind {
    Scalar(ScalarHandler),
    Aggregate(AggregateFactory),
}

/// SQL Function metadata for self-registration
#[derive(Debug, Clone)]
pub struct SqlFunctionDef {
    /// Primary function name (uppercase)
    pub name: &'static str,
    /// Alternative names/aliases for the function
    pub aliases: &'static [&'static str],
    /// Function category for organization
    pub category: FunctionCategory,
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments, `None` for variadic
    pub max_args: Option<usize>,
    pub kind: FunctionKind,
}

impl SqlFunctionDef {
    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, FunctionKind::Aggregate(_))
    }
}

/// Categories of SQL functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    /// Basic aggregation (COUNT, SUM, AVG, MIN, MAX)
    Aggregate,
    /// Statistical aggregation (STDDEV, VARIANCE, MEDIAN, PERCENTILE)
    Statistical,
    /// String manipulation (UPPER, LOWER, SUBSTRING, etc.)
    String,
    /// Mathematical operations (ABS, ROUND, SQRT, etc.)
    Math,
    /// Date/time operations (NOW)
    DateTime,
    /// Conditional logic (COALESCE, NULLIF, GREATEST, LEAST)
    Conditional,
    /// Conversions (TO_STRING, TO_NUMBER)
    Conversion,
}

// Distributed registration storage for SQL functions
inventory::collect!(SqlFunctionDef);

/// Macro to register a SQL function with metadata
///
/// # Example
/// ```rust,ignore
/// register_sql_function!(
///     name: "ABS",
///     aliases: [],
///     category: FunctionCategory::Math,
///     args: (1, Some(1)),
///     scalar: BuiltinFunctions::abs_function
/// );
/// ```
#[macro_export]
macro_rules! register_sql_function {
    (
        name: $name:expr,
        aliases: [$($alias:expr),*],
        category: $category:expr,
        args: ($min:expr, $max:expr),
        scalar: $handler:path
    ) => {
        inventory::submit! {
            $crate::velostream::sql::execution::expression::function_metadata::SqlFunctionDef {
                name: $name,
                aliases: &[$($alias),*],
                category: $category,
                min_args: $min,
                max_args: $max,
                kind: $crate::velostream::sql::execution::expression::function_metadata::FunctionKind::Scalar($handler),
            }
        }
    };
    (
        name: $name:expr,
        aliases: [$($alias:expr),*],
        category: $category:expr,
        args: ($min:expr, $max:expr),
        aggregate: $factory:path
    ) => {
        inventory::submit! {
            $crate::velostream::sql::execution::expression::function_metadata::SqlFunctionDef {
                name: $name,
                aliases: &[$($alias),*],
                category: $category,
                min_args: $min,
                max_args: $max,
                kind: $crate::velostream::sql::execution::expression::function_metadata::FunctionKind::Aggregate($factory),
            }
        }
    };
}

/// Get all registered SQL functions
pub fn all_registered_functions() -> impl Iterator<Item = &'static SqlFunctionDef> {
    inventory::iter::<SqlFunctionDef>.into_iter()
}
