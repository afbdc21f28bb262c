//! Expression evaluation module for streaming SQL execution.
//!
//! - [`Expression`]: compiled expression with the `compile` / `evaluate` / `fields`
//!   contract, native or delegated
//! - [`ExpressionEvaluator`]: tree-walking evaluator with SQL NULL semantics
//! - [`FunctionRegistry`]: runtime name to implementation map, consulted at
//!   evaluation time
//! - built-in scalar functions, self-registered through `register_sql_function!`

pub mod compiled;
pub mod evaluator;
pub mod function_metadata;
pub mod function_registry;
pub mod functions;

// Re-export the main API
pub use compiled::{Expression, RowScope};
pub use evaluator::{EvaluationContext, ExpressionEvaluator, is_context_function};
pub use function_metadata::{FunctionCategory, FunctionKind, SqlFunctionDef};
pub use function_registry::{AggregateEntry, Arity, FunctionRegistry, ScalarFunction};
pub use functions::BuiltinFunctions;
