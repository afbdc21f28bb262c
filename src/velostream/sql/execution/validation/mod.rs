//! Setup-time query validation
//!
//! Checks run once per query, before any record is processed:
//!
//! - **Functions**: every call resolves in the registry with a valid argument count;
//!   aggregate parameters are constants the aggregate accepts
//! - **Aggregation**: aggregates only in SELECT/HAVING, not nested, only with a window
//! - **Windows**: positive parameters, slide no larger than size, known TIMEUNIT

pub mod aggregation_validator;
pub mod function_validator;
pub mod query_validator;
pub mod window_validator;

pub use aggregation_validator::AggregationValidator;
pub use function_validator::FunctionValidator;
pub use query_validator::QueryValidator;
pub use window_validator::WindowValidator;
