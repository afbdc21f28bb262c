//! Aggregation for streaming SQL queries.
//!
//! - [`Accumulator`]: incremental per-(group, window) state for one aggregate
//! - built-in accumulators and their registered factories
//! - [`compute`]: shared math (Welford mean/variance, percentiles)
//!
//! NULL inputs never reach an accumulator: the aggregate processor skips them, so
//! `SUM`, `AVG`, `MIN` and `MAX` over only NULLs report NULL and `COUNT(expr)`
//! reports `0.0`. `COUNT(*)` has no argument and counts every record.

pub mod accumulator;
pub mod compute;
pub mod functions;

pub use self::accumulator::Accumulator;
pub use self::functions::AggregateFunctions;
