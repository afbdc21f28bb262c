//! Streaming SQL execution.
//!
//! A query flows through these layers:
//!
//! - [`planner`]: validated query to [`QueryPlan`] with compiled expressions and
//!   aggregate slots
//! - [`processors`]: WHERE, projection, grouping and windowing per record
//! - [`window_v2`]: window assignment strategies and time handling
//! - [`engine`]: the async [`StreamExecutionEngine`] feeding results to sinks

pub mod aggregation;
pub mod engine;
pub mod expression;
pub mod internal;
pub mod planner;
pub mod processors;
pub mod types;
pub mod validation;
pub mod window_v2;

pub use engine::{EngineStats, ResultSink, StreamExecutionEngine};
pub use expression::{Expression, FunctionRegistry};
pub use planner::QueryPlan;
pub use types::{FieldValue, ResultBatch, ResultRow, StreamRecord};
