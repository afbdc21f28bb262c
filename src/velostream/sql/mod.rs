// Streaming SQL module for velostream-edge
// Continuous queries with windowed aggregation over in-process records

pub mod ast;
pub mod config;
pub mod error;
pub mod execution;
pub mod parser;

// Re-export main API
pub use ast::StreamingQuery;
pub use config::{EngineConfig, ProjectionErrorPolicy};
pub use error::{SqlError, SqlResult};
pub use execution::{FieldValue, StreamExecutionEngine};
pub use parser::StreamingSqlParser;

// Version and feature info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FEATURES: &[&str] = &[
    "streaming_select",
    "windowing",           // TumblingWindow, SlidingWindow, CountingWindow, SessionWindow
    "event_time",          // WITH (TIMESTAMP=..., TIMEUNIT=...), watermarks
    "math_functions",      // ABS, ROUND, CEIL, FLOOR, MOD, POWER, SQRT
    "string_functions",    // CONCAT, LENGTH, TRIM, UPPER, LOWER, REPLACE, SUBSTRING
    "utility_functions",   // COALESCE, NULLIF
    "aggregate_functions", // COUNT, SUM, AVG, MIN, MAX, STDDEV, VARIANCE, PERCENTILE
    "having_clause",       // Post-aggregation filtering with HAVING
    "conditional_aggregation", // SUM(CASE WHEN ... ELSE NULL END)
];
