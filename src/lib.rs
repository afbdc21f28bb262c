//! # velostream-edge
//!
//! An embeddable streaming SQL engine. Producers push records in; a continuous
//! query filters, groups and aggregates them over tumbling, sliding, counting or
//! session windows; result batches are pushed to registered sinks.

// Allow certain clippy warnings for development
#![allow(clippy::derivable_impls)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::needless_doctest_main)]
#![allow(clippy::large_enum_variant)]
//!
//! ## Features
//!
//! - **Streaming SQL**: `SELECT`, `WHERE`, `GROUP BY`, `HAVING`, `DISTINCT`, `LIMIT`
//! - **Windows**: `TumblingWindow`, `SlidingWindow`, `CountingWindow`, `SessionWindow`
//! - **Event Time**: `WITH (TIMESTAMP='ts', TIMEUNIT='ms')` with watermarks
//! - **Conditional Aggregation**: `SUM(CASE WHEN ... ELSE NULL END)` with SQL NULL skipping
//! - **Extensible Functions**: register scalar and aggregate functions at runtime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use velostream_edge::{EngineConfig, StreamExecutionEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StreamExecutionEngine::new(EngineConfig::default());
//!     engine.add_sink(|batch| {
//!         for row in &batch.rows {
//!             println!("{:?} {:?}", batch.window, row);
//!         }
//!     });
//!
//!     engine.execute(
//!         "SELECT device_id, AVG(temperature) AS avg_temp, \
//!                 COUNT(CASE WHEN temperature > 30 THEN 1 ELSE NULL END) AS hot \
//!          FROM sensors \
//!          GROUP BY device_id, TumblingWindow('10s')",
//!     )?;
//!
//!     engine.emit_json(r#"{"device_id": "d1", "temperature": 31.5}"#)?;
//!     engine.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod velostream;

// Re-export main API at crate root for easy access
pub use velostream::sql::execution::{
    EngineStats,
    // Expressions and functions
    Expression,
    FieldValue,
    FunctionRegistry,
    ResultBatch,
    ResultRow,
    // Engine
    StreamExecutionEngine,
    StreamRecord,
};
pub use velostream::sql::{EngineConfig, ProjectionErrorPolicy, SqlError, StreamingSqlParser};
