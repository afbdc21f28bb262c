//! Window Processing V2 - Trait-Based Architecture
//!
//! Window boundaries are decided by pluggable [`WindowStrategy`] implementations;
//! aggregate state lives outside the strategies, in the window processor's arena.
//!
//! ## Architecture Overview
//!
//! - **Traits**: [`WindowStrategy`] assigns records to window instances and reports
//!   instances that closed
//! - **Strategies**: tumbling, sliding, counting and session windows
//! - **Time**: [`TimestampExtractor`] reads event time; [`Clock`] supplies processing time

pub mod strategies;
pub mod timestamp_utils;
pub mod traits;
pub mod types;

pub use strategies::create_strategy;
pub use timestamp_utils::{Clock, ManualClock, SystemClock, TimestampExtractor};
pub use traits::{WindowStats, WindowStrategy};
pub use types::{Assignment, ClosedWindow, WindowAssignment, WindowBounds, WindowId};
