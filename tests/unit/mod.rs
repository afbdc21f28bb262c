pub mod common;
// Streaming SQL tests - parser, expressions, aggregation, windows, validation, config
pub mod sql;
