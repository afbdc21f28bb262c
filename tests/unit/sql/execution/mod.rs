// Expression engine tests
pub mod expression;

// Aggregation tests
pub mod aggregation;
