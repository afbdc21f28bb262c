// SQL module tests - streaming SQL front end and execution

// SQL parsing tests
pub mod parser;

// SQL execution tests
pub mod execution;

// SQL configuration tests
pub mod config;

// Query validation tests
pub mod validation;
