pub mod query_validation_test;
