pub mod conditional_aggregation_test;
pub mod group_by_test;
