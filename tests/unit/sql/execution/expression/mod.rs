pub mod case_expression_test;
pub mod function_registry_test;
