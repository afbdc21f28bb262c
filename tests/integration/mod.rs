// Integration Tests - full engine lifecycle with concurrent producers and sinks

#[path = "../unit/common.rs"]
pub mod common;

pub mod engine_lifecycle_test;
pub mod sensor_pipeline_test;
