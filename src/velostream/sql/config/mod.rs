//! Engine configuration: YAML loading plus environment and query overrides.

pub mod engine_config;
pub mod resolver;

pub use engine_config::{EngineConfig, ProjectionErrorPolicy};
pub use resolver::PropertyResolver;
