//! Engine configuration.
//!
//! ```yaml
//! result_queue_capacity: 1024
//! tick_interval_ms: 100
//! flush_on_stop: true
//! max_out_of_orderness_ms: 0
//! shutdown_timeout_ms: 5000
//! projection_error_policy: null
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use super::resolver::PropertyResolver;
use crate::velostream::sql::error::SqlError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Value substituted for a SELECT column whose expression failed on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionErrorPolicy {
    /// Emit `NULL` for the failed column
    #[default]
    Null,
    /// Emit integer `0` for the failed column
    Zero,
}

impl std::str::FromStr for ProjectionErrorPolicy {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "null" => Ok(Self::Null),
            "zero" | "0" => Ok(Self::Zero),
            other => Err(SqlError::configuration_error(format!(
                "Unknown projection_error_policy '{}', expected 'null' or 'zero'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the bounded queue between window firing and sinks
    pub result_queue_capacity: usize,
    /// Period of the timer that closes time-based windows
    pub tick_interval_ms: u64,
    /// Fire open windows on `stop()` instead of discarding them
    pub flush_on_stop: bool,
    /// Watermark lag behind the largest event time seen
    pub max_out_of_orderness_ms: i64,
    /// Upper bound on waiting for background tasks during `stop()`
    pub shutdown_timeout_ms: u64,
    /// YAML `null` (unquoted) selects the `null` policy
    #[serde(deserialize_with = "null_as_default")]
    pub projection_error_policy: ProjectionErrorPolicy,
}

fn null_as_default<'de, D>(deserializer: D) -> Result<ProjectionErrorPolicy, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<ProjectionErrorPolicy>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_queue_capacity: 1024,
            tick_interval_ms: 100,
            flush_on_stop: true,
            max_out_of_orderness_ms: 0,
            shutdown_timeout_ms: 5_000,
            projection_error_policy: ProjectionErrorPolicy::Null,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, SqlError> {
        let config: EngineConfig = serde_yaml::from_str(yaml).map_err(|e| {
            SqlError::configuration_error(format!("Invalid engine configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SqlError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SqlError::configuration_error(format!(
                "Failed to read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, SqlError> {
        serde_yaml::to_string(self).map_err(|e| {
            SqlError::configuration_error(format!("Failed to serialize configuration: {}", e))
        })
    }

    pub fn with_result_queue_capacity(mut self, capacity: usize) -> Self {
        self.result_queue_capacity = capacity;
        self
    }

    pub fn with_tick_interval_ms(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis;
        self
    }

    pub fn with_flush_on_stop(mut self, flush: bool) -> Self {
        self.flush_on_stop = flush;
        self
    }

    pub fn with_max_out_of_orderness_ms(mut self, millis: i64) -> Self {
        self.max_out_of_orderness_ms = millis;
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, millis: u64) -> Self {
        self.shutdown_timeout_ms = millis;
        self
    }

    pub fn with_projection_error_policy(mut self, policy: ProjectionErrorPolicy) -> Self {
        self.projection_error_policy = policy;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SqlError> {
        if self.result_queue_capacity == 0 {
            return Err(SqlError::configuration_error(
                "result_queue_capacity must be greater than 0",
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(SqlError::configuration_error(
                "tick_interval_ms must be greater than 0",
            ));
        }
        if self.max_out_of_orderness_ms < 0 {
            return Err(SqlError::configuration_error(
                "max_out_of_orderness_ms must not be negative",
            ));
        }
        Ok(())
    }

    /// Apply environment (`VELOSTREAM_EDGE_*`) and query `WITH (...)` overrides.
    pub fn resolve_overrides(
        &self,
        properties: &HashMap<String, String>,
    ) -> Result<Self, SqlError> {
        let resolver = PropertyResolver::default();
        let resolved = Self {
            result_queue_capacity: resolver.resolve(
                "RESULT_QUEUE_CAPACITY",
                &["result_queue_capacity"],
                properties,
                self.result_queue_capacity,
            ),
            tick_interval_ms: resolver.resolve(
                "TICK_INTERVAL_MS",
                &["tick_interval_ms"],
                properties,
                self.tick_interval_ms,
            ),
            flush_on_stop: resolver.resolve_bool(
                "FLUSH_ON_STOP",
                &["flush_on_stop"],
                properties,
                self.flush_on_stop,
            ),
            max_out_of_orderness_ms: resolver.resolve(
                "MAX_OUT_OF_ORDERNESS_MS",
                &["max_out_of_orderness_ms", "max_lateness_ms"],
                properties,
                self.max_out_of_orderness_ms,
            ),
            shutdown_timeout_ms: resolver.resolve(
                "SHUTDOWN_TIMEOUT_MS",
                &["shutdown_timeout_ms"],
                properties,
                self.shutdown_timeout_ms,
            ),
            projection_error_policy: resolver.resolve(
                "PROJECTION_ERROR_POLICY",
                &["projection_error_policy"],
                properties,
                self.projection_error_policy,
            ),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}
