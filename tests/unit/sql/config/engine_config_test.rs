//! Engine configuration: YAML loading, validation and WITH overrides

use std::collections::HashMap;
use std::io::Write;
use velostream_edge::velostream::sql::SqlError;
use velostream_edge::{EngineConfig, ProjectionErrorPolicy};

#[test]
fn test_partial_yaml_keeps_defaults() {
    let config = EngineConfig::from_yaml_str(
        r#"
tick_interval_ms: 250
projection_error_policy: zero
"#,
    )
    .unwrap();
    assert_eq!(config.tick_interval_ms, 250);
    assert_eq!(config.projection_error_policy, ProjectionErrorPolicy::Zero);
    assert_eq!(config.result_queue_capacity, 1024);
    assert!(config.flush_on_stop);
}

#[test]
fn test_yaml_file_round_trip() {
    let config = EngineConfig::default()
        .with_result_queue_capacity(16)
        .with_flush_on_stop(false)
        .with_max_out_of_orderness_ms(2_000);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_yaml_string().unwrap().as_bytes())
        .unwrap();

    let loaded = EngineConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(matches!(
        EngineConfig::from_yaml_str("result_queue_capacity: 0"),
        Err(SqlError::ConfigurationError { .. })
    ));
    assert!(EngineConfig::from_yaml_str("max_out_of_orderness_ms: -1").is_err());
    assert!(EngineConfig::from_yaml_str("projection_error_policy: panic").is_err());
    assert!(EngineConfig::from_yaml_file("/nonexistent/velostream-edge.yaml").is_err());
}

#[test]
fn test_with_clause_overrides() {
    let mut properties = HashMap::new();
    properties.insert("FLUSH_ON_STOP".to_string(), "false".to_string());
    properties.insert("MAX_LATENESS_MS".to_string(), "750".to_string());
    properties.insert("TICK_INTERVAL_MS".to_string(), "not-a-number".to_string());

    let resolved = EngineConfig::default()
        .resolve_overrides(&properties)
        .unwrap();
    assert!(!resolved.flush_on_stop);
    assert_eq!(resolved.max_out_of_orderness_ms, 750);
    // Unparsable values keep the configured setting.
    assert_eq!(resolved.tick_interval_ms, 100);
}
