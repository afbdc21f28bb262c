// Common helpers shared by unit and integration tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use velostream_edge::velostream::sql::execution::types::{FieldValue, ResultBatch, StreamRecord};
use velostream_edge::velostream::sql::execution::window_v2::ManualClock;
use velostream_edge::{EngineConfig, StreamExecutionEngine};

// Re-export commonly used external crates
pub use serial_test::serial;
pub use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn create_test_record(fields: Vec<(&str, FieldValue)>) -> StreamRecord {
    let mut field_map = HashMap::new();
    for (key, value) in fields {
        field_map.insert(key.to_string(), value);
    }
    StreamRecord::new(field_map)
}

pub fn sensor_record(device_id: &str, temperature: f64) -> StreamRecord {
    create_test_record(vec![
        ("device_id", FieldValue::String(device_id.to_string())),
        ("temperature", FieldValue::Float(temperature)),
    ])
}

pub type CollectedBatches = Arc<Mutex<Vec<ResultBatch>>>;

/// Register a sink that stores every batch it receives.
pub fn collect_batches(engine: &StreamExecutionEngine) -> CollectedBatches {
    let batches: CollectedBatches = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&batches);
    engine.add_sink(move |batch| captured.lock().unwrap().push(batch.clone()));
    batches
}

/// Engine on a manual clock with the periodic timer effectively disabled, so tests
/// decide when time-based windows close.
pub fn manual_engine(start_millis: i64) -> (StreamExecutionEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_millis));
    let config = EngineConfig::default().with_tick_interval_ms(3_600_000);
    let engine = StreamExecutionEngine::new(config).with_clock(clock.clone());
    (engine, clock)
}

/// All rows across batches, in delivery order.
pub fn all_rows(batches: &CollectedBatches) -> Vec<HashMap<String, FieldValue>> {
    batches
        .lock()
        .unwrap()
        .iter()
        .flat_map(|batch| batch.rows.clone())
        .collect()
}
