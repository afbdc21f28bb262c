//! Counting windows: per-group capacity, inline firing and flush on stop

use crate::common::{all_rows, collect_batches, init_logging, sensor_record};
use velostream_edge::{EngineConfig, StreamExecutionEngine};

#[tokio::test]
async fn test_counting_window_fires_every_n_records_per_key() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT device_id, COUNT(*) AS cnt FROM sensors \
             GROUP BY device_id, CountingWindow(10)",
        )
        .unwrap();

    for i in 0..30 {
        engine.emit(sensor_record("d1", 20.0 + i as f64)).unwrap();
    }
    engine.stop().await.unwrap();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 3);
    for batch in batches.iter() {
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.rows[0]["cnt"].as_f64(), Some(10.0));
    }
}

#[tokio::test]
async fn test_keys_count_independently() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default().with_flush_on_stop(false));
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT device_id, SUM(temperature) AS total FROM sensors \
             GROUP BY device_id, CountingWindow(3)",
        )
        .unwrap();

    for _ in 0..3 {
        engine.emit(sensor_record("a", 1.0)).unwrap();
        engine.emit(sensor_record("b", 2.0)).unwrap();
    }
    // Incomplete window for "a" is discarded on stop.
    engine.emit(sensor_record("a", 1.0)).unwrap();
    engine.stop().await.unwrap();

    let rows = all_rows(&batches);
    assert_eq!(rows.len(), 2);
    let total_for = |device: &str| {
        rows.iter()
            .find(|r| r["device_id"].to_string() == device)
            .and_then(|r| r["total"].as_f64())
    };
    assert_eq!(total_for("a"), Some(3.0));
    assert_eq!(total_for("b"), Some(6.0));
}

#[tokio::test]
async fn test_partial_window_flushed_on_stop() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT COUNT(*) AS cnt FROM sensors GROUP BY CountingWindow(10)")
        .unwrap();

    for _ in 0..25 {
        engine.emit(sensor_record("d1", 1.0)).unwrap();
    }
    engine.stop().await.unwrap();

    let counts: Vec<Option<f64>> = all_rows(&batches)
        .iter()
        .map(|r| r["cnt"].as_f64())
        .collect();
    assert_eq!(counts, vec![Some(10.0), Some(10.0), Some(5.0)]);
}

#[tokio::test]
async fn test_manual_trigger_fires_open_windows() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default().with_flush_on_stop(false));
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT COUNT(*) AS cnt FROM sensors GROUP BY CountingWindow(100)")
        .unwrap();

    for _ in 0..4 {
        engine.emit(sensor_record("d1", 1.0)).unwrap();
    }
    assert_eq!(engine.trigger().unwrap(), 1);
    assert_eq!(engine.trigger().unwrap(), 0);
    engine.stop().await.unwrap();

    let rows = all_rows(&batches);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["cnt"].as_f64(), Some(4.0));
}
