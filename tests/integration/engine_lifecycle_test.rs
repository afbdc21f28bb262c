//! Engine lifecycle: start, concurrent ingestion, backpressure, sink isolation, stop

use crate::common::{all_rows, collect_batches, create_test_record, init_logging, sensor_record};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use velostream_edge::velostream::sql::execution::types::FieldValue;
use velostream_edge::{EngineConfig, ProjectionErrorPolicy, SqlError, StreamExecutionEngine};

#[test]
fn test_execute_requires_runtime() {
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    assert!(matches!(
        engine.execute("SELECT a FROM s"),
        Err(SqlError::ConfigurationError { .. })
    ));
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_lifecycle_and_stop_semantics() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    assert!(matches!(
        engine.emit(sensor_record("d1", 1.0)),
        Err(SqlError::StreamError { .. })
    ));

    engine.execute("SELECT device_id FROM sensors").unwrap();
    assert!(engine.is_running());
    assert!(engine.execute("SELECT device_id FROM sensors").is_err());

    engine.emit(sensor_record("d1", 1.0)).unwrap();
    engine.stop().await.unwrap();
    assert!(!engine.is_running());

    assert!(matches!(
        engine.emit(sensor_record("d1", 1.0)),
        Err(SqlError::StreamError { .. })
    ));
    assert!(engine.trigger().is_err());
    // Stopping twice is harmless.
    engine.stop().await.unwrap();
    assert!(engine.execute("SELECT device_id FROM sensors").is_err());
}

#[tokio::test]
async fn test_every_record_is_accounted_for() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT device_id, temperature FROM sensors WHERE temperature > 30 LIMIT 2")
        .unwrap();

    for t in [35.0, 20.0, 31.0, 25.0, 40.0] {
        engine.emit(sensor_record("d1", t)).unwrap();
    }
    engine.stop().await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.records_received, 5);
    assert_eq!(stats.records_filtered, 2);
    assert_eq!(stats.records_projected, 2);
    assert_eq!(stats.records_over_limit, 1);
    assert_eq!(stats.batches_delivered, 2);
    assert!(stats.window.is_none());

    let temps: Vec<Option<f64>> = all_rows(&batches)
        .iter()
        .map(|r| r["temperature"].as_f64())
        .collect();
    assert_eq!(temps, vec![Some(35.0), Some(31.0)]);
}

#[tokio::test]
async fn test_projection_error_policy() {
    init_logging();
    for (policy, expected) in [
        (ProjectionErrorPolicy::Null, FieldValue::Null),
        (ProjectionErrorPolicy::Zero, FieldValue::Integer(0)),
    ] {
        let engine = StreamExecutionEngine::new(
            EngineConfig::default().with_projection_error_policy(policy),
        );
        let batches = collect_batches(&engine);
        engine.execute("SELECT v / d AS ratio, v FROM s").unwrap();
        engine
            .emit(create_test_record(vec![
                ("v", FieldValue::Integer(10)),
                ("d", FieldValue::Integer(0)),
            ]))
            .unwrap();
        engine.stop().await.unwrap();

        let rows = all_rows(&batches);
        assert_eq!(rows[0]["ratio"], expected);
        assert_eq!(rows[0]["v"], FieldValue::Integer(10));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    init_logging();
    let engine = Arc::new(StreamExecutionEngine::new(EngineConfig::default()));
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT COUNT(*) AS cnt, SUM(v) AS total FROM s GROUP BY CountingWindow(100)")
        .unwrap();

    std::thread::scope(|scope| {
        for producer in 0..4 {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for i in 0..250 {
                    let mut fields = HashMap::new();
                    fields.insert("v".to_string(), FieldValue::Integer(producer * 1_000 + i));
                    engine.emit_fields(fields).unwrap();
                }
            });
        }
    });
    engine.stop().await.unwrap();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 10);
    let mut total = 0.0;
    for batch in batches.iter() {
        assert_eq!(batch.rows[0]["cnt"].as_f64(), Some(100.0));
        total += batch.rows[0]["total"].as_f64().unwrap();
    }
    // Every record lands in exactly one window.
    let expected: i64 = (0..4).map(|p| (0..250).map(|i| p * 1_000 + i).sum::<i64>()).sum();
    assert_eq!(total, expected as f64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_sink_drops_instead_of_blocking() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default().with_result_queue_capacity(1));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    engine.add_sink(move |_| {
        std::thread::sleep(std::time::Duration::from_millis(50));
        counter.fetch_add(1, Ordering::SeqCst);
    });
    engine.execute("SELECT v FROM s").unwrap();

    for i in 0..20 {
        engine
            .emit(create_test_record(vec![("v", FieldValue::Integer(i))]))
            .unwrap();
    }
    engine.stop().await.unwrap();

    let stats = engine.stats();
    assert!(stats.batches_dropped > 0);
    assert_eq!(stats.batches_queued + stats.batches_dropped, 20);
    assert_eq!(delivered.load(Ordering::SeqCst) as u64, stats.batches_queued);
}

#[tokio::test]
async fn test_panicking_sink_does_not_stop_delivery() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    engine.add_sink(|batch| {
        if batch.rows[0]["v"] == FieldValue::Integer(1) {
            panic!("sink failed on v=1");
        }
    });
    let batches = collect_batches(&engine);
    engine.execute("SELECT v FROM s").unwrap();
    for i in 0..3 {
        engine
            .emit(create_test_record(vec![("v", FieldValue::Integer(i))]))
            .unwrap();
    }
    engine.stop().await.unwrap();

    assert_eq!(all_rows(&batches).len(), 3);
    assert_eq!(engine.stats().sink_panics, 1);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    engine.execute("SELECT v FROM s").unwrap();
    assert!(engine.emit_json("{not json").is_err());
    assert!(engine.emit_json("[1, 2]").is_err());
    engine.emit_json(r#"{"v": 1}"#).unwrap();
    engine.stop().await.unwrap();
    assert_eq!(engine.stats().records_received, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_during_ingestion_keeps_accepted_records() {
    init_logging();
    let engine = Arc::new(StreamExecutionEngine::new(EngineConfig::default()));
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT COUNT(*) AS cnt FROM s GROUP BY CountingWindow(1000)")
        .unwrap();

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut accepted = 0u64;
                for i in 0..200_000 {
                    let record = create_test_record(vec![("v", FieldValue::Integer(producer * i))]);
                    if engine.emit(record).is_err() {
                        break;
                    }
                    accepted += 1;
                }
                accepted
            })
        })
        .collect();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    engine.stop().await.unwrap();
    let accepted: u64 = producers.into_iter().map(|p| p.join().unwrap()).sum();

    let counted: f64 = all_rows(&batches)
        .iter()
        .map(|row| row["cnt"].as_f64().unwrap())
        .sum();
    let stats = engine.stats();
    assert_eq!(stats.records_received, accepted);
    assert_eq!(stats.records_windowed, accepted);
    assert_eq!(stats.batches_dropped, 0);
    assert_eq!(counted, accepted as f64);
    assert_eq!(stats.window.unwrap().open_windows, 0);
}

#[tokio::test]
async fn test_distinct_without_window_drops_repeats() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine.execute("SELECT DISTINCT a FROM s").unwrap();
    for a in [1, 1, 2, 1, 2] {
        engine
            .emit(create_test_record(vec![("a", FieldValue::Integer(a))]))
            .unwrap();
    }
    engine.stop().await.unwrap();

    let values: Vec<FieldValue> = all_rows(&batches).iter().map(|r| r["a"].clone()).collect();
    assert_eq!(values, vec![FieldValue::Integer(1), FieldValue::Integer(2)]);
    let stats = engine.stats();
    assert_eq!(stats.records_projected, 2);
    assert_eq!(stats.records_duplicate, 3);
}
