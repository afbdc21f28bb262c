//! Time-based windows: processing time, event time, watermarks and late records

use crate::common::{all_rows, collect_batches, create_test_record, init_logging, manual_engine};
use velostream_edge::velostream::sql::execution::types::FieldValue;
use velostream_edge::{EngineConfig, StreamExecutionEngine};

fn event(user: &str, ts: i64) -> velostream_edge::StreamRecord {
    create_test_record(vec![
        ("user_id", FieldValue::String(user.to_string())),
        ("ts", FieldValue::Integer(ts)),
    ])
}

#[tokio::test]
async fn test_processing_time_tumbling_closes_on_poll() {
    init_logging();
    let (engine, clock) = manual_engine(1_000);
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT COUNT(*) AS n FROM clicks GROUP BY TumblingWindow('1s')")
        .unwrap();

    for _ in 0..3 {
        engine.emit(create_test_record(vec![])).unwrap();
    }
    assert_eq!(engine.poll_windows().unwrap(), 0);

    clock.set(2_000);
    assert_eq!(engine.poll_windows().unwrap(), 1);
    engine.stop().await.unwrap();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].window, Some((1_000, 2_000)));
    assert_eq!(batches[0].rows[0]["n"].as_f64(), Some(3.0));
}

#[tokio::test]
async fn test_event_time_tumbling_with_window_bounds() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT user_id, COUNT(*) AS n, WINDOW_START() AS ws, WINDOW_END() AS we \
             FROM clicks GROUP BY user_id, TumblingWindow('10s') \
             WITH (TIMESTAMP='ts', TIMEUNIT='ms')",
        )
        .unwrap();

    engine.emit(event("u1", 1_000)).unwrap();
    engine.emit(event("u1", 9_999)).unwrap();
    // Watermark passes 10s: the first window fires inline.
    engine.emit(event("u1", 10_000)).unwrap();
    engine.stop().await.unwrap();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].window, Some((0, 10_000)));
    assert_eq!(batches[0].rows[0]["n"].as_f64(), Some(2.0));
    assert_eq!(batches[0].rows[0]["ws"], FieldValue::Integer(0));
    assert_eq!(batches[0].rows[0]["we"], FieldValue::Integer(10_000));
    assert_eq!(batches[1].window, Some((10_000, 20_000)));
    assert_eq!(batches[1].rows[0]["n"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn test_event_time_in_seconds() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT COUNT(*) AS n FROM clicks GROUP BY TumblingWindow('10s') \
             WITH (TIMESTAMP='ts', TIMEUNIT='s')",
        )
        .unwrap();

    engine.emit(event("u1", 1)).unwrap();
    engine.emit(event("u1", 5)).unwrap();
    engine.emit(event("u1", 12)).unwrap();
    engine.stop().await.unwrap();

    let windows: Vec<Option<(i64, i64)>> =
        batches.lock().unwrap().iter().map(|b| b.window).collect();
    assert_eq!(windows, vec![Some((0, 10_000)), Some((10_000, 20_000))]);
}

#[tokio::test]
async fn test_late_record_is_counted_not_dropped() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT COUNT(*) AS n FROM clicks GROUP BY TumblingWindow('10s') \
             WITH (TIMESTAMP='ts')",
        )
        .unwrap();

    engine.emit(event("u1", 1_000)).unwrap();
    engine.emit(event("u1", 10_500)).unwrap();
    engine.emit(event("u1", 2_000)).unwrap();
    engine.stop().await.unwrap();

    let stats = engine.stats();
    let window_stats = stats.window.unwrap();
    assert_eq!(window_stats.late_records, 1);
    assert_eq!(window_stats.fired_windows, 3);

    let batches = batches.lock().unwrap();
    let late = &batches[1];
    assert_eq!(late.window, Some((0, 10_000)));
    assert_eq!(late.rows[0]["n"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn test_out_of_orderness_delays_firing() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT COUNT(*) AS n FROM clicks GROUP BY TumblingWindow('10s') \
             WITH (TIMESTAMP='ts', MAX_OUT_OF_ORDERNESS_MS='5000')",
        )
        .unwrap();

    engine.emit(event("u1", 1_000)).unwrap();
    engine.emit(event("u1", 12_000)).unwrap();
    // Still inside the allowed lateness: joins the first window.
    engine.emit(event("u1", 8_000)).unwrap();
    engine.emit(event("u1", 15_000)).unwrap();
    engine.stop().await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.window.unwrap().late_records, 0);
    let batches = batches.lock().unwrap();
    assert_eq!(batches[0].window, Some((0, 10_000)));
    assert_eq!(batches[0].rows[0]["n"].as_f64(), Some(2.0));
}

#[tokio::test]
async fn test_sliding_window_instances_overlap() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT COUNT(*) AS n FROM clicks GROUP BY SlidingWindow('10s', '5s') \
             WITH (TIMESTAMP='ts')",
        )
        .unwrap();

    for ts in [1_000, 6_000, 12_000] {
        engine.emit(event("u1", ts)).unwrap();
    }
    engine.stop().await.unwrap();

    let fired: Vec<((i64, i64), f64)> = batches
        .lock()
        .unwrap()
        .iter()
        .map(|b| (b.window.unwrap(), b.rows[0]["n"].as_f64().unwrap()))
        .collect();
    assert_eq!(
        fired,
        vec![
            ((-5_000, 5_000), 1.0),
            ((0, 10_000), 2.0),
            ((5_000, 15_000), 2.0),
            ((10_000, 20_000), 1.0),
        ]
    );
}

#[tokio::test]
async fn test_session_window_closes_after_gap() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT user_id, COUNT(*) AS clicks FROM clicks \
             GROUP BY user_id, SessionWindow('5s') WITH (TIMESTAMP='ts')",
        )
        .unwrap();

    for ts in [0, 2_000, 4_000] {
        engine.emit(event("u1", ts)).unwrap();
    }
    engine.emit(event("u1", 20_000)).unwrap();
    engine.stop().await.unwrap();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].window, Some((0, 9_000)));
    assert_eq!(batches[0].rows[0]["clicks"].as_f64(), Some(3.0));
    assert_eq!(batches[1].window, Some((20_000, 25_000)));
    assert_eq!(batches[1].rows[0]["clicks"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn test_missing_timestamp_falls_back_to_processing_time() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT COUNT(*) AS n FROM clicks GROUP BY CountingWindow(2) WITH (TIMESTAMP='ts')",
        )
        .unwrap();

    engine.emit(create_test_record(vec![])).unwrap();
    engine
        .emit(create_test_record(vec![("ts", FieldValue::String("not a time".to_string()))]))
        .unwrap();
    engine.stop().await.unwrap();

    assert_eq!(all_rows(&batches).len(), 1);
    assert_eq!(engine.stats().window.unwrap().timestamp_fallbacks, 2);
}
