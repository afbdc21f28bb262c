//! GROUP BY key handling and HAVING over finalized rows

use crate::common::{all_rows, collect_batches, create_test_record, init_logging, sensor_record};
use velostream_edge::velostream::sql::execution::types::FieldValue;
use velostream_edge::{EngineConfig, StreamExecutionEngine};

fn string(s: &str) -> FieldValue {
    FieldValue::String(s.to_string())
}

#[tokio::test]
async fn test_having_filters_on_finalized_alias() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT device_id, \
                    COUNT(CASE WHEN temperature > 30 THEN 1 ELSE NULL END) AS hot_count \
             FROM sensors \
             GROUP BY device_id, CountingWindow(3) \
             HAVING hot_count >= 2",
        )
        .unwrap();

    for t in [35.0, 20.0, 21.0] {
        engine.emit(sensor_record("cool", t)).unwrap();
    }
    for t in [35.0, 31.0, 40.0] {
        engine.emit(sensor_record("hot", t)).unwrap();
    }
    engine.stop().await.unwrap();

    let rows = all_rows(&batches);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["device_id"], string("hot"));
    assert_eq!(rows[0]["hot_count"].as_f64(), Some(3.0));
}

#[tokio::test]
async fn test_having_on_hidden_aggregate() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT device_id, AVG(temperature) AS avg_temp FROM sensors \
             GROUP BY device_id, CountingWindow(2) HAVING MAX(temperature) > 50",
        )
        .unwrap();

    engine.emit(sensor_record("a", 10.0)).unwrap();
    engine.emit(sensor_record("a", 60.0)).unwrap();
    engine.emit(sensor_record("b", 10.0)).unwrap();
    engine.emit(sensor_record("b", 20.0)).unwrap();
    engine.stop().await.unwrap();

    let rows = all_rows(&batches);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["device_id"], string("a"));
    assert_eq!(rows[0]["avg_temp"].as_f64(), Some(35.0));
    assert!(!rows[0].contains_key("MAX(temperature)"));
}

#[tokio::test]
async fn test_multi_key_groups_fire_independently() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute(
            "SELECT region, sensor_type, AVG(value) AS avg_value, MIN(value) AS min_value, \
                    COUNT(*) AS cnt \
             FROM readings \
             GROUP BY region, sensor_type, CountingWindow(5)",
        )
        .unwrap();

    let combos = [
        ("north", "temp", 10.0),
        ("north", "humidity", 20.0),
        ("south", "temp", 30.0),
        ("south", "humidity", 40.0),
    ];
    // Interleave the combinations: each one reaches its own threshold of 5.
    for i in 0..5 {
        for (region, sensor_type, base) in combos {
            engine
                .emit(create_test_record(vec![
                    ("region", string(region)),
                    ("sensor_type", string(sensor_type)),
                    ("value", FieldValue::Float(base + i as f64)),
                ]))
                .unwrap();
        }
    }
    engine.stop().await.unwrap();

    assert_eq!(batches.lock().unwrap().len(), 4);
    let rows = all_rows(&batches);
    assert_eq!(rows.len(), 4);
    for (region, sensor_type, base) in combos {
        let row = rows
            .iter()
            .find(|r| r["region"] == string(region) && r["sensor_type"] == string(sensor_type))
            .unwrap_or_else(|| panic!("missing group {}/{}", region, sensor_type));
        assert_eq!(row["cnt"].as_f64(), Some(5.0));
        assert_eq!(row["avg_value"].as_f64(), Some(base + 2.0));
        assert_eq!(row["min_value"].as_f64(), Some(base));
    }
}

#[tokio::test]
async fn test_null_group_key_is_its_own_group() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT site, COUNT(*) AS n FROM s GROUP BY site, CountingWindow(2)")
        .unwrap();

    engine.emit(create_test_record(vec![("site", string("x"))])).unwrap();
    engine.emit(create_test_record(vec![])).unwrap();
    engine.emit(create_test_record(vec![("site", FieldValue::Null)])).unwrap();
    engine.stop().await.unwrap();

    let rows = all_rows(&batches);
    let null_group = rows.iter().find(|r| r["site"] == FieldValue::Null).unwrap();
    assert_eq!(null_group["n"].as_f64(), Some(2.0));
    let x_group = rows.iter().find(|r| r["site"] == string("x")).unwrap();
    assert_eq!(x_group["n"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn test_nan_group_key_accumulates_in_one_group() {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine
        .execute("SELECT COUNT(*) AS n FROM s GROUP BY POWER(x, 0.5), CountingWindow(3)")
        .unwrap();

    for x in [-4.0, -9.0, -1.0] {
        engine
            .emit(create_test_record(vec![("x", FieldValue::Float(x))]))
            .unwrap();
    }
    // The counting window fired inline on the third record.
    assert_eq!(engine.stats().window.unwrap().open_windows, 0);
    engine.stop().await.unwrap();

    let rows = all_rows(&batches);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"].as_f64(), Some(3.0));
}
