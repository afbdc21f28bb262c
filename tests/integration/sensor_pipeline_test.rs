//! End-to-end IoT pipeline: JSON readings, event time, conditional aggregation

use crate::common::{collect_batches, init_logging, manual_engine};
use velostream_edge::velostream::sql::execution::types::FieldValue;

const QUERY: &str = "\
    SELECT device_id, \
           meta.location AS location, \
           AVG(temperature) AS avg_temp, \
           MAX(temperature) AS max_temp, \
           COUNT(CASE WHEN temperature > 30 THEN 1 ELSE NULL END) AS hot_readings, \
           CASE WHEN MAX(temperature) > 34 THEN 'alert' ELSE 'normal' END AS status \
    FROM sensors \
    WHERE temperature IS NOT NULL \
    GROUP BY device_id, TumblingWindow('10s') \
    WITH (TIMESTAMP='ts', TIMEUNIT='ms')";

fn reading(device: &str, ts: i64, temperature: Option<f64>) -> String {
    let temperature = temperature.map_or("null".to_string(), |t| t.to_string());
    format!(
        r#"{{"device_id": "{}", "ts": {}, "temperature": {}, "meta": {{"location": "hall-{}"}}}}"#,
        device, ts, temperature, device
    )
}

#[tokio::test]
async fn test_sensor_pipeline() {
    init_logging();
    let (engine, _clock) = manual_engine(0);
    let batches = collect_batches(&engine);
    engine.execute(QUERY).unwrap();

    let readings = [
        reading("d1", 1_000, Some(25.0)),
        reading("d2", 2_000, Some(20.0)),
        reading("d1", 3_000, Some(35.0)),
        reading("d2", 4_000, Some(22.0)),
        reading("d1", 5_000, Some(31.0)),
        reading("d2", 6_000, None),
        reading("d1", 11_000, Some(28.0)),
    ];
    for json in &readings {
        engine.emit_json(json).unwrap();
    }
    engine.stop().await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.records_received, 7);
    assert_eq!(stats.records_filtered, 1);
    assert_eq!(stats.records_windowed, 6);

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);

    let first = &batches[0];
    assert_eq!(first.window, Some((0, 10_000)));
    assert_eq!(first.rows.len(), 2);
    let row_for = |device: &str| {
        first
            .rows
            .iter()
            .find(|r| r["device_id"] == FieldValue::String(device.to_string()))
            .unwrap()
    };

    let d1 = row_for("d1");
    assert_eq!(d1["location"], FieldValue::String("hall-d1".to_string()));
    assert!((d1["avg_temp"].as_f64().unwrap() - 91.0 / 3.0).abs() < 1e-9);
    assert_eq!(d1["max_temp"].as_f64(), Some(35.0));
    assert_eq!(d1["hot_readings"].as_f64(), Some(2.0));
    assert_eq!(d1["status"], FieldValue::String("alert".to_string()));

    let d2 = row_for("d2");
    assert_eq!(d2["avg_temp"].as_f64(), Some(21.0));
    assert_eq!(d2["hot_readings"].as_f64(), Some(0.0));
    assert_eq!(d2["status"], FieldValue::String("normal".to_string()));

    let second = &batches[1];
    assert_eq!(second.window, Some((10_000, 20_000)));
    assert_eq!(second.rows.len(), 1);
    assert_eq!(second.rows[0]["max_temp"].as_f64(), Some(28.0));
}

#[tokio::test]
async fn test_distinct_and_limit_per_window() {
    init_logging();
    for (sql, expected_rows) in [
        (
            "SELECT DISTINCT COUNT(*) AS n FROM sensors \
             GROUP BY device_id, TumblingWindow('10s') WITH (TIMESTAMP='ts')",
            1,
        ),
        (
            "SELECT device_id, COUNT(*) AS n FROM sensors \
             GROUP BY device_id, TumblingWindow('10s') LIMIT 2 WITH (TIMESTAMP='ts')",
            2,
        ),
    ] {
        let (engine, _clock) = manual_engine(0);
        let batches = collect_batches(&engine);
        engine.execute(sql).unwrap();
        for device in ["a", "b", "c"] {
            engine.emit_json(&reading(device, 1_000, Some(1.0))).unwrap();
        }
        engine.stop().await.unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1, "{}", sql);
        assert_eq!(batches[0].rows.len(), expected_rows, "{}", sql);
    }
}
