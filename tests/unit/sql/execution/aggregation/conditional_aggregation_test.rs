//! Conditional aggregation: CASE inside aggregates with SQL NULL skipping

use crate::common::{all_rows, collect_batches, init_logging, sensor_record};
use velostream_edge::velostream::sql::execution::types::FieldValue;
use velostream_edge::{EngineConfig, StreamExecutionEngine};

async fn run(
    sql: &str,
    temperatures: &[f64],
) -> Vec<std::collections::HashMap<String, FieldValue>> {
    init_logging();
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let batches = collect_batches(&engine);
    engine.execute(sql).unwrap();
    for &t in temperatures {
        engine.emit(sensor_record("d1", t)).unwrap();
    }
    engine.stop().await.unwrap();
    all_rows(&batches)
}

#[tokio::test]
async fn test_case_null_branches_are_skipped() {
    let rows = run(
        "SELECT SUM(CASE WHEN temperature > 30 THEN temperature ELSE NULL END) AS hot_sum, \
                COUNT(CASE WHEN temperature > 30 THEN 1 ELSE NULL END) AS hot_count, \
                AVG(CASE WHEN temperature > 30 THEN temperature ELSE NULL END) AS hot_avg \
         FROM sensors GROUP BY CountingWindow(3)",
        &[35.0, 25.0, 32.0],
    )
    .await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["hot_sum"].as_f64(), Some(67.0));
    assert_eq!(rows[0]["hot_count"].as_f64(), Some(2.0));
    assert_eq!(rows[0]["hot_avg"].as_f64(), Some(33.5));
}

#[tokio::test]
async fn test_all_null_branches() {
    let rows = run(
        "SELECT SUM(CASE WHEN temperature > 100 THEN temperature ELSE NULL END) AS s, \
                AVG(CASE WHEN temperature > 100 THEN temperature ELSE NULL END) AS a, \
                COUNT(CASE WHEN temperature > 100 THEN 1 ELSE NULL END) AS c, \
                COUNT(*) AS total \
         FROM sensors GROUP BY CountingWindow(4)",
        &[20.0, 30.0, 40.0, 50.0],
    )
    .await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["s"], FieldValue::Null);
    assert_eq!(rows[0]["a"], FieldValue::Null);
    assert_eq!(rows[0]["c"].as_f64(), Some(0.0));
    assert_eq!(rows[0]["total"].as_f64(), Some(4.0));
}

#[tokio::test]
async fn test_shared_aggregate_in_expressions() {
    let rows = run(
        "SELECT MAX(temperature) - MIN(temperature) AS spread, \
                SUM(temperature) / COUNT(*) AS mean, \
                AVG(temperature) AS avg_temp \
         FROM sensors GROUP BY CountingWindow(4)",
        &[10.0, 20.0, 30.0, 40.0],
    )
    .await;

    assert_eq!(rows[0]["spread"].as_f64(), Some(30.0));
    assert_eq!(rows[0]["mean"].as_f64(), Some(25.0));
    assert_eq!(rows[0]["avg_temp"].as_f64(), Some(25.0));
}

#[tokio::test]
async fn test_statistical_aggregates() {
    let rows = run(
        "SELECT STDDEV_POP(temperature) AS sd, VAR_POP(temperature) AS var, \
                MEDIAN(temperature) AS med, PERCENTILE(temperature, 1.0) AS p100 \
         FROM sensors GROUP BY CountingWindow(4)",
        &[2.0, 4.0, 4.0, 6.0],
    )
    .await;

    let var = rows[0]["var"].as_f64().unwrap();
    assert!((var - 2.0).abs() < 1e-9);
    let sd = rows[0]["sd"].as_f64().unwrap();
    assert!((sd - 2.0_f64.sqrt()).abs() < 1e-9);
    assert_eq!(rows[0]["med"].as_f64(), Some(4.0));
    assert_eq!(rows[0]["p100"].as_f64(), Some(6.0));
}
