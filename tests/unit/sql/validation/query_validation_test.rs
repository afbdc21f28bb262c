//! Setup-time validation: invalid queries fail before any record is processed

use velostream_edge::velostream::sql::SqlError;
use velostream_edge::{EngineConfig, StreamExecutionEngine};

fn execute_err(sql: &str) -> SqlError {
    let engine = StreamExecutionEngine::new(EngineConfig::default());
    let err = engine
        .execute(sql)
        .expect_err(&format!("query should be rejected: {}", sql));
    assert!(!engine.is_running());
    err
}

#[tokio::test]
async fn test_unknown_function_is_named() {
    for sql in [
        "SELECT FROBNICATE(temperature) AS f FROM sensors",
        "SELECT temperature FROM sensors WHERE FROBNICATE(temperature) > 1",
        "SELECT COUNT(*) AS n FROM sensors GROUP BY CountingWindow(5) HAVING FROBNICATE(n) > 1",
    ] {
        match execute_err(sql) {
            SqlError::ValidationError { message } => {
                assert!(message.contains("FROBNICATE"), "message: {}", message)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_aggregate_placement() {
    let rejected = [
        "SELECT temperature FROM sensors WHERE SUM(temperature) > 1 GROUP BY CountingWindow(5)",
        "SELECT SUM(temperature) AS s FROM sensors GROUP BY SUM(temperature), CountingWindow(5)",
        "SELECT SUM(MAX(temperature)) AS s FROM sensors GROUP BY CountingWindow(5)",
        "SELECT AVG(temperature) AS a FROM sensors",
        "SELECT device_id FROM sensors GROUP BY device_id",
        "SELECT * FROM sensors GROUP BY CountingWindow(5)",
    ];
    for sql in rejected {
        assert!(
            matches!(execute_err(sql), SqlError::ValidationError { .. }),
            "{}",
            sql
        );
    }
}

#[tokio::test]
async fn test_window_parameters() {
    assert!(matches!(
        execute_err("SELECT COUNT(*) AS n FROM s GROUP BY SlidingWindow('5s', '10s')"),
        SqlError::WindowError { .. }
    ));
    assert!(matches!(
        execute_err("SELECT COUNT(*) AS n FROM s GROUP BY TumblingWindow('0s')"),
        SqlError::WindowError { .. }
    ));
    execute_err("SELECT COUNT(*) AS n FROM s GROUP BY CountingWindow(0)");
    execute_err(
        "SELECT COUNT(*) AS n FROM s GROUP BY TumblingWindow('1s') \
         WITH (TIMESTAMP='ts', TIMEUNIT='fortnight')",
    );
    execute_err("SELECT COUNT(*) AS n FROM s GROUP BY TumblingWindow('1s') WITH (TIMEUNIT='ms')");
}

#[tokio::test]
async fn test_function_arguments() {
    execute_err("SELECT ABS(a, b) AS x FROM s");
    execute_err("SELECT PERCENTILE(v, 1.5) AS p FROM s GROUP BY CountingWindow(5)");
    execute_err("SELECT PERCENTILE(v, v) AS p FROM s GROUP BY CountingWindow(5)");
    execute_err("SELECT TumblingWindow('1s') AS w FROM s");
}

#[tokio::test]
async fn test_valid_queries_start() {
    for sql in [
        "SELECT * FROM sensors WHERE temperature > 30",
        "SELECT device_id, temperature * 1.8 + 32 AS temp_f FROM sensors LIMIT 5",
        "SELECT device_id, PERCENTILE(temperature, 0.95) AS p95 FROM sensors \
         GROUP BY device_id, SlidingWindow('1m', '10s')",
        "SELECT COUNT(*) AS n FROM s GROUP BY SessionWindow('30s') HAVING COUNT(*) > 1",
    ] {
        let engine = StreamExecutionEngine::new(EngineConfig::default());
        engine
            .execute(sql)
            .unwrap_or_else(|e| panic!("'{}' rejected: {}", sql, e));
        assert!(engine.is_running());
        engine.stop().await.unwrap();
    }
}
