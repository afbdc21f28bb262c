//! Tests for the streaming SELECT parser

use std::time::Duration;
use velostream_edge::velostream::sql::ast::{Expr, LiteralValue, SelectField, WindowSpec};
use velostream_edge::velostream::sql::parser::parse_duration;
use velostream_edge::velostream::sql::{SqlError, StreamingSqlParser};

fn parse(sql: &str) -> velostream_edge::velostream::sql::StreamingQuery {
    StreamingSqlParser::new()
        .parse(sql)
        .unwrap_or_else(|e| panic!("failed to parse '{}': {}", sql, e))
}

#[test]
fn test_parse_full_windowed_query() {
    let query = parse(
        "SELECT DISTINCT device_id, AVG(temperature) AS avg_temp \
         FROM sensors \
         WHERE temperature IS NOT NULL \
         GROUP BY device_id, TumblingWindow('5s') \
         HAVING avg_temp > 20 \
         LIMIT 10 \
         WITH (TIMESTAMP='ts', TIMEUNIT='ms');",
    );

    assert!(query.distinct);
    assert_eq!(query.from, "sensors");
    assert_eq!(query.fields.len(), 2);
    assert_eq!(query.fields[0].output_name(), "device_id");
    assert_eq!(query.fields[1].output_name(), "avg_temp");
    assert!(query.where_clause.is_some());
    assert_eq!(query.group_by, vec![Expr::Column("device_id".to_string())]);
    assert_eq!(
        query.window,
        Some(WindowSpec::Tumbling {
            size: Duration::from_secs(5)
        })
    );
    assert!(query.having.is_some());
    assert_eq!(query.limit, Some(10));
    assert_eq!(query.timestamp_field(), Some("ts"));
    assert_eq!(query.time_unit(), Some("ms"));
}

#[test]
fn test_parse_window_constructors() {
    let sliding = parse("SELECT COUNT(*) FROM s GROUP BY SlidingWindow('30s', '10s')");
    assert_eq!(
        sliding.window,
        Some(WindowSpec::Sliding {
            size: Duration::from_secs(30),
            slide: Duration::from_secs(10),
        })
    );

    let counting = parse("SELECT COUNT(*) FROM s GROUP BY CountingWindow(100)");
    assert_eq!(counting.window, Some(WindowSpec::Counting { count: 100 }));
    assert!(counting.group_by.is_empty());

    let session = parse("SELECT COUNT(*) FROM s GROUP BY user_id, SessionWindow('5m')");
    assert_eq!(
        session.window,
        Some(WindowSpec::Session {
            gap: Duration::from_secs(300)
        })
    );
    assert_eq!(session.group_by.len(), 1);
}

#[test]
fn test_second_window_is_rejected() {
    let result = StreamingSqlParser::new()
        .parse("SELECT COUNT(*) FROM s GROUP BY TumblingWindow('1s'), CountingWindow(5)");
    assert!(matches!(result, Err(SqlError::ValidationError { .. })));
}

#[test]
fn test_parse_wildcard_and_searched_case() {
    let query = parse("SELECT * FROM events");
    assert_eq!(query.fields, vec![SelectField::Wildcard]);

    let query = parse("SELECT CASE WHEN temperature > 30 THEN 'hot' ELSE 'ok' END AS band FROM s");
    match &query.fields[0] {
        SelectField::Expression {
            expr: Expr::Case {
                operand,
                when_clauses,
                else_clause,
            },
            alias,
        } => {
            assert!(operand.is_none());
            assert_eq!(when_clauses.len(), 1);
            assert_eq!(
                else_clause.as_deref(),
                Some(&Expr::Literal(LiteralValue::String("ok".to_string())))
            );
            assert_eq!(alias.as_deref(), Some("band"));
        }
        other => panic!("expected CASE, got {:?}", other),
    }
}

#[test]
fn test_parse_errors() {
    let parser = StreamingSqlParser::new();
    assert!(matches!(
        parser.parse("SELECT FROM sensors"),
        Err(SqlError::ParseError { .. })
    ));
    assert!(parser.parse("SELECT a FROM").is_err());
    assert!(parser.parse("SELECT a FROM s WHERE (a > 1").is_err());
}

#[test]
fn test_parse_durations() {
    assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3_600));
    assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("fast").is_err());
}
