//! CASE evaluation, NULL propagation, field extraction and delegated expressions

use crate::common::create_test_record;
use std::collections::BTreeSet;
use velostream_edge::velostream::sql::SqlError;
use velostream_edge::velostream::sql::execution::expression::{Expression, FunctionRegistry};
use velostream_edge::velostream::sql::execution::types::FieldValue;

fn compile(text: &str) -> Expression {
    Expression::compile(text, FunctionRegistry::global())
        .unwrap_or_else(|e| panic!("failed to compile '{}': {}", text, e))
}

fn temperature(t: f64) -> velostream_edge::StreamRecord {
    create_test_record(vec![("temperature", FieldValue::Float(t))])
}

fn status(s: &str) -> velostream_edge::StreamRecord {
    create_test_record(vec![("status", FieldValue::String(s.to_string()))])
}

#[test]
fn test_searched_case_thresholds() {
    let expr = compile("CASE WHEN temperature > 30 THEN 1 ELSE 0 END");
    assert_eq!(expr.evaluate(&temperature(35.0)).unwrap().as_f64(), Some(1.0));

    let expr = compile("CASE WHEN temperature > 50 THEN 1 ELSE 0 END");
    assert_eq!(expr.evaluate(&temperature(25.5)).unwrap().as_f64(), Some(0.0));
}

#[test]
fn test_simple_case_on_strings() {
    let expr = compile("CASE status WHEN 'active' THEN 1 WHEN 'inactive' THEN 0 ELSE -1 END");
    assert_eq!(expr.evaluate(&status("active")).unwrap().as_f64(), Some(1.0));
    assert_eq!(expr.evaluate(&status("inactive")).unwrap().as_f64(), Some(0.0));
    assert_eq!(expr.evaluate(&status("unknown")).unwrap().as_f64(), Some(-1.0));
}

#[test]
fn test_first_matching_branch_wins() {
    let expr = compile(
        "CASE WHEN temperature > 10 THEN 'warm' WHEN temperature > 30 THEN 'hot' ELSE 'cold' END",
    );
    assert_eq!(
        expr.evaluate(&temperature(40.0)).unwrap(),
        FieldValue::String("warm".to_string())
    );
}

#[test]
fn test_case_without_else_yields_null() {
    let expr = compile("CASE WHEN temperature > 30 THEN temperature END");
    assert_eq!(expr.evaluate(&temperature(20.0)).unwrap(), FieldValue::Null);
}

#[test]
fn test_numeric_comparison_across_types() {
    let record = create_test_record(vec![
        ("a", FieldValue::Integer(9)),
        ("b", FieldValue::Float(10.5)),
    ]);
    assert!(compile("a < b").evaluate_predicate(&record).unwrap());
    assert!(compile("b > 9").evaluate_predicate(&record).unwrap());
}

#[test]
fn test_null_propagation() {
    let record = create_test_record(vec![("a", FieldValue::Null), ("b", FieldValue::Integer(2))]);
    assert_eq!(compile("a + b").evaluate(&record).unwrap(), FieldValue::Null);
    assert_eq!(compile("a > b").evaluate(&record).unwrap(), FieldValue::Null);
    assert_eq!(compile("missing * 2").evaluate(&record).unwrap(), FieldValue::Null);
    assert_eq!(
        compile("a IS NULL").evaluate(&record).unwrap(),
        FieldValue::Boolean(true)
    );
    assert_eq!(
        compile("b IS NOT NULL").evaluate(&record).unwrap(),
        FieldValue::Boolean(true)
    );
    assert!(!compile("a > b").evaluate_predicate(&record).unwrap());
}

#[test]
fn test_not_requires_boolean() {
    let record = create_test_record(vec![("s", FieldValue::String("text".to_string()))]);
    assert!(compile("NOT s").evaluate(&record).is_err());
    assert_eq!(
        compile("NOT (1 > 2)").evaluate(&record).unwrap(),
        FieldValue::Boolean(true)
    );
}

#[test]
fn test_short_circuit_skips_failing_operand() {
    let record = create_test_record(vec![("x", FieldValue::Integer(0))]);
    // The division would fail if evaluated.
    assert!(!compile("x > 0 AND 10 / x > 1").evaluate_predicate(&record).unwrap());
    assert!(compile("x = 0 OR 10 / x > 1").evaluate_predicate(&record).unwrap());
}

#[test]
fn test_fields_extraction() {
    let expr = compile("CASE WHEN ABS(temperature) > 30 THEN device_id ELSE location END");
    let expected: BTreeSet<String> = ["temperature", "device_id", "location"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(expr.fields(), expected);
}

#[test]
fn test_evaluation_is_idempotent() {
    let expr = compile("CASE WHEN temperature > 30 THEN temperature * 2 ELSE NULL END");
    let record = temperature(31.0);
    let first = expr.evaluate(&record).unwrap();
    let second = expr.evaluate(&record).unwrap();
    assert_eq!(first, second);
    assert_eq!(record.fields.len(), 1);
}

#[test]
fn test_nested_case_is_delegated() {
    let text = "CASE WHEN temperature > 30 THEN \
                CASE WHEN temperature > 40 THEN 'extreme' ELSE 'hot' END \
                ELSE device_id END";
    let expr = compile(text);
    assert!(expr.is_delegated());
    assert_eq!(expr.text(), text);

    let record = create_test_record(vec![
        ("temperature", FieldValue::Float(45.0)),
        ("device_id", FieldValue::String("d1".to_string())),
    ]);
    assert_eq!(
        expr.evaluate(&record).unwrap(),
        FieldValue::String("extreme".to_string())
    );
    let expected: BTreeSet<String> = ["temperature", "device_id"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(expr.fields(), expected);
}

#[test]
fn test_delegated_errors_propagate() {
    let expr = compile(
        "CASE WHEN temperature > 30 THEN CASE WHEN 1 / 0 > 1 THEN 1 ELSE 2 END ELSE 0 END",
    );
    assert!(expr.is_delegated());
    assert!(expr.evaluate(&temperature(35.0)).is_err());
    assert_eq!(expr.evaluate(&temperature(20.0)).unwrap().as_f64(), Some(0.0));
}

#[test]
fn test_unknown_function_names_the_function() {
    let expr = compile("NO_SUCH_FN(temperature)");
    match expr.evaluate(&temperature(1.0)) {
        Err(SqlError::UnknownFunction { name }) => assert_eq!(name, "NO_SUCH_FN"),
        other => panic!("expected unknown function error, got {:?}", other),
    }
}

#[test]
fn test_operators() {
    let record = create_test_record(vec![
        ("name", FieldValue::String("sensor-12".to_string())),
        ("v", FieldValue::Integer(7)),
    ]);
    assert!(compile("name LIKE 'sensor-%'").evaluate_predicate(&record).unwrap());
    assert!(compile("name NOT LIKE 'pump_%'").evaluate_predicate(&record).unwrap());
    assert!(compile("v IN (1, 7, 9)").evaluate_predicate(&record).unwrap());
    assert!(compile("v BETWEEN 5 AND 10").evaluate_predicate(&record).unwrap());
    assert_eq!(
        compile("name || '-x'").evaluate(&record).unwrap(),
        FieldValue::String("sensor-12-x".to_string())
    );
    assert_eq!(compile("v % 4").evaluate(&record).unwrap(), FieldValue::Integer(3));
    assert!(compile("v / 0").evaluate(&record).is_err());
}

#[test]
fn test_nested_field_paths() {
    let record = velostream_edge::StreamRecord::from_json(
        r#"{"device": {"info": {"name": "pump"}}, "v": 1}"#,
    )
    .unwrap();
    assert_eq!(
        compile("device.info.name").evaluate(&record).unwrap(),
        FieldValue::String("pump".to_string())
    );
}

#[test]
fn test_integer_overflow_does_not_panic() {
    let record = create_test_record(vec![("a", FieldValue::Integer(i64::MIN))]);
    assert_eq!(compile("a % -1").evaluate(&record).unwrap().as_f64(), Some(0.0));
    assert_eq!(compile("MOD(a, -1)").evaluate(&record).unwrap().as_f64(), Some(0.0));
    assert_eq!(
        compile("-a").evaluate(&record).unwrap(),
        FieldValue::Float(-(i64::MIN as f64))
    );
    assert!(compile("-a > 0").evaluate_predicate(&record).unwrap());
}
