//! Tests for runtime function registration and lookup

use crate::common::create_test_record;
use std::sync::Arc;
use velostream_edge::velostream::sql::SqlError;
use velostream_edge::velostream::sql::execution::aggregation::Accumulator;
use velostream_edge::velostream::sql::execution::expression::{Arity, Expression, FunctionRegistry};
use velostream_edge::velostream::sql::execution::types::FieldValue;

/// Difference between the largest and smallest numeric input.
#[derive(Default)]
struct SpreadAccumulator {
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator for SpreadAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        let v = value
            .as_f64()
            .ok_or_else(|| SqlError::type_error("number", value.type_name(), None))?;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
        Ok(())
    }

    fn result(&self) -> FieldValue {
        match (self.min, self.max) {
            (Some(min), Some(max)) => FieldValue::Float(max - min),
            _ => FieldValue::Null,
        }
    }
}

#[test]
fn test_builtins_are_registered() {
    let registry = FunctionRegistry::global();
    for name in ["ABS", "upper", "Coalesce", "COUNT", "percentile", "STDDEV"] {
        assert!(registry.contains(name), "{} should be registered", name);
    }
    assert!(registry.is_aggregate("sum"));
    assert!(!registry.is_aggregate("ABS"));
    assert!(registry.lookup("LENGTH").is_some());
    assert!(registry.lookup_aggregate("AVG").is_some());
}

#[test]
fn test_builtin_scalar_evaluation() {
    let record = create_test_record(vec![
        ("name", FieldValue::String("pump".to_string())),
        ("missing_reading", FieldValue::Null),
        ("t", FieldValue::Float(-2.5)),
    ]);
    let eval = |text: &str| {
        Expression::compile(text, FunctionRegistry::global())
            .unwrap()
            .evaluate(&record)
            .unwrap()
    };
    assert_eq!(eval("UPPER(name)"), FieldValue::String("PUMP".to_string()));
    assert_eq!(eval("LENGTH(name)"), FieldValue::Integer(4));
    assert_eq!(eval("ABS(t)"), FieldValue::Float(2.5));
    assert_eq!(eval("COALESCE(missing_reading, 0)"), FieldValue::Integer(0));
    assert_eq!(eval("ROUND(3.14159, 2)"), FieldValue::Float(3.14));
}

#[test]
fn test_lookup_happens_at_evaluation_time() {
    let registry = Arc::new(FunctionRegistry::new());
    let expr = Expression::compile("DOUBLE_IT(x) + 1", Arc::clone(&registry)).unwrap();
    let record = create_test_record(vec![("x", FieldValue::Integer(2))]);

    assert!(matches!(
        expr.evaluate(&record),
        Err(SqlError::UnknownFunction { .. })
    ));

    registry
        .register_scalar("double_it", Arity::exact(1), |args| {
            args[0].multiply(&FieldValue::Integer(2))
        })
        .unwrap();
    assert_eq!(expr.evaluate(&record).unwrap(), FieldValue::Integer(5));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let registry = FunctionRegistry::with_builtins();
    let result = registry.register_scalar("abs", Arity::exact(1), |args| Ok(args[0].clone()));
    assert!(matches!(result, Err(SqlError::ConfigurationError { .. })));

    let result = registry.register_aggregate("SUM", Arity::exact(1), |_| {
        Ok(Box::new(SpreadAccumulator::default()) as Box<dyn Accumulator>)
    });
    assert!(matches!(result, Err(SqlError::ConfigurationError { .. })));
}

#[test]
fn test_arity_is_checked() {
    let registry = FunctionRegistry::global();
    assert!(registry.check_arity("ABS", 1).is_ok());
    assert!(registry.check_arity("ABS", 2).is_err());
    assert!(registry.check_arity("COUNT", 0).is_ok());
    assert!(matches!(
        registry.check_arity("NOPE", 1),
        Err(SqlError::UnknownFunction { .. })
    ));
}

#[test]
fn test_user_defined_aggregate_factory() {
    let registry = FunctionRegistry::with_builtins();
    registry
        .register_aggregate("SPREAD", Arity::exact(1), |_| {
            Ok(Box::new(SpreadAccumulator::default()) as Box<dyn Accumulator>)
        })
        .unwrap();
    assert!(registry.is_aggregate("spread"));

    let entry = registry.lookup_aggregate("SPREAD").unwrap();
    let mut acc = entry.create(&[]).unwrap();
    for v in [3.0, 9.5, -1.0] {
        acc.add(&FieldValue::Float(v)).unwrap();
    }
    assert_eq!(acc.result(), FieldValue::Float(10.5));
}
