//! Core streaming SQL data types.
//!
//! This module contains the fundamental data types used throughout the engine:
//! - [`FieldValue`] - The dynamically typed value every expression consumes and produces
//! - [`StreamRecord`] - One incoming event, a mapping from field name to value
//! - [`ResultRow`] / [`ResultBatch`] - What the pipeline hands to sinks

use crate::velostream::sql::error::SqlError;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value in a record field or an expression result.
///
/// Integer and Float are both numbers; arithmetic between them promotes to Float.
/// `Null` is a first-class value, distinct from a missing key.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value (true/false)
    Boolean(bool),
    /// SQL NULL value
    Null,
    /// Ordered list of values
    Array(Vec<FieldValue>),
    /// Nested record
    Map(HashMap<String, FieldValue>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            FieldValue::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, map[k])?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Hash implementation so values can be used inside group keys.
///
/// Floats hash by bit pattern with every NaN folded into one; maps hash in sorted
/// key order.
impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            FieldValue::Integer(i) => i.hash(state),
            FieldValue::Float(f) => float_key_bits(*f).hash(state),
            FieldValue::String(s) => s.hash(state),
            FieldValue::Boolean(b) => b.hash(state),
            FieldValue::Null => {}
            FieldValue::Array(arr) => {
                arr.len().hash(state);
                for elem in arr {
                    elem.hash(state);
                }
            }
            FieldValue::Map(map) => {
                let mut entries: Vec<(&String, &FieldValue)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                entries.len().hash(state);
                for (key, value) in entries {
                    key.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

fn float_key_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl FieldValue {
    /// Equality consistent with `Hash`: floats compare by bit pattern, so NaN
    /// matches NaN. Used for group keys and DISTINCT.
    pub fn key_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Float(a), FieldValue::Float(b)) => {
                float_key_bits(*a) == float_key_bits(*b)
            }
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.key_eq(y))
            }
            (FieldValue::Map(a), FieldValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.key_eq(other)))
            }
            _ => self == other,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for elem in arr {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
            FieldValue::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

/// JSON numbers map to Integer or Float, objects to Map, arrays to Array.
impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON value (string, number, bool, null, array, or object)")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Boolean(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v <= i64::MAX as u64 {
            Ok(FieldValue::Integer(v as i64))
        } else {
            Ok(FieldValue::Float(v as f64))
        }
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::String(v))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Null)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(FieldValue::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut arr = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(elem) = seq.next_element()? {
            arr.push(elem);
        }
        Ok(FieldValue::Array(arr))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = HashMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry()? {
            fields.insert(key, value);
        }
        Ok(FieldValue::Map(fields))
    }
}

impl FieldValue {
    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::String(_) => "STRING",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Null => "NULL",
            FieldValue::Array(_) => "ARRAY",
            FieldValue::Map(_) => "MAP",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// True for Integer and Float (not numeric strings).
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Float(_))
    }

    /// Numeric view of the value, coercing numeric-looking strings.
    ///
    /// Returns `None` for NULL, booleans, containers and non-numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Coerce to a number for arithmetic, keeping integers integral.
    ///
    /// Numeric strings become Integer when they parse as one, Float otherwise.
    pub fn to_number(&self) -> Result<FieldValue, SqlError> {
        match self {
            FieldValue::Integer(_) | FieldValue::Float(_) => Ok(self.clone()),
            FieldValue::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Ok(FieldValue::Integer(i))
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    Ok(FieldValue::Float(f))
                } else {
                    Err(SqlError::type_error(
                        "number",
                        "non-numeric string",
                        Some(s.clone()),
                    ))
                }
            }
            other => Err(SqlError::type_error(
                "number",
                other.type_name(),
                Some(other.to_string()),
            )),
        }
    }

    /// Convert to a display string suitable for output.
    pub fn to_display_string(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Boolean(b) => serde_json::Value::Bool(*b),
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Add two values. NULL on either side yields NULL.
    pub fn add(&self, other: &FieldValue) -> Result<FieldValue, SqlError> {
        self.numeric_op(other, "+", |a, b| a.checked_add(b), |a, b| a + b)
    }

    /// Subtract two values. NULL on either side yields NULL.
    pub fn subtract(&self, other: &FieldValue) -> Result<FieldValue, SqlError> {
        self.numeric_op(other, "-", |a, b| a.checked_sub(b), |a, b| a - b)
    }

    /// Multiply two values. NULL on either side yields NULL.
    pub fn multiply(&self, other: &FieldValue) -> Result<FieldValue, SqlError> {
        self.numeric_op(other, "*", |a, b| a.checked_mul(b), |a, b| a * b)
    }

    /// Divide two values. Division always produces a Float; dividing by zero is an error.
    pub fn divide(&self, other: &FieldValue) -> Result<FieldValue, SqlError> {
        if self.is_null() || other.is_null() {
            return Ok(FieldValue::Null);
        }
        let left = self.to_number()?;
        let right = other.to_number()?;
        let divisor = right.as_f64().unwrap_or(0.0);
        if divisor == 0.0 {
            return Err(SqlError::execution_error("Division by zero", None));
        }
        Ok(FieldValue::Float(left.as_f64().unwrap_or(0.0) / divisor))
    }

    /// Remainder of two values; integers stay integral.
    pub fn modulo(&self, other: &FieldValue) -> Result<FieldValue, SqlError> {
        if self.is_null() || other.is_null() {
            return Ok(FieldValue::Null);
        }
        match (self.to_number()?, other.to_number()?) {
            (_, FieldValue::Integer(0)) => {
                Err(SqlError::execution_error("Modulo by zero", None))
            }
            (FieldValue::Integer(a), FieldValue::Integer(b)) => match a.checked_rem(b) {
                Some(result) => Ok(FieldValue::Integer(result)),
                None => Ok(FieldValue::Float(a as f64 % b as f64)),
            },
            (a, b) => {
                let divisor = b.as_f64().unwrap_or(0.0);
                if divisor == 0.0 {
                    return Err(SqlError::execution_error("Modulo by zero", None));
                }
                Ok(FieldValue::Float(a.as_f64().unwrap_or(0.0) % divisor))
            }
        }
    }

    /// Arithmetic negation.
    pub fn negate(&self) -> Result<FieldValue, SqlError> {
        match self.to_number() {
            Ok(FieldValue::Integer(i)) => Ok(i
                .checked_neg()
                .map_or(FieldValue::Float(-(i as f64)), FieldValue::Integer)),
            Ok(FieldValue::Float(f)) => Ok(FieldValue::Float(-f)),
            _ if self.is_null() => Ok(FieldValue::Null),
            Ok(other) => Err(SqlError::type_error(
                "number",
                other.type_name(),
                Some(other.to_string()),
            )),
            Err(e) => Err(e),
        }
    }

    fn numeric_op(
        &self,
        other: &FieldValue,
        op: &str,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<FieldValue, SqlError> {
        if self.is_null() || other.is_null() {
            return Ok(FieldValue::Null);
        }
        let left = self.to_number().map_err(|_| operand_error(op, self, other))?;
        let right = other.to_number().map_err(|_| operand_error(op, self, other))?;
        match (left, right) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => match int_op(a, b) {
                Some(result) => Ok(FieldValue::Integer(result)),
                None => Ok(FieldValue::Float(float_op(a as f64, b as f64))),
            },
            (a, b) => Ok(FieldValue::Float(float_op(
                a.as_f64().unwrap_or(0.0),
                b.as_f64().unwrap_or(0.0),
            ))),
        }
    }

    /// Ordering between two non-null values.
    ///
    /// Numbers (and numeric strings paired with a number) compare numerically, two
    /// strings compare lexically, booleans compare false < true. Any other pairing
    /// is a type error. Callers handle NULL before calling.
    pub fn compare(&self, other: &FieldValue) -> Result<Ordering, SqlError> {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => Ok(a.cmp(b)),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => Ok(a.cmp(b)),
            (a, b) if a.is_numeric() || b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
                    SqlError::type_error("comparable numbers", "NaN", Some(format!("{}", x)))
                }),
                _ => Err(SqlError::type_error(
                    format!("value comparable with {}", a.type_name()),
                    b.type_name(),
                    Some(b.to_string()),
                )),
            },
            (a, b) => Err(SqlError::type_error(
                format!("value comparable with {}", a.type_name()),
                b.type_name(),
                Some(b.to_string()),
            )),
        }
    }

    /// SQL equality between two non-null values.
    ///
    /// Number against numeric string compares numerically; otherwise mismatched
    /// types are simply unequal.
    pub fn sql_equals(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.sql_equals(y))
            }
            (FieldValue::Map(a), FieldValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.sql_equals(other)))
            }
            (a, b) if a.is_numeric() || b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
            _ => false,
        }
    }
}

fn operand_error(op: &str, left: &FieldValue, right: &FieldValue) -> SqlError {
    SqlError::type_error(
        format!("numeric operands for '{}'", op),
        format!("{} and {}", left.type_name(), right.type_name()),
        Some(format!("{} {} {}", left, op, right)),
    )
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

/// A record in the stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRecord {
    /// The actual field data for this record
    pub fields: HashMap<String, FieldValue>,
    /// Ingestion timestamp (milliseconds since epoch, 0 when unset)
    pub timestamp: i64,
}

impl StreamRecord {
    pub fn new(fields: HashMap<String, FieldValue>) -> Self {
        Self {
            fields,
            timestamp: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build a record from a JSON object. Non-object JSON is rejected.
    pub fn from_json(json: &str) -> Result<Self, SqlError> {
        let value: FieldValue = serde_json::from_str(json)
            .map_err(|e| SqlError::execution_error(format!("Invalid JSON record: {}", e), None))?;
        match value {
            FieldValue::Map(fields) => Ok(Self::new(fields)),
            other => Err(SqlError::type_error(
                "JSON object",
                other.type_name(),
                Some(other.to_string()),
            )),
        }
    }

    /// Resolve a possibly dotted field path.
    ///
    /// An exact key match wins (field names may contain dots); otherwise the path is
    /// walked through nested maps. A missing segment or a non-map intermediate yields
    /// `Null`, never an error.
    pub fn get_path(&self, path: &str) -> FieldValue {
        if let Some(value) = self.fields.get(path) {
            return value.clone();
        }
        if !path.contains('.') {
            return FieldValue::Null;
        }

        let mut segments = path.split('.');
        let mut current = match segments.next().and_then(|first| self.fields.get(first)) {
            Some(value) => value,
            None => return FieldValue::Null,
        };
        for segment in segments {
            match current {
                FieldValue::Map(map) => match map.get(segment) {
                    Some(next) => current = next,
                    None => return FieldValue::Null,
                },
                _ => return FieldValue::Null,
            }
        }
        current.clone()
    }

}

impl From<HashMap<String, FieldValue>> for StreamRecord {
    fn from(fields: HashMap<String, FieldValue>) -> Self {
        StreamRecord::new(fields)
    }
}

impl fmt::Display for StreamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamRecord {{ ")?;
        let mut keys: Vec<&String> = self.fields.keys().collect();
        keys.sort();
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, self.fields[key])?;
        }
        write!(f, " }}")
    }
}

/// One output row: column alias to value.
pub type ResultRow = HashMap<String, FieldValue>;

/// Rows produced by one window fire (or one projected record).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultBatch {
    pub rows: Vec<ResultRow>,
    /// `(start, end)` in epoch milliseconds for windowed results
    pub window: Option<(i64, i64)>,
}

impl ResultBatch {
    pub fn new(rows: Vec<ResultRow>, window: Option<(i64, i64)>) -> Self {
        Self { rows, window }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
