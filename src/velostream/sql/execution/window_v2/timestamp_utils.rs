//! Timestamp Extraction Utilities for Window Strategies
//!
//! Event time comes from the field named by `WITH (TIMESTAMP='...')`, read in the
//! unit named by `TIMEUNIT` (milliseconds by default). Accepted values:
//!
//! - Integer or Float, in the configured unit
//! - numeric strings, in the configured unit
//! - RFC 3339 strings (`2024-05-01T12:00:00Z`)
//! - `%Y-%m-%d %H:%M:%S[.f]` strings, taken as UTC
//!
//! Processing time comes from a [`Clock`] so tests can drive it by hand.

use crate::velostream::sql::ast::{StreamingQuery, TimeUnit};
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::types::{FieldValue, StreamRecord};
use chrono::{DateTime, NaiveDateTime};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of processing time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Reads event time from a configured record field.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampExtractor {
    field: String,
    unit: TimeUnit,
}

impl TimestampExtractor {
    pub fn new(field: impl Into<String>, unit: TimeUnit) -> Self {
        Self {
            field: field.into(),
            unit,
        }
    }

    /// Extractor for the query's `WITH (TIMESTAMP, TIMEUNIT)` clause, if any.
    pub fn from_query(query: &StreamingQuery) -> Result<Option<Self>, SqlError> {
        let unit = match query.time_unit() {
            Some(code) => TimeUnit::parse(code).ok_or_else(|| {
                SqlError::validation_error(format!("Invalid TIMEUNIT '{}'", code))
            })?,
            None => TimeUnit::Millisecond,
        };
        Ok(query
            .timestamp_field()
            .map(|field| Self::new(field, unit)))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Event time of `record` in epoch milliseconds.
    pub fn extract(&self, record: &StreamRecord) -> Result<i64, SqlError> {
        match record.get_path(&self.field) {
            FieldValue::Integer(i) => Ok(self.unit.to_millis(i as f64) as i64),
            FieldValue::Float(f) if f.is_finite() => Ok(self.unit.to_millis(f) as i64),
            FieldValue::String(s) => self.parse_text(&s),
            FieldValue::Null => Err(SqlError::execution_error(
                format!("Time field '{}' not found in record", self.field),
                None,
            )),
            other => Err(SqlError::type_error(
                format!("timestamp in field '{}'", self.field),
                other.type_name(),
                Some(other.to_string()),
            )),
        }
    }

    fn parse_text(&self, text: &str) -> Result<i64, SqlError> {
        let text = text.trim();
        if let Ok(number) = text.parse::<f64>() {
            if number.is_finite() {
                return Ok(self.unit.to_millis(number) as i64);
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.timestamp_millis());
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(naive.and_utc().timestamp_millis());
            }
        }
        Err(SqlError::type_error(
            format!("timestamp in field '{}'", self.field),
            "unparsable string",
            Some(text.to_string()),
        ))
    }
}
