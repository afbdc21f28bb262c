//! Incremental accumulators for aggregate functions.
//!
//! One accumulator holds the state of one aggregate over one (group, window).
//! The aggregator never passes NULL to [`Accumulator::add`]; NULL inputs are
//! skipped before folding, which gives SQL NULL-skipping semantics to every
//! accumulator, user-defined ones included.

use super::compute::{
    WelfordState, compute_avg_from_welford, compute_percentile_from_values,
    compute_stddev_from_welford, compute_variance_from_welford, field_value_to_f64, float_or_null,
};
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::types::FieldValue;
use std::cmp::Ordering;

/// Incremental state for one aggregate.
pub trait Accumulator: Send + Sync {
    /// Fold one non-null input value.
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError>;

    /// Current aggregate value. Called once when the window fires.
    fn result(&self) -> FieldValue;
}

/// COUNT: number of non-null inputs, reported as a Float.
#[derive(Debug, Default)]
pub struct CountAccumulator {
    count: u64,
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, _value: &FieldValue) -> Result<(), SqlError> {
        self.count += 1;
        Ok(())
    }

    fn result(&self) -> FieldValue {
        FieldValue::Float(self.count as f64)
    }
}

#[derive(Debug, Default)]
pub struct SumAccumulator {
    sum: f64,
    seen: bool,
}

impl Accumulator for SumAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        self.sum += field_value_to_f64(value)?;
        self.seen = true;
        Ok(())
    }

    fn result(&self) -> FieldValue {
        if self.seen {
            FieldValue::Float(self.sum)
        } else {
            FieldValue::Null
        }
    }
}

#[derive(Debug, Default)]
pub struct AvgAccumulator {
    state: WelfordState,
}

impl Accumulator for AvgAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        self.state.update(field_value_to_f64(value)?);
        Ok(())
    }

    fn result(&self) -> FieldValue {
        float_or_null(compute_avg_from_welford(&self.state))
    }
}

/// MIN or MAX. Numbers compare numerically and report as Float; strings compare lexically.
#[derive(Debug)]
pub struct ExtremumAccumulator {
    keep: Ordering,
    current: Option<FieldValue>,
}

impl ExtremumAccumulator {
    pub fn min() -> Self {
        Self {
            keep: Ordering::Less,
            current: None,
        }
    }

    pub fn max() -> Self {
        Self {
            keep: Ordering::Greater,
            current: None,
        }
    }
}

impl Accumulator for ExtremumAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        let candidate = match value {
            FieldValue::Integer(i) => FieldValue::Float(*i as f64),
            other => other.clone(),
        };
        let replace = match &self.current {
            None => true,
            Some(current) => candidate.compare(current)? == self.keep,
        };
        if replace {
            self.current = Some(candidate);
        }
        Ok(())
    }

    fn result(&self) -> FieldValue {
        self.current.clone().unwrap_or(FieldValue::Null)
    }
}

/// STDDEV / VARIANCE family over a Welford state.
#[derive(Debug)]
pub struct DispersionAccumulator {
    state: WelfordState,
    sample: bool,
    stddev: bool,
}

impl DispersionAccumulator {
    pub fn new(sample: bool, stddev: bool) -> Self {
        Self {
            state: WelfordState::new(),
            sample,
            stddev,
        }
    }
}

impl Accumulator for DispersionAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        self.state.update(field_value_to_f64(value)?);
        Ok(())
    }

    fn result(&self) -> FieldValue {
        let value = if self.stddev {
            compute_stddev_from_welford(&self.state, self.sample)
        } else {
            compute_variance_from_welford(&self.state, self.sample)
        };
        float_or_null(value)
    }
}

/// MEDIAN and PERCENTILE buffer their inputs until the window fires.
#[derive(Debug)]
pub struct PercentileAccumulator {
    values: Vec<f64>,
    percentile: f64,
}

impl PercentileAccumulator {
    pub fn new(percentile: f64) -> Self {
        Self {
            values: Vec::new(),
            percentile,
        }
    }
}

impl Accumulator for PercentileAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        self.values.push(field_value_to_f64(value)?);
        Ok(())
    }

    fn result(&self) -> FieldValue {
        float_or_null(compute_percentile_from_values(&self.values, self.percentile))
    }
}

/// COLLECT: all non-null inputs in arrival order.
#[derive(Debug, Default)]
pub struct CollectAccumulator {
    values: Vec<FieldValue>,
}

impl Accumulator for CollectAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        self.values.push(value.clone());
        Ok(())
    }

    fn result(&self) -> FieldValue {
        if self.values.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Array(self.values.clone())
        }
    }
}

/// FIRST_VALUE / LAST_VALUE by arrival order.
#[derive(Debug)]
pub struct PositionalAccumulator {
    keep_first: bool,
    value: Option<FieldValue>,
}

impl PositionalAccumulator {
    pub fn first() -> Self {
        Self {
            keep_first: true,
            value: None,
        }
    }

    pub fn last() -> Self {
        Self {
            keep_first: false,
            value: None,
        }
    }
}

impl Accumulator for PositionalAccumulator {
    fn add(&mut self, value: &FieldValue) -> Result<(), SqlError> {
        if !self.keep_first || self.value.is_none() {
            self.value = Some(value.clone());
        }
        Ok(())
    }

    fn result(&self) -> FieldValue {
        self.value.clone().unwrap_or(FieldValue::Null)
    }
}
