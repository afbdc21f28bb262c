//! Shared pure-function computation for aggregate math.
//!
//! Welford's online algorithm for running mean/variance, plus the order-statistic
//! helpers (median, percentile) used by the buffering accumulators.

use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::types::FieldValue;

/// Welford's online algorithm state for numerically stable running mean/variance.
///
/// Reference: Welford, B.P. (1962). "Note on a method for calculating corrected
/// sums of squares and products". Technometrics. 4 (3): 419–420.
#[derive(Debug, Clone, Default)]
pub struct WelfordState {
    pub count: u64,
    pub mean: f64,
    pub m2: f64,
}

impl WelfordState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incorporate a new value using Welford's online update.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }
}

/// Numeric view of an aggregate input; numeric strings are accepted.
pub fn field_value_to_f64(val: &FieldValue) -> Result<f64, SqlError> {
    val.as_f64().ok_or_else(|| {
        SqlError::type_error(
            "numeric aggregate input",
            val.type_name(),
            Some(val.to_string()),
        )
    })
}

pub fn compute_avg_from_welford(state: &WelfordState) -> Option<f64> {
    if state.count == 0 {
        None
    } else {
        Some(state.mean)
    }
}

/// Compute variance from a Welford state.
///
/// `sample=true` gives sample variance (N-1 divisor), `sample=false` gives population
/// variance (N divisor).
pub fn compute_variance_from_welford(state: &WelfordState, sample: bool) -> Option<f64> {
    if state.count == 0 {
        return None;
    }
    if sample {
        if state.count < 2 {
            return None;
        }
        Some(state.m2 / (state.count - 1) as f64)
    } else {
        Some(state.m2 / state.count as f64)
    }
}

pub fn compute_stddev_from_welford(state: &WelfordState, sample: bool) -> Option<f64> {
    compute_variance_from_welford(state, sample).map(f64::sqrt)
}

/// Percentile with linear interpolation between closest ranks; `p` in `[0, 1]`.
pub fn compute_percentile_from_values(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        Some(sorted[lower])
    } else {
        let weight = rank - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
    }
}

/// Wrap an optional numeric result; no input means NULL.
pub fn float_or_null(value: Option<f64>) -> FieldValue {
    value.map(FieldValue::Float).unwrap_or(FieldValue::Null)
}
