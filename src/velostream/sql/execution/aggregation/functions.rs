//! Built-in aggregate functions.
//!
//! Each aggregate is registered as a factory producing a fresh [`Accumulator`] for one
//! (group, window). Factories receive the literal parameters that follow the
//! aggregated expression, e.g. the `0.9` of `PERCENTILE(latency, 0.9)`.

use super::accumulator::{
    Accumulator, AvgAccumulator, CollectAccumulator, CountAccumulator, DispersionAccumulator,
    ExtremumAccumulator, PercentileAccumulator, PositionalAccumulator, SumAccumulator,
};
use crate::register_sql_function;
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::expression::function_metadata::FunctionCategory;
use crate::velostream::sql::execution::types::FieldValue;

/// Factories for the built-in aggregates.
pub struct AggregateFunctions;

impl AggregateFunctions {
    pub fn count_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(CountAccumulator::default()))
    }

    pub fn sum_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(SumAccumulator::default()))
    }

    pub fn avg_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(AvgAccumulator::default()))
    }

    pub fn min_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(ExtremumAccumulator::min()))
    }

    pub fn max_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(ExtremumAccumulator::max()))
    }

    pub fn stddev_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(DispersionAccumulator::new(true, true)))
    }

    pub fn stddev_pop_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(DispersionAccumulator::new(false, true)))
    }

    pub fn variance_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(DispersionAccumulator::new(true, false)))
    }

    pub fn var_pop_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(DispersionAccumulator::new(false, false)))
    }

    pub fn median_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(PercentileAccumulator::new(0.5)))
    }

    /// PERCENTILE(expr, p) with `p` in `[0, 1]`.
    pub fn percentile_factory(params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        let p = Self::percentile_param(params)?;
        Ok(Box::new(PercentileAccumulator::new(p)))
    }

    /// Validate the `p` parameter of PERCENTILE.
    pub fn percentile_param(params: &[FieldValue]) -> Result<f64, SqlError> {
        let p = match params {
            [value] => value.as_f64(),
            _ => None,
        };
        match p {
            Some(p) if (0.0..=1.0).contains(&p) => Ok(p),
            _ => Err(SqlError::validation_error(format!(
                "PERCENTILE requires a literal fraction between 0 and 1, got {:?}",
                params
            ))),
        }
    }

    pub fn collect_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(CollectAccumulator::default()))
    }

    pub fn first_value_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(PositionalAccumulator::first()))
    }

    pub fn last_value_factory(_params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        Ok(Box::new(PositionalAccumulator::last()))
    }
}

// ============================================================================
// AGGREGATE FUNCTIONS
// ============================================================================

register_sql_function!(
    name: "COUNT",
    aliases: [],
    category: FunctionCategory::Aggregate,
    args: (0, Some(1)),
    aggregate: AggregateFunctions::count_factory
);

register_sql_function!(
    name: "SUM",
    aliases: [],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::sum_factory
);

register_sql_function!(
    name: "AVG",
    aliases: [],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::avg_factory
);

register_sql_function!(
    name: "MIN",
    aliases: [],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::min_factory
);

register_sql_function!(
    name: "MAX",
    aliases: [],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::max_factory
);

register_sql_function!(
    name: "FIRST_VALUE",
    aliases: ["FIRST"],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::first_value_factory
);

register_sql_function!(
    name: "LAST_VALUE",
    aliases: ["LAST"],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::last_value_factory
);

register_sql_function!(
    name: "COLLECT",
    aliases: ["ARRAY_AGG"],
    category: FunctionCategory::Aggregate,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::collect_factory
);

// ============================================================================
// STATISTICAL FUNCTIONS
// ============================================================================

register_sql_function!(
    name: "STDDEV",
    aliases: ["STDDEV_SAMP"],
    category: FunctionCategory::Statistical,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::stddev_factory
);

register_sql_function!(
    name: "STDDEV_POP",
    aliases: [],
    category: FunctionCategory::Statistical,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::stddev_pop_factory
);

register_sql_function!(
    name: "VARIANCE",
    aliases: ["VAR_SAMP"],
    category: FunctionCategory::Statistical,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::variance_factory
);

register_sql_function!(
    name: "VAR_POP",
    aliases: [],
    category: FunctionCategory::Statistical,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::var_pop_factory
);

register_sql_function!(
    name: "MEDIAN",
    aliases: [],
    category: FunctionCategory::Statistical,
    args: (1, Some(1)),
    aggregate: AggregateFunctions::median_factory
);

register_sql_function!(
    name: "PERCENTILE",
    aliases: ["PERCENTILE_CONT"],
    category: FunctionCategory::Statistical,
    args: (2, Some(2)),
    aggregate: AggregateFunctions::percentile_factory
);
