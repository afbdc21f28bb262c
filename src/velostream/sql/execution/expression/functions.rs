//! Built-in scalar SQL functions.
//!
//! Handlers receive already-evaluated arguments; the registry has checked the
//! argument count before the call. A NULL argument yields NULL unless the function
//! exists to handle NULLs (COALESCE, NULLIF, CONCAT).

use crate::register_sql_function;
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::expression::function_metadata::FunctionCategory;
use crate::velostream::sql::execution::types::FieldValue;
use std::cmp::Ordering;

/// Provides built-in SQL function implementations
pub struct BuiltinFunctions;

fn arity_mismatch(name: &str, args: &[FieldValue]) -> SqlError {
    SqlError::execution_error(
        format!("{} called with {} argument(s)", name, args.len()),
        None,
    )
}

fn numeric_arg(name: &str, value: &FieldValue) -> Result<FieldValue, SqlError> {
    value.to_number().map_err(|_| {
        SqlError::type_error(
            format!("numeric argument for {}", name),
            value.type_name(),
            Some(value.to_string()),
        )
    })
}

fn string_arg<'a>(name: &str, value: &'a FieldValue) -> Result<&'a str, SqlError> {
    match value {
        FieldValue::String(s) => Ok(s),
        other => Err(SqlError::type_error(
            format!("string argument for {}", name),
            other.type_name(),
            Some(other.to_string()),
        )),
    }
}

fn integer_arg(name: &str, value: &FieldValue) -> Result<i64, SqlError> {
    match numeric_arg(name, value)? {
        FieldValue::Integer(i) => Ok(i),
        FieldValue::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        other => Err(SqlError::type_error(
            format!("integer argument for {}", name),
            other.type_name(),
            Some(other.to_string()),
        )),
    }
}

impl BuiltinFunctions {
    // Math Functions

    pub fn abs_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => match numeric_arg("ABS", value)? {
                FieldValue::Integer(i) => Ok(FieldValue::Integer(i.saturating_abs())),
                FieldValue::Float(f) => Ok(FieldValue::Float(f.abs())),
                _ => Ok(FieldValue::Null),
            },
            _ => Err(arity_mismatch("ABS", args)),
        }
    }

    pub fn round_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        let (value, precision) = match args {
            [value] => (value, 0),
            [_, FieldValue::Null] => return Ok(FieldValue::Null),
            [value, precision] => (value, integer_arg("ROUND", precision)?),
            _ => return Err(arity_mismatch("ROUND", args)),
        };
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        match numeric_arg("ROUND", value)? {
            FieldValue::Integer(i) => Ok(FieldValue::Integer(i)),
            FieldValue::Float(f) => {
                let multiplier = 10_f64.powi(precision.clamp(-308, 308) as i32);
                Ok(FieldValue::Float((f * multiplier).round() / multiplier))
            }
            _ => Ok(FieldValue::Null),
        }
    }

    pub fn ceil_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        Self::integral_op("CEIL", args, f64::ceil)
    }

    pub fn floor_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        Self::integral_op("FLOOR", args, f64::floor)
    }

    fn integral_op(
        name: &str,
        args: &[FieldValue],
        op: fn(f64) -> f64,
    ) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => match numeric_arg(name, value)? {
                FieldValue::Integer(i) => Ok(FieldValue::Integer(i)),
                FieldValue::Float(f) => Ok(FieldValue::Integer(op(f) as i64)),
                _ => Ok(FieldValue::Null),
            },
            _ => Err(arity_mismatch(name, args)),
        }
    }

    pub fn sqrt_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => {
                let x = numeric_arg("SQRT", value)?.as_f64().unwrap_or(0.0);
                if x < 0.0 {
                    return Err(SqlError::execution_error(
                        "SQRT cannot be applied to negative numbers",
                        None,
                    ));
                }
                Ok(FieldValue::Float(x.sqrt()))
            }
            _ => Err(arity_mismatch("SQRT", args)),
        }
    }

    pub fn power_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null, _] | [_, FieldValue::Null] => Ok(FieldValue::Null),
            [base, exponent] => {
                let b = numeric_arg("POWER", base)?.as_f64().unwrap_or(0.0);
                let e = numeric_arg("POWER", exponent)?.as_f64().unwrap_or(0.0);
                Ok(FieldValue::Float(b.powf(e)))
            }
            _ => Err(arity_mismatch("POWER", args)),
        }
    }

    pub fn mod_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [dividend, divisor] => dividend.modulo(divisor),
            _ => Err(arity_mismatch("MOD", args)),
        }
    }

    // String Functions

    pub fn upper_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => Ok(FieldValue::String(string_arg("UPPER", value)?.to_uppercase())),
            _ => Err(arity_mismatch("UPPER", args)),
        }
    }

    pub fn lower_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => Ok(FieldValue::String(string_arg("LOWER", value)?.to_lowercase())),
            _ => Err(arity_mismatch("LOWER", args)),
        }
    }

    pub fn length_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [FieldValue::Array(items)] => Ok(FieldValue::Integer(items.len() as i64)),
            [value] => Ok(FieldValue::Integer(
                string_arg("LENGTH", value)?.chars().count() as i64,
            )),
            _ => Err(arity_mismatch("LENGTH", args)),
        }
    }

    pub fn trim_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => Ok(FieldValue::String(
                string_arg("TRIM", value)?.trim().to_string(),
            )),
            _ => Err(arity_mismatch("TRIM", args)),
        }
    }

    /// CONCAT skips NULL arguments; non-string arguments use their display form.
    pub fn concat_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        let mut result = String::new();
        for arg in args.iter().filter(|a| !a.is_null()) {
            result.push_str(&arg.to_display_string());
        }
        Ok(FieldValue::String(result))
    }

    /// SUBSTRING(string, start[, length]) with a 1-based start.
    pub fn substring_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        if args.iter().any(FieldValue::is_null) {
            return Ok(FieldValue::Null);
        }
        let (string, start, length) = match args {
            [s, start] => (string_arg("SUBSTRING", s)?, integer_arg("SUBSTRING", start)?, None),
            [s, start, len] => (
                string_arg("SUBSTRING", s)?,
                integer_arg("SUBSTRING", start)?,
                Some(integer_arg("SUBSTRING", len)?),
            ),
            _ => return Err(arity_mismatch("SUBSTRING", args)),
        };
        let skip = (start.max(1) - 1) as usize;
        let chars = string.chars().skip(skip);
        let result: String = match length {
            Some(len) => chars.take(len.max(0) as usize).collect(),
            None => chars.collect(),
        };
        Ok(FieldValue::String(result))
    }

    pub fn replace_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [s, search, replacement] => {
                if args.iter().any(FieldValue::is_null) {
                    return Ok(FieldValue::Null);
                }
                let s = string_arg("REPLACE", s)?;
                let search = string_arg("REPLACE", search)?;
                let replacement = string_arg("REPLACE", replacement)?;
                Ok(FieldValue::String(s.replace(search, replacement)))
            }
            _ => Err(arity_mismatch("REPLACE", args)),
        }
    }

    // Conditional Functions

    pub fn coalesce_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(FieldValue::Null))
    }

    pub fn nullif_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null, _] => Ok(FieldValue::Null),
            [value, FieldValue::Null] => Ok(value.clone()),
            [value, other] if value.sql_equals(other) => Ok(FieldValue::Null),
            [value, _] => Ok(value.clone()),
            _ => Err(arity_mismatch("NULLIF", args)),
        }
    }

    pub fn greatest_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        Self::extremum(args, Ordering::Greater)
    }

    pub fn least_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        Self::extremum(args, Ordering::Less)
    }

    /// GREATEST/LEAST ignore NULL arguments and return NULL only when all are NULL.
    fn extremum(args: &[FieldValue], keep: Ordering) -> Result<FieldValue, SqlError> {
        let mut best: Option<&FieldValue> = None;
        for value in args.iter().filter(|v| !v.is_null()) {
            best = match best {
                Some(current) if value.compare(current)? != keep => Some(current),
                _ => Some(value),
            };
        }
        Ok(best.cloned().unwrap_or(FieldValue::Null))
    }

    // Conversion Functions

    pub fn to_string_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [value] => Ok(FieldValue::String(value.to_display_string())),
            _ => Err(arity_mismatch("TO_STRING", args)),
        }
    }

    pub fn to_number_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        match args {
            [FieldValue::Null] => Ok(FieldValue::Null),
            [FieldValue::Boolean(b)] => Ok(FieldValue::Integer(i64::from(*b))),
            [value] => value.to_number(),
            _ => Err(arity_mismatch("TO_NUMBER", args)),
        }
    }

    // Date/Time Functions

    /// Current wall-clock time in epoch milliseconds.
    pub fn now_function(args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        if !args.is_empty() {
            return Err(arity_mismatch("NOW", args));
        }
        Ok(FieldValue::Integer(chrono::Utc::now().timestamp_millis()))
    }
}

// ============================================================================
// MATH FUNCTIONS
// ============================================================================

register_sql_function!(
    name: "ABS",
    aliases: [],
    category: FunctionCategory::Math,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::abs_function
);

register_sql_function!(
    name: "ROUND",
    aliases: [],
    category: FunctionCategory::Math,
    args: (1, Some(2)),
    scalar: BuiltinFunctions::round_function
);

register_sql_function!(
    name: "CEIL",
    aliases: ["CEILING"],
    category: FunctionCategory::Math,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::ceil_function
);

register_sql_function!(
    name: "FLOOR",
    aliases: [],
    category: FunctionCategory::Math,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::floor_function
);

register_sql_function!(
    name: "SQRT",
    aliases: [],
    category: FunctionCategory::Math,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::sqrt_function
);

register_sql_function!(
    name: "POWER",
    aliases: ["POW"],
    category: FunctionCategory::Math,
    args: (2, Some(2)),
    scalar: BuiltinFunctions::power_function
);

register_sql_function!(
    name: "MOD",
    aliases: [],
    category: FunctionCategory::Math,
    args: (2, Some(2)),
    scalar: BuiltinFunctions::mod_function
);

// ============================================================================
// STRING FUNCTIONS
// ============================================================================

register_sql_function!(
    name: "UPPER",
    aliases: ["UCASE"],
    category: FunctionCategory::String,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::upper_function
);

register_sql_function!(
    name: "LOWER",
    aliases: ["LCASE"],
    category: FunctionCategory::String,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::lower_function
);

register_sql_function!(
    name: "LENGTH",
    aliases: ["LEN", "CHAR_LENGTH"],
    category: FunctionCategory::String,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::length_function
);

register_sql_function!(
    name: "TRIM",
    aliases: [],
    category: FunctionCategory::String,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::trim_function
);

register_sql_function!(
    name: "CONCAT",
    aliases: [],
    category: FunctionCategory::String,
    args: (1, None),
    scalar: BuiltinFunctions::concat_function
);

register_sql_function!(
    name: "SUBSTRING",
    aliases: ["SUBSTR"],
    category: FunctionCategory::String,
    args: (2, Some(3)),
    scalar: BuiltinFunctions::substring_function
);

register_sql_function!(
    name: "REPLACE",
    aliases: [],
    category: FunctionCategory::String,
    args: (3, Some(3)),
    scalar: BuiltinFunctions::replace_function
);

// ============================================================================
// CONDITIONAL FUNCTIONS
// ============================================================================

register_sql_function!(
    name: "COALESCE",
    aliases: ["IFNULL"],
    category: FunctionCategory::Conditional,
    args: (1, None),
    scalar: BuiltinFunctions::coalesce_function
);

register_sql_function!(
    name: "NULLIF",
    aliases: [],
    category: FunctionCategory::Conditional,
    args: (2, Some(2)),
    scalar: BuiltinFunctions::nullif_function
);

register_sql_function!(
    name: "GREATEST",
    aliases: [],
    category: FunctionCategory::Conditional,
    args: (1, None),
    scalar: BuiltinFunctions::greatest_function
);

register_sql_function!(
    name: "LEAST",
    aliases: [],
    category: FunctionCategory::Conditional,
    args: (1, None),
    scalar: BuiltinFunctions::least_function
);

// ============================================================================
// CONVERSION AND TIME FUNCTIONS
// ============================================================================

register_sql_function!(
    name: "TO_STRING",
    aliases: [],
    category: FunctionCategory::Conversion,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::to_string_function
);

register_sql_function!(
    name: "TO_NUMBER",
    aliases: [],
    category: FunctionCategory::Conversion,
    args: (1, Some(1)),
    scalar: BuiltinFunctions::to_number_function
);

register_sql_function!(
    name: "NOW",
    aliases: ["CURRENT_TIMESTAMP"],
    category: FunctionCategory::DateTime,
    args: (0, Some(0)),
    scalar: BuiltinFunctions::now_function
);
