/*!
# Clause Helpers

Window pseudo-calls from GROUP BY, duration strings, and `WITH (...)` properties.

```sql
GROUP BY device_id, TumblingWindow('5s')
GROUP BY SlidingWindow('30s', '10s')
GROUP BY device_id, CountingWindow(100)
GROUP BY user_id, SessionWindow('5m')
WITH (TIMESTAMP='event_ts', TIMEUNIT='ss')
```
*/

use super::common::TokenParser;
use super::lexer::TokenType;
use crate::velostream::sql::ast::{Expr, LiteralValue, WindowSpec};
use crate::velostream::sql::error::SqlError;
use std::collections::HashMap;
use std::time::Duration;

/// Names of the GROUP BY window constructors, upper-cased.
pub const WINDOW_CONSTRUCTORS: [&str; 4] = [
    "TUMBLINGWINDOW",
    "SLIDINGWINDOW",
    "COUNTINGWINDOW",
    "SESSIONWINDOW",
];

pub fn is_window_constructor(name: &str) -> bool {
    let upper = name.to_uppercase();
    WINDOW_CONSTRUCTORS.contains(&upper.as_str())
}

/// Convert a window pseudo-call (`TumblingWindow('5s')` etc.) into a [`WindowSpec`].
pub fn window_spec_from_call(name: &str, args: &[Expr]) -> Result<WindowSpec, SqlError> {
    let upper = name.to_uppercase();
    let window_type = upper.trim_end_matches("WINDOW").to_string();
    let expect_args = |n: usize| -> Result<(), SqlError> {
        if args.len() == n {
            Ok(())
        } else {
            Err(SqlError::window_error(
                format!("{} expects {} argument(s), got {}", name, n, args.len()),
                window_type.clone(),
            ))
        }
    };

    match upper.as_str() {
        "TUMBLINGWINDOW" => {
            expect_args(1)?;
            Ok(WindowSpec::Tumbling {
                size: duration_arg(&args[0], &window_type)?,
            })
        }
        "SLIDINGWINDOW" => {
            expect_args(2)?;
            Ok(WindowSpec::Sliding {
                size: duration_arg(&args[0], &window_type)?,
                slide: duration_arg(&args[1], &window_type)?,
            })
        }
        "COUNTINGWINDOW" => {
            expect_args(1)?;
            let count = match &args[0] {
                Expr::Literal(LiteralValue::Integer(n)) if *n > 0 => *n as u64,
                Expr::Literal(LiteralValue::String(s)) => match s.trim().parse::<u64>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        return Err(SqlError::window_error(
                            format!("Invalid window count '{}'", s),
                            window_type,
                        ));
                    }
                },
                other => {
                    return Err(SqlError::window_error(
                        format!("Window count must be a positive integer, got {}", other),
                        window_type,
                    ));
                }
            };
            Ok(WindowSpec::Counting { count })
        }
        "SESSIONWINDOW" => {
            expect_args(1)?;
            Ok(WindowSpec::Session {
                gap: duration_arg(&args[0], &window_type)?,
            })
        }
        _ => Err(SqlError::window_error(
            format!("Unknown window type '{}'", name),
            window_type,
        )),
    }
}

fn duration_arg(arg: &Expr, window_type: &str) -> Result<Duration, SqlError> {
    let duration = match arg {
        Expr::Literal(LiteralValue::String(text)) => parse_duration(text)
            .map_err(|e| SqlError::window_error(e.to_string(), window_type))?,
        other => {
            return Err(SqlError::window_error(
                format!("Window duration must be a string such as '5s', got {}", other),
                window_type,
            ));
        }
    };
    if duration.is_zero() {
        return Err(SqlError::window_error(
            "Window duration must be positive",
            window_type,
        ));
    }
    Ok(duration)
}

/// Parse a duration such as `500ms`, `5s`, `5m`, `1h`, `1d` or `1h30m`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(text: &str) -> Result<Duration, SqlError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SqlError::parse_error("Empty duration", None));
    }
    if let Ok(seconds) = text.parse::<f64>() {
        if seconds < 0.0 || !seconds.is_finite() {
            return Err(SqlError::parse_error(
                format!("Invalid duration '{}'", text),
                None,
            ));
        }
        return Ok(Duration::from_secs_f64(seconds));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(SqlError::parse_error(
                format!("Invalid duration '{}'", text),
                None,
            ));
        }
        let amount: f64 = rest[..number_len].parse().map_err(|_| {
            SqlError::parse_error(format!("Invalid duration '{}'", text), None)
        })?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let nanos_per_unit: f64 = match unit.to_lowercase().as_str() {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" | "sec" | "secs" => 1e9,
            "m" | "min" | "mins" => 60.0 * 1e9,
            "h" | "hr" | "hrs" => 3_600.0 * 1e9,
            "d" => 86_400.0 * 1e9,
            _ => {
                return Err(SqlError::parse_error(
                    format!("Unknown duration unit '{}' in '{}'", unit, text),
                    None,
                ));
            }
        };
        total += Duration::from_nanos((amount * nanos_per_unit).round() as u64);
    }
    Ok(total)
}

impl TokenParser {
    /// Parse `( KEY = 'value' [, ...] )` after a WITH keyword; keys are upper-cased.
    pub(super) fn parse_with_properties(
        &mut self,
        properties: &mut HashMap<String, String>,
    ) -> Result<(), SqlError> {
        self.expect(TokenType::LeftParen)?;
        loop {
            let key = match self.current_type() {
                TokenType::Identifier | TokenType::String => {
                    let token = self.current_token().clone();
                    self.advance();
                    token.value
                }
                _ => return Err(self.create_parse_error("Expected property name in WITH clause")),
            };
            self.expect(TokenType::Equal)?;
            let value_token = self.current_token().clone();
            let value = match value_token.token_type {
                TokenType::String | TokenType::Number | TokenType::Identifier => {
                    self.advance();
                    value_token.value
                }
                _ => return Err(self.create_parse_error("Expected property value in WITH clause")),
            };
            properties.insert(key.to_uppercase(), value);
            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RightParen)?;
        Ok(())
    }
}
