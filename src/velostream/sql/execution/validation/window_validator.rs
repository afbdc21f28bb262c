//! Window Validation
//!
//! Window parameters must be positive, a sliding window may not slide further than its
//! size (a record could otherwise belong to no window at all), and the `WITH` clause
//! must name a known time unit.

use crate::velostream::sql::SqlError;
use crate::velostream::sql::ast::{StreamingQuery, WindowSpec};
use crate::velostream::sql::execution::window_v2::TimestampExtractor;

pub struct WindowValidator;

impl WindowValidator {
    pub fn validate_query(query: &StreamingQuery) -> Result<(), SqlError> {
        if let Some(spec) = &query.window {
            Self::validate_spec(spec)?;
        }
        TimestampExtractor::from_query(query)?;
        if query.time_unit().is_some() && query.timestamp_field().is_none() {
            return Err(SqlError::validation_error(
                "TIMEUNIT requires TIMESTAMP in the WITH clause",
            ));
        }
        Ok(())
    }

    pub fn validate_spec(spec: &WindowSpec) -> Result<(), SqlError> {
        let window_type = spec.window_type();
        let invalid = |message: String| Err(SqlError::window_error(message, window_type));
        match spec {
            WindowSpec::Tumbling { size } if size.as_millis() == 0 => {
                invalid(format!("Window size must be at least 1ms, got {:?}", size))
            }
            WindowSpec::Sliding { size, slide } => {
                if size.as_millis() == 0 || slide.as_millis() == 0 {
                    invalid(format!(
                        "Window size and slide must be at least 1ms, got {:?} and {:?}",
                        size, slide
                    ))
                } else if slide > size {
                    invalid(format!(
                        "Slide {:?} must not exceed window size {:?}",
                        slide, size
                    ))
                } else {
                    Ok(())
                }
            }
            WindowSpec::Counting { count: 0 } => invalid("Window count must be positive".into()),
            WindowSpec::Session { gap } if gap.as_millis() == 0 => {
                invalid(format!("Session gap must be at least 1ms, got {:?}", gap))
            }
            _ => Ok(()),
        }
    }
}
