//! Error types for the streaming SQL engine.
//!
//! Every failure the engine can report is a [`SqlError`]. Setup failures (parsing,
//! validation, configuration) are returned synchronously from `execute`/`compile`;
//! per-record failures are returned by the expression evaluator and handled by the
//! pipeline according to the call site's policy.

use thiserror::Error;

/// Errors raised while parsing, validating or executing a streaming query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlError {
    /// SQL text could not be tokenized or parsed.
    #[error("Parse error{}: {message}", fmt_position(.position))]
    ParseError {
        message: String,
        position: Option<usize>,
    },

    /// Structurally valid query that the engine refuses to run.
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// Runtime failure while evaluating a record.
    #[error("Execution error: {message}")]
    ExecutionError {
        message: String,
        query: Option<String>,
    },

    /// Operand of the wrong type for an operator or function.
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError {
        expected: String,
        actual: String,
        value: Option<String>,
    },

    /// Function name that the registry does not know.
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    /// Construct outside the restricted expression grammar.
    #[error("Unsupported expression: {message}")]
    UnsupportedExpression { message: String },

    /// Invalid engine configuration or registry misuse.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Invalid window definition or window processing failure.
    #[error("Window error ({window_type}): {message}")]
    WindowError {
        message: String,
        window_type: String,
    },

    /// Pipeline lifecycle failure (not started, stopped, closed queue).
    #[error("Stream error: {message}")]
    StreamError { message: String },
}

fn fmt_position(position: &Option<usize>) -> String {
    match position {
        Some(pos) => format!(" at position {}", pos),
        None => String::new(),
    }
}

impl SqlError {
    pub fn parse_error(message: impl Into<String>, position: Option<usize>) -> Self {
        SqlError::ParseError {
            message: message.into(),
            position,
        }
    }

    pub fn execution_error(message: impl Into<String>, query: Option<String>) -> Self {
        SqlError::ExecutionError {
            message: message.into(),
            query,
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        SqlError::ValidationError {
            message: message.into(),
        }
    }

    pub fn type_error(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        SqlError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
            value,
        }
    }

    pub fn unknown_function_error(name: impl Into<String>) -> Self {
        SqlError::UnknownFunction { name: name.into() }
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        SqlError::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn window_error(message: impl Into<String>, window_type: impl Into<String>) -> Self {
        SqlError::WindowError {
            message: message.into(),
            window_type: window_type.into(),
        }
    }

    pub fn stream_error(message: impl Into<String>) -> Self {
        SqlError::StreamError {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the SQL modules.
pub type SqlResult<T> = Result<T, SqlError>;
