/*!
Streaming SQL Parser

Turns query text into a [`StreamingQuery`] and expression text into an [`Expr`].
The lexer produces tokens, [`TokenParser`] walks them; statement parsing lives in
`select`, expression parsing in `expressions`, window and WITH clauses in `clauses`.
*/

pub mod clauses;
pub mod common;
pub mod expressions;
pub mod lexer;
pub mod select;

pub use clauses::parse_duration;
pub use common::{ParseMode, TokenParser};
pub use lexer::{Token, TokenType};

use crate::velostream::sql::ast::{Expr, StreamingQuery};
use crate::velostream::sql::error::SqlError;

/// Entry point for parsing streaming SQL.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamingSqlParser;

impl StreamingSqlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a SELECT statement.
    pub fn parse(&self, sql: &str) -> Result<StreamingQuery, SqlError> {
        let tokens = lexer::tokenize(sql)?;
        let mut parser = TokenParser::new(tokens, ParseMode::Permissive);
        parser.parse_select_statement()
    }

    /// Parse a standalone expression in the given grammar mode.
    pub fn parse_expression(&self, text: &str, mode: ParseMode) -> Result<Expr, SqlError> {
        let tokens = lexer::tokenize(text)?;
        let mut parser = TokenParser::new(tokens, mode);
        let expr = parser.parse_expression()?;
        parser.expect_end()?;
        Ok(expr)
    }
}
