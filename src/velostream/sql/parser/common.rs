/*!
# Token Parser

Recursive-descent infrastructure shared by the statement parser and the expression
parser: token navigation with lookahead, expectation helpers that produce positioned
errors, and the grammar mode switch.

## Grammar modes

- [`ParseMode::Restricted`] is the native expression grammar. A CASE expression that
  appears inside another CASE's WHEN, THEN or ELSE branch is rejected with
  `SqlError::UnsupportedExpression`.
- [`ParseMode::Permissive`] accepts the full grammar, including nested CASE. Compiled
  expressions that need it are marked as delegated.
*/

use super::lexer::{Token, TokenType};
use crate::velostream::sql::error::SqlError;

/// Which expression grammar the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Restricted,
    Permissive,
}

/// Core token parser for recursive descent parsing.
pub struct TokenParser {
    tokens: Vec<Token>,
    current: usize,
    mode: ParseMode,
    /// Number of CASE expressions currently open around the parse position
    pub(super) case_depth: usize,
}

impl TokenParser {
    /// Create a parser positioned at the first token. `tokens` must end with `Eof`.
    pub fn new(tokens: Vec<Token>, mode: ParseMode) -> Self {
        Self {
            tokens,
            current: 0,
            mode,
            case_depth: 0,
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Create a parse error positioned at the current token.
    pub fn create_parse_error(&self, message: impl Into<String>) -> SqlError {
        SqlError::parse_error(message, Some(self.current_token().position))
    }

    /// Get the current token without advancing. Past the end this is the `Eof` token.
    pub fn current_token(&self) -> &Token {
        let index = self.current.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    pub fn current_type(&self) -> TokenType {
        self.current_token().token_type
    }

    /// Peek ahead without consuming (`offset` 1 is the next token).
    pub fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    /// Advance to the next token; never moves past `Eof`.
    pub fn advance(&mut self) {
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
    }

    /// Consume a token of the expected type or return an error.
    pub fn expect(&mut self, expected: TokenType) -> Result<Token, SqlError> {
        let token = self.current_token().clone();
        if token.token_type == expected {
            self.advance();
            Ok(token)
        } else {
            Err(self.create_parse_error(format!(
                "Expected {:?}, found {:?} '{}'",
                expected, token.token_type, token.value
            )))
        }
    }

    /// Consume the current token if it has the given type.
    pub fn consume_if(&mut self, token_type: TokenType) -> bool {
        if self.current_type() == token_type {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Accept an identifier, or a keyword used where an identifier is expected.
    pub fn expect_identifier(&mut self) -> Result<String, SqlError> {
        let token = self.current_token().clone();
        match token.token_type {
            TokenType::Identifier => {
                self.advance();
                Ok(token.value)
            }
            _ => Err(self.create_parse_error(format!(
                "Expected identifier, found {:?} '{}'",
                token.token_type, token.value
            ))),
        }
    }

    /// Skip an optional statement terminator.
    pub fn consume_semicolon(&mut self) {
        self.consume_if(TokenType::Semicolon);
    }

    pub fn is_at_end(&self) -> bool {
        self.current_type() == TokenType::Eof
    }

    /// Require that all input has been consumed.
    pub fn expect_end(&mut self) -> Result<(), SqlError> {
        if self.is_at_end() {
            Ok(())
        } else {
            let token = self.current_token();
            Err(self.create_parse_error(format!(
                "Unexpected trailing input starting at '{}'",
                token.value
            )))
        }
    }
}
