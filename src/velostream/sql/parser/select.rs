/*!
# SELECT Statement Parsing

```text
SELECT [DISTINCT] select_list
FROM source [WITH (...)]
[WHERE condition]
[GROUP BY expr [, expr ...]]     -- may include one window constructor
[HAVING condition]
[LIMIT n]
[WITH (TIMESTAMP='field', TIMEUNIT='unit')]
[;]
```
*/

use super::clauses::{is_window_constructor, window_spec_from_call};
use super::common::TokenParser;
use super::lexer::TokenType;
use crate::velostream::sql::ast::{Expr, SelectField, StreamingQuery};
use crate::velostream::sql::error::SqlError;

impl TokenParser {
    /// Parse one SELECT statement and require the input to be fully consumed.
    pub fn parse_select_statement(&mut self) -> Result<StreamingQuery, SqlError> {
        self.expect(TokenType::Select)?;
        let mut query = StreamingQuery {
            distinct: self.consume_if(TokenType::Distinct),
            ..Default::default()
        };

        query.fields = self.parse_select_fields()?;

        self.expect(TokenType::From)?;
        query.from = self.expect_identifier()?;

        if self.consume_if(TokenType::With) {
            self.parse_with_properties(&mut query.properties)?;
        }

        if self.consume_if(TokenType::Where) {
            query.where_clause = Some(self.parse_expression()?);
        }

        if self.consume_if(TokenType::Group) {
            self.expect(TokenType::By)?;
            self.parse_group_by(&mut query)?;
        }

        if self.consume_if(TokenType::Having) {
            query.having = Some(self.parse_expression()?);
        }

        if self.consume_if(TokenType::Limit) {
            let token = self.expect(TokenType::Number)?;
            let limit = token.value.parse::<u64>().map_err(|_| {
                SqlError::parse_error(
                    format!("LIMIT must be a non-negative integer, got '{}'", token.value),
                    Some(token.position),
                )
            })?;
            query.limit = Some(limit);
        }

        if self.consume_if(TokenType::With) {
            self.parse_with_properties(&mut query.properties)?;
        }

        self.consume_semicolon();
        self.expect_end()?;
        Ok(query)
    }

    fn parse_select_fields(&mut self) -> Result<Vec<SelectField>, SqlError> {
        let mut fields = Vec::new();
        loop {
            if self.consume_if(TokenType::Asterisk) {
                fields.push(SelectField::Wildcard);
            } else {
                let expr = self.parse_expression()?;
                let alias = if self.consume_if(TokenType::As) {
                    Some(self.parse_alias()?)
                } else if self.current_type() == TokenType::Identifier {
                    // Implicit alias: `expr alias`
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                fields.push(SelectField::Expression { expr, alias });
            }
            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }
        Ok(fields)
    }

    fn parse_alias(&mut self) -> Result<String, SqlError> {
        let token = self.current_token().clone();
        match token.token_type {
            TokenType::Identifier | TokenType::String => {
                self.advance();
                Ok(token.value)
            }
            _ => Err(self.create_parse_error(format!(
                "Expected alias after AS, found '{}'",
                token.value
            ))),
        }
    }

    fn parse_group_by(&mut self, query: &mut StreamingQuery) -> Result<(), SqlError> {
        loop {
            let position = self.current_token().position;
            let expr = self.parse_expression()?;
            match expr {
                Expr::Function { ref name, ref args } if is_window_constructor(name) => {
                    if query.window.is_some() {
                        return Err(SqlError::validation_error(format!(
                            "GROUP BY may contain at most one window (second window at position {})",
                            position
                        )));
                    }
                    query.window = Some(window_spec_from_call(name, args)?);
                }
                other => query.group_by.push(other),
            }
            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }
        Ok(())
    }
}
