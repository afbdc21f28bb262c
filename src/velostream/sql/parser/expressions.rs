/*!
# Expression Parsing

Precedence-climbing recursive descent over the token stream.

```text
Level 1 (Lowest):  OR                               (parse_logical_or)
Level 2:           AND                              (parse_logical_and)
Level 3:           NOT (prefix)                     (parse_logical_not)
Level 4:           Comparisons/IS/IN/BETWEEN/LIKE   (parse_comparison)
Level 5:           String Concatenation (||)        (parse_concatenative)
Level 6:           Addition/Subtraction             (parse_additive)
Level 7:           Multiplication/Division/Modulo   (parse_multiplicative)
Level 8:           Unary minus/plus                 (parse_unary)
Level 9 (Highest): Primary Expressions              (parse_primary)
```

CASE comes in both forms:

```sql
CASE WHEN temperature > 30 THEN 'hot' WHEN temperature > 20 THEN 'warm' ELSE 'cold' END
CASE status WHEN 'active' THEN 1 WHEN 'inactive' THEN 0 ELSE -1 END
```
*/

use super::common::{ParseMode, TokenParser};
use super::lexer::TokenType;
use crate::velostream::sql::ast::{BinaryOperator, Expr, LiteralValue, UnaryOperator};
use crate::velostream::sql::error::SqlError;

impl TokenParser {
    /// Entry point for expression parsing.
    pub fn parse_expression(&mut self) -> Result<Expr, SqlError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_logical_and()?;
        while self.consume_if(TokenType::Or) {
            let right = self.parse_logical_and()?;
            left = binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_logical_not()?;
        while self.consume_if(TokenType::And) {
            let right = self.parse_logical_not()?;
            left = binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_logical_not(&mut self) -> Result<Expr, SqlError> {
        if self.consume_if(TokenType::Not) {
            let expr = self.parse_logical_not()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SqlError> {
        let left = self.parse_concatenative()?;

        let op = match self.current_type() {
            TokenType::Equal => Some(BinaryOperator::Equal),
            TokenType::NotEqual => Some(BinaryOperator::NotEqual),
            TokenType::LessThan => Some(BinaryOperator::LessThan),
            TokenType::LessThanOrEqual => Some(BinaryOperator::LessThanOrEqual),
            TokenType::GreaterThan => Some(BinaryOperator::GreaterThan),
            TokenType::GreaterThanOrEqual => Some(BinaryOperator::GreaterThanOrEqual),
            TokenType::Like => Some(BinaryOperator::Like),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_concatenative()?;
            return Ok(binary(left, op, right));
        }

        match self.current_type() {
            TokenType::Is => {
                self.advance();
                let negated = self.consume_if(TokenType::Not);
                if !self.consume_if(TokenType::Null) {
                    return Err(self.create_parse_error(if negated {
                        "Expected NULL after IS NOT"
                    } else {
                        "Expected NULL after IS"
                    }));
                }
                Ok(Expr::UnaryOp {
                    op: if negated {
                        UnaryOperator::IsNotNull
                    } else {
                        UnaryOperator::IsNull
                    },
                    expr: Box::new(left),
                })
            }
            TokenType::In => {
                self.advance();
                self.parse_in_list(left, false)
            }
            TokenType::Between => {
                self.advance();
                self.parse_between(left, false)
            }
            TokenType::Not => {
                let next = self.peek_token(1).map(|t| t.token_type);
                match next {
                    Some(TokenType::In) => {
                        self.advance();
                        self.advance();
                        self.parse_in_list(left, true)
                    }
                    Some(TokenType::Between) => {
                        self.advance();
                        self.advance();
                        self.parse_between(left, true)
                    }
                    Some(TokenType::Like) => {
                        self.advance();
                        self.advance();
                        let right = self.parse_concatenative()?;
                        Ok(binary(left, BinaryOperator::NotLike, right))
                    }
                    _ => Ok(left),
                }
            }
            _ => Ok(left),
        }
    }

    fn parse_in_list(&mut self, left: Expr, negated: bool) -> Result<Expr, SqlError> {
        if self.current_type() != TokenType::LeftParen {
            return Err(self.create_parse_error("Expected '(' after IN"));
        }
        self.advance();
        let mut items = Vec::new();
        if self.current_type() != TokenType::RightParen {
            loop {
                items.push(self.parse_expression()?);
                match self.current_type() {
                    TokenType::Comma => self.advance(),
                    TokenType::RightParen => break,
                    _ => return Err(self.create_parse_error("Expected ',' or ')' in IN list")),
                }
            }
        }
        self.expect(TokenType::RightParen)?;
        let op = if negated {
            BinaryOperator::NotIn
        } else {
            BinaryOperator::In
        };
        Ok(binary(left, op, Expr::List(items)))
    }

    fn parse_between(&mut self, expr: Expr, negated: bool) -> Result<Expr, SqlError> {
        let low = self.parse_concatenative()?;
        if !self.consume_if(TokenType::And) {
            return Err(self.create_parse_error("Expected AND in BETWEEN expression"));
        }
        let high = self.parse_concatenative()?;
        Ok(Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    fn parse_concatenative(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_additive()?;
        while self.consume_if(TokenType::Concat) {
            let right = self.parse_additive()?;
            left = binary(left, BinaryOperator::Concat, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_type() {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_type() {
                TokenType::Asterisk => BinaryOperator::Multiply,
                TokenType::Divide => BinaryOperator::Divide,
                TokenType::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SqlError> {
        match self.current_type() {
            TokenType::Minus => {
                self.advance();
                let expr = self.parse_unary()?;
                // Fold negative numeric literals so `-1` stays a literal.
                Ok(match expr {
                    Expr::Literal(LiteralValue::Integer(i)) => {
                        Expr::Literal(LiteralValue::Integer(-i))
                    }
                    Expr::Literal(LiteralValue::Float(f)) => Expr::Literal(LiteralValue::Float(-f)),
                    other => Expr::UnaryOp {
                        op: UnaryOperator::Minus,
                        expr: Box::new(other),
                    },
                })
            }
            TokenType::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SqlError> {
        let token = self.current_token().clone();
        match token.token_type {
            TokenType::Number => {
                self.advance();
                parse_number(&token.value)
                    .ok_or_else(|| {
                        SqlError::parse_error(
                            format!("Invalid number '{}'", token.value),
                            Some(token.position),
                        )
                    })
                    .map(Expr::Literal)
            }
            TokenType::String => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::String(token.value)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Null))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Boolean(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Boolean(false)))
            }
            TokenType::Case => {
                self.advance();
                self.parse_case_expression(token.position)
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::RightParen)?;
                Ok(expr)
            }
            TokenType::Identifier => {
                self.advance();
                if self.current_type() == TokenType::LeftParen {
                    self.advance();
                    return self.parse_function_call(token.value);
                }
                let mut name = token.value;
                while self.current_type() == TokenType::Dot {
                    self.advance();
                    let segment = self.expect_identifier()?;
                    name.push('.');
                    name.push_str(&segment);
                }
                Ok(Expr::Column(name))
            }
            TokenType::Eof => Err(self.create_parse_error("Unexpected end of expression")),
            other => Err(self.create_parse_error(format!(
                "Unexpected token {:?} '{}' in expression",
                other, token.value
            ))),
        }
    }

    /// Arguments of `name(`; the opening parenthesis is already consumed.
    fn parse_function_call(&mut self, name: String) -> Result<Expr, SqlError> {
        let mut args = Vec::new();
        if self.current_type() == TokenType::Asterisk {
            // COUNT(*) is represented with no arguments.
            self.advance();
            self.expect(TokenType::RightParen)?;
            return Ok(Expr::Function { name, args });
        }
        if self.current_type() != TokenType::RightParen {
            loop {
                args.push(self.parse_expression()?);
                if !self.consume_if(TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenType::RightParen)?;
        Ok(Expr::Function { name, args })
    }

    fn parse_case_expression(&mut self, position: usize) -> Result<Expr, SqlError> {
        if self.mode() == ParseMode::Restricted && self.case_depth > 0 {
            return Err(SqlError::UnsupportedExpression {
                message: format!("nested CASE expression at position {}", position),
            });
        }
        self.case_depth += 1;
        let result = self.parse_case_body();
        self.case_depth -= 1;
        result
    }

    fn parse_case_body(&mut self) -> Result<Expr, SqlError> {
        let operand = if self.current_type() != TokenType::When {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        let mut when_clauses = Vec::new();
        while self.consume_if(TokenType::When) {
            let condition = self.parse_expression()?;
            self.expect(TokenType::Then)?;
            let result = self.parse_expression()?;
            when_clauses.push((condition, result));
        }

        if when_clauses.is_empty() {
            return Err(
                self.create_parse_error("CASE expression must have at least one WHEN clause")
            );
        }

        let else_clause = if self.consume_if(TokenType::Else) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        self.expect(TokenType::End)?;

        Ok(Expr::Case {
            operand,
            when_clauses,
            else_clause,
        })
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn parse_number(text: &str) -> Option<LiteralValue> {
    if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(LiteralValue::Float)
    } else {
        match text.parse::<i64>() {
            Ok(i) => Some(LiteralValue::Integer(i)),
            Err(_) => text.parse::<f64>().ok().map(LiteralValue::Float),
        }
    }
}
