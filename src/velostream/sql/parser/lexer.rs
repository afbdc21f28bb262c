/*!
Tokenization for streaming SQL.

Converts SQL text into tokens: keywords, identifiers, literals, operators and
punctuation. Comments (`-- ...` and `/* ... */`) are skipped.
*/

use crate::velostream::sql::error::SqlError;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Token types recognized by the SQL lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // SQL Keywords
    Select,   // SELECT
    Distinct, // DISTINCT
    From,     // FROM
    Where,    // WHERE
    Group,    // GROUP (parsed as GROUP BY)
    By,       // BY
    Having,   // HAVING
    Limit,    // LIMIT
    As,       // AS
    With,     // WITH

    // Literals and Identifiers
    Identifier, // Column names, stream names, function names
    String,     // String literals ('hello', "world")
    Number,     // Numeric literals (42, 3.14)
    Null,       // NULL
    True,       // TRUE
    False,      // FALSE

    // Punctuation
    LeftParen,  // (
    RightParen, // )
    Comma,      // ,
    Asterisk,   // * (wildcard or multiplication)
    Dot,        // . (nested field access)
    Semicolon,  // ;

    // Arithmetic Operators
    Plus,    // +
    Minus,   // -
    Divide,  // /
    Percent, // %
    Concat,  // ||

    // Comparison Operators
    Equal,              // =
    NotEqual,           // != or <>
    LessThan,           // <
    GreaterThan,        // >
    LessThanOrEqual,    // <=
    GreaterThanOrEqual, // >=

    // Conditional Keywords
    Case,    // CASE
    When,    // WHEN
    Then,    // THEN
    Else,    // ELSE
    End,     // END
    Is,      // IS
    In,      // IN
    Not,     // NOT
    Between, // BETWEEN
    Like,    // LIKE
    And,     // AND
    Or,      // OR

    Eof,
}

/// A token with its type, value, and position information.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Original text (unquoted for strings)
    pub value: String,
    /// Character offset of the first character in the SQL text
    pub position: usize,
}

static KEYWORDS: LazyLock<HashMap<&'static str, TokenType>> = LazyLock::new(|| {
    HashMap::from([
        ("SELECT", TokenType::Select),
        ("DISTINCT", TokenType::Distinct),
        ("FROM", TokenType::From),
        ("WHERE", TokenType::Where),
        ("GROUP", TokenType::Group),
        ("BY", TokenType::By),
        ("HAVING", TokenType::Having),
        ("LIMIT", TokenType::Limit),
        ("AS", TokenType::As),
        ("WITH", TokenType::With),
        ("NULL", TokenType::Null),
        ("TRUE", TokenType::True),
        ("FALSE", TokenType::False),
        ("CASE", TokenType::Case),
        ("WHEN", TokenType::When),
        ("THEN", TokenType::Then),
        ("ELSE", TokenType::Else),
        ("END", TokenType::End),
        ("IS", TokenType::Is),
        ("IN", TokenType::In),
        ("NOT", TokenType::Not),
        ("BETWEEN", TokenType::Between),
        ("LIKE", TokenType::Like),
        ("AND", TokenType::And),
        ("OR", TokenType::Or),
    ])
});

/// Tokenize SQL text into a vector of tokens terminated by [`TokenType::Eof`].
///
/// # Errors
/// Unexpected characters, unterminated strings and unterminated block comments.
pub fn tokenize(sql: &str) -> Result<Vec<Token>, SqlError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    let single = |token_type: TokenType, ch: char, position: usize| Token {
        token_type,
        value: ch.to_string(),
        position,
    };

    while pos < chars.len() {
        let ch = chars[pos];
        let next = chars.get(pos + 1).copied();
        match ch {
            ' ' | '\t' | '\n' | '\r' => pos += 1,
            '-' if next == Some('-') => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '/' if next == Some('*') => {
                let start = pos;
                pos += 2;
                loop {
                    if pos + 1 >= chars.len() {
                        return Err(SqlError::parse_error(
                            "Unterminated multi-line comment",
                            Some(start),
                        ));
                    }
                    if chars[pos] == '*' && chars[pos + 1] == '/' {
                        pos += 2;
                        break;
                    }
                    pos += 1;
                }
            }
            '(' => {
                tokens.push(single(TokenType::LeftParen, ch, pos));
                pos += 1;
            }
            ')' => {
                tokens.push(single(TokenType::RightParen, ch, pos));
                pos += 1;
            }
            ',' => {
                tokens.push(single(TokenType::Comma, ch, pos));
                pos += 1;
            }
            ';' => {
                tokens.push(single(TokenType::Semicolon, ch, pos));
                pos += 1;
            }
            '*' => {
                tokens.push(single(TokenType::Asterisk, ch, pos));
                pos += 1;
            }
            '.' => {
                tokens.push(single(TokenType::Dot, ch, pos));
                pos += 1;
            }
            '+' => {
                tokens.push(single(TokenType::Plus, ch, pos));
                pos += 1;
            }
            '-' => {
                tokens.push(single(TokenType::Minus, ch, pos));
                pos += 1;
            }
            '/' => {
                tokens.push(single(TokenType::Divide, ch, pos));
                pos += 1;
            }
            '%' => {
                tokens.push(single(TokenType::Percent, ch, pos));
                pos += 1;
            }
            '=' => {
                // Accept `==` as equality as well.
                let len = if next == Some('=') { 2 } else { 1 };
                tokens.push(Token {
                    token_type: TokenType::Equal,
                    value: "=".to_string(),
                    position: pos,
                });
                pos += len;
            }
            '<' => {
                let (token_type, value) = match next {
                    Some('=') => (TokenType::LessThanOrEqual, "<="),
                    Some('>') => (TokenType::NotEqual, "<>"),
                    _ => (TokenType::LessThan, "<"),
                };
                tokens.push(Token {
                    token_type,
                    value: value.to_string(),
                    position: pos,
                });
                pos += value.len();
            }
            '>' => {
                let (token_type, value) = match next {
                    Some('=') => (TokenType::GreaterThanOrEqual, ">="),
                    _ => (TokenType::GreaterThan, ">"),
                };
                tokens.push(Token {
                    token_type,
                    value: value.to_string(),
                    position: pos,
                });
                pos += value.len();
            }
            '!' => {
                if next != Some('=') {
                    return Err(SqlError::parse_error(
                        "Unexpected character '!' - did you mean '!='?",
                        Some(pos),
                    ));
                }
                tokens.push(Token {
                    token_type: TokenType::NotEqual,
                    value: "!=".to_string(),
                    position: pos,
                });
                pos += 2;
            }
            '|' => {
                if next != Some('|') {
                    return Err(SqlError::parse_error(
                        "Unexpected character '|' - did you mean '||' for concatenation?",
                        Some(pos),
                    ));
                }
                tokens.push(Token {
                    token_type: TokenType::Concat,
                    value: "||".to_string(),
                    position: pos,
                });
                pos += 2;
            }
            '\'' | '"' => {
                let (value, end) = read_quoted(&chars, pos)?;
                tokens.push(Token {
                    token_type: TokenType::String,
                    value,
                    position: pos,
                });
                pos = end;
            }
            '`' => {
                let (value, end) = read_quoted(&chars, pos)?;
                tokens.push(Token {
                    token_type: TokenType::Identifier,
                    value,
                    position: pos,
                });
                pos = end;
            }
            '0'..='9' => {
                let start = pos;
                let mut has_decimal = false;
                let mut has_exponent = false;
                while pos < chars.len() {
                    let c = chars[pos];
                    if c.is_ascii_digit() {
                        pos += 1;
                    } else if c == '.'
                        && !has_decimal
                        && !has_exponent
                        && chars.get(pos + 1).is_some_and(|d| d.is_ascii_digit())
                    {
                        has_decimal = true;
                        pos += 1;
                    } else if (c == 'e' || c == 'E') && !has_exponent {
                        has_exponent = true;
                        pos += 1;
                        if matches!(chars.get(pos), Some('+') | Some('-')) {
                            pos += 1;
                        }
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    token_type: TokenType::Number,
                    value: chars[start..pos].iter().collect(),
                    position: start,
                });
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                let value: String = chars[start..pos].iter().collect();
                let token_type = KEYWORDS
                    .get(value.to_uppercase().as_str())
                    .copied()
                    .unwrap_or(TokenType::Identifier);
                tokens.push(Token {
                    token_type,
                    value,
                    position: start,
                });
            }
            _ => {
                return Err(SqlError::parse_error(
                    format!("Unexpected character '{}' at position {}", ch, pos),
                    Some(pos),
                ));
            }
        }
    }

    tokens.push(Token {
        token_type: TokenType::Eof,
        value: String::new(),
        position: chars.len(),
    });

    Ok(tokens)
}

/// Read a quoted run starting at `start`; a doubled quote is an escaped quote.
fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize), SqlError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        if chars[pos] == quote {
            if chars.get(pos + 1) == Some(&quote) {
                value.push(quote);
                pos += 2;
                continue;
            }
            return Ok((value, pos + 1));
        }
        value.push(chars[pos]);
        pos += 1;
    }
    Err(SqlError::parse_error("Unterminated string literal", Some(start)))
}
