/*!
# Streaming SQL Abstract Syntax Tree (AST)

Structured description of a continuous query: projected fields, source, optional
WHERE/GROUP BY/HAVING, at most one window, and the event-time settings of the
`WITH (...)` clause.

## Example Queries

```sql
-- Row-level filter and projection
SELECT device_id, temperature * 1.8 + 32 AS temp_f FROM sensors WHERE temperature > 30

-- Counting window per device with a HAVING filter
SELECT device_id,
       COUNT(CASE WHEN temperature > 30 THEN 1 ELSE NULL END) AS hot_count
FROM sensors
GROUP BY device_id, CountingWindow(10)
HAVING hot_count >= 2

-- Event-time tumbling window
SELECT device_id, AVG(temperature) AS avg_temp, window_start() AS ws
FROM sensors
GROUP BY device_id, TumblingWindow('5s')
WITH (TIMESTAMP='ts', TIMEUNIT='ms')
```
*/

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A parsed continuous SELECT query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamingQuery {
    pub fields: Vec<SelectField>,
    pub distinct: bool,
    pub from: String,
    pub where_clause: Option<Expr>,
    /// GROUP BY expressions, window pseudo-call removed
    pub group_by: Vec<Expr>,
    pub window: Option<WindowSpec>,
    pub having: Option<Expr>,
    pub limit: Option<u64>,
    /// `WITH (KEY='value', ...)` properties, keys upper-cased
    pub properties: HashMap<String, String>,
}

impl StreamingQuery {
    /// Event-time field named by `WITH (TIMESTAMP='...')`.
    pub fn timestamp_field(&self) -> Option<&str> {
        self.properties.get("TIMESTAMP").map(String::as_str)
    }

    /// Unit named by `WITH (TIMEUNIT='...')`.
    pub fn time_unit(&self) -> Option<&str> {
        self.properties.get("TIMEUNIT").map(String::as_str)
    }

    /// True when SELECT or HAVING contains an aggregate call according to `is_aggregate`.
    pub fn has_aggregates(&self, is_aggregate: &dyn Fn(&str) -> bool) -> bool {
        let in_fields = self.fields.iter().any(|field| match field {
            SelectField::Expression { expr, .. } => expr.contains_aggregate(is_aggregate),
            SelectField::Wildcard => false,
        });
        in_fields
            || self
                .having
                .as_ref()
                .is_some_and(|h| h.contains_aggregate(is_aggregate))
    }
}

/// Field selection in SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub enum SelectField {
    /// Expression with optional alias: expr [AS alias]
    Expression { expr: Expr, alias: Option<String> },
    /// Wildcard selection: *
    Wildcard,
}

impl SelectField {
    /// Output column name: the alias, or the rendered expression.
    pub fn output_name(&self) -> String {
        match self {
            SelectField::Expression {
                alias: Some(alias), ..
            } => alias.clone(),
            SelectField::Expression { expr, alias: None } => expr.default_name(),
            SelectField::Wildcard => "*".to_string(),
        }
    }
}

/// Window policy taken from a GROUP BY pseudo-call.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSpec {
    /// `TumblingWindow('5s')`
    Tumbling { size: Duration },
    /// `SlidingWindow('30s', '10s')`
    Sliding { size: Duration, slide: Duration },
    /// `CountingWindow(100)`
    Counting { count: u64 },
    /// `SessionWindow('5m')`
    Session { gap: Duration },
}

impl WindowSpec {
    pub fn window_type(&self) -> &'static str {
        match self {
            WindowSpec::Tumbling { .. } => "TUMBLING",
            WindowSpec::Sliding { .. } => "SLIDING",
            WindowSpec::Counting { .. } => "COUNTING",
            WindowSpec::Session { .. } => "SESSION",
        }
    }

    /// Time-based windows close on the clock or the watermark.
    pub fn is_time_based(&self) -> bool {
        !matches!(self, WindowSpec::Counting { .. })
    }
}

/// SQL expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, possibly dotted (`device.info.name`)
    Column(String),
    /// Literal values
    Literal(LiteralValue),
    /// Binary operations: expr op expr
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// Unary operations: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },
    /// Function calls: func_name(args...). `COUNT(*)` has no arguments.
    Function { name: String, args: Vec<Expr> },
    /// CASE expressions.
    ///
    /// `operand` is the subject of a simple CASE; searched CASE has none.
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    /// List expressions for IN operators: (expr1, expr2, expr3)
    List(Vec<Expr>),
    /// BETWEEN expressions: expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// Finalized aggregate slot, inserted by the planner
    AggregateRef(usize),
}

/// Literal values in SQL
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

/// Time units accepted by `WITH (TIMEUNIT='...')`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Parse the unit codes used in WITH clauses (`ns`, `us`, `ms`, `ss`, `mi`, `hh`, `dd`).
    pub fn parse(code: &str) -> Option<TimeUnit> {
        match code.trim().to_lowercase().as_str() {
            "ns" | "nanosecond" | "nanoseconds" => Some(TimeUnit::Nanosecond),
            "us" | "µs" | "microsecond" | "microseconds" => Some(TimeUnit::Microsecond),
            "ms" | "millisecond" | "milliseconds" => Some(TimeUnit::Millisecond),
            "ss" | "s" | "second" | "seconds" => Some(TimeUnit::Second),
            "mi" | "m" | "minute" | "minutes" => Some(TimeUnit::Minute),
            "hh" | "h" | "hour" | "hours" => Some(TimeUnit::Hour),
            "dd" | "d" | "day" | "days" => Some(TimeUnit::Day),
            _ => None,
        }
    }

    /// Convert an amount in this unit to milliseconds.
    pub fn to_millis(self, amount: f64) -> f64 {
        match self {
            TimeUnit::Nanosecond => amount / 1_000_000.0,
            TimeUnit::Microsecond => amount / 1_000.0,
            TimeUnit::Millisecond => amount,
            TimeUnit::Second => amount * 1_000.0,
            TimeUnit::Minute => amount * 60_000.0,
            TimeUnit::Hour => amount * 3_600_000.0,
            TimeUnit::Day => amount * 86_400_000.0,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,

    // String operations
    Like,
    NotLike,
    Concat,

    // Set operations
    In,
    NotIn,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::NotLike => "NOT LIKE",
            BinaryOperator::Concat => "||",
            BinaryOperator::In => "IN",
            BinaryOperator::NotIn => "NOT IN",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
    IsNull,
    IsNotNull,
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// Name used for an unaliased SELECT item.
    pub fn default_name(&self) -> String {
        match self {
            Expr::Column(name) => name.clone(),
            other => other.to_string(),
        }
    }

    /// Call `visit` on this node and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::AggregateRef(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::UnaryOp { expr, .. } => expr.walk(visit),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    operand.walk(visit);
                }
                for (when, then) in when_clauses {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(else_expr) = else_clause {
                    else_expr.walk(visit);
                }
            }
            Expr::List(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
        }
    }

    /// True if any function call in the tree is an aggregate.
    pub fn contains_aggregate(&self, is_aggregate: &dyn Fn(&str) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if let Expr::Function { name, .. } = node {
                if is_aggregate(name) {
                    found = true;
                }
            }
        });
        found
    }

    /// Nesting depth of CASE expressions (0 when there is no CASE).
    pub fn case_depth(&self) -> usize {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::AggregateRef(_) => 0,
            Expr::BinaryOp { left, right, .. } => left.case_depth().max(right.case_depth()),
            Expr::UnaryOp { expr, .. } => expr.case_depth(),
            Expr::Function { args: items, .. } | Expr::List(items) => {
                items.iter().map(Expr::case_depth).max().unwrap_or(0)
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.case_depth().max(low.case_depth()).max(high.case_depth()),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let mut inner = operand.as_deref().map(Expr::case_depth).unwrap_or(0);
                for (when, then) in when_clauses {
                    inner = inner.max(when.case_depth()).max(then.case_depth());
                }
                if let Some(else_expr) = else_clause {
                    inner = inner.max(else_expr.case_depth());
                }
                inner + 1
            }
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            LiteralValue::Integer(i) => write!(f, "{}", i),
            LiteralValue::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            LiteralValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            LiteralValue::Null => write!(f, "NULL"),
        }
    }
}

/// Renders the expression back to SQL text that parses to the same tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => write!(f, "(NOT {})", expr),
                UnaryOperator::Minus => write!(f, "(-{})", expr),
                UnaryOperator::Plus => write!(f, "(+{})", expr),
                UnaryOperator::IsNull => write!(f, "({} IS NULL)", expr),
                UnaryOperator::IsNotNull => write!(f, "({} IS NOT NULL)", expr),
            },
            Expr::Function { name, args } => {
                if args.is_empty() && name.eq_ignore_ascii_case("COUNT") {
                    return write!(f, "{}(*)", name);
                }
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in when_clauses {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(else_expr) = else_clause {
                    write!(f, " ELSE {}", else_expr)?;
                }
                write!(f, " END")
            }
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({} {}BETWEEN {} AND {})", expr, not, low, high)
            }
            Expr::AggregateRef(slot) => write!(f, "$agg{}", slot),
        }
    }
}
