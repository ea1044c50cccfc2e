//! Edge condition expressions.
//!
//! A condition is a small boolean expression evaluated against the source
//! node's captured outputs:
//!
//! ```text
//! outputs.status == "ok" && outputs.count > 0
//! !outputs.dry_run
//! outputs.records
//! ```
//!
//! Paths read from the output map (the `outputs.` prefix is optional) and
//! bare paths test truthiness. Comparisons accept string, number, boolean,
//! and null literals; ordering comparisons are numeric only. Expressions
//! are parsed at compile time, so a malformed condition is a compilation
//! error rather than a runtime surprise.

use serde_json::Value;
use thiserror::Error;

use super::model::ConfigMap;

/// Error raised when a condition expression cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid condition '{expression}': {detail}")]
pub struct ConditionParseError {
    /// The rejected expression.
    pub expression: String,
    /// What was wrong with it.
    pub detail: String,
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Truthiness of the value at a path.
    Truthy(Vec<String>),
    /// Comparison of the value at a path against a literal.
    Compare {
        /// Path into the output map.
        path: Vec<String>,
        /// The operator.
        op: CompareOp,
        /// The right-hand literal.
        literal: Value,
    },
    /// Logical negation.
    Not(Box<Condition>),
    /// Conjunction.
    And(Box<Condition>, Box<Condition>),
    /// Disjunction.
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Parses an expression.
    pub fn parse(expression: &str) -> Result<Self, ConditionParseError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
        };
        let condition = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing input after expression"));
        }
        Ok(condition)
    }

    /// Evaluates the condition against an output map.
    #[must_use]
    pub fn evaluate(&self, outputs: &ConfigMap) -> bool {
        match self {
            Self::Truthy(path) => lookup(outputs, path).is_some_and(is_truthy),
            Self::Compare { path, op, literal } => {
                let Some(actual) = lookup(outputs, path) else {
                    // Missing values only satisfy inequality.
                    return *op == CompareOp::Ne;
                };
                compare(actual, *op, literal)
            }
            Self::Not(inner) => !inner.evaluate(outputs),
            Self::And(a, b) => a.evaluate(outputs) && b.evaluate(outputs),
            Self::Or(a, b) => a.evaluate(outputs) || b.evaluate(outputs),
        }
    }
}

fn lookup<'a>(outputs: &'a ConfigMap, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = outputs.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(actual: &Value, op: CompareOp, literal: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(actual, literal),
        CompareOp::Ne => !values_equal(actual, literal),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let (Some(a), Some(b)) = (actual.as_f64(), literal.as_f64()) else {
                return false;
            };
            match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq | CompareOp::Ne => unreachable!(),
            }
        }
    }
}

/// Equality with numeric coercion, so `1 == 1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return (x - y).abs() < f64::EPSILON;
    }
    a == b
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(Vec<String>),
    Literal(Value),
    Op(CompareOp),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ConditionParseError> {
    let err = |detail: String| ConditionParseError {
        expression: expression.to_string(),
        detail,
    };

    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(err("expected '&&'".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(err("expected '||'".to_string()));
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Eq));
                    i += 2;
                } else {
                    return Err(err("expected '=='".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Le));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(err("unterminated string literal".to_string()));
                }
                let s: String = chars[start..end].iter().collect();
                tokens.push(Token::Literal(Value::String(s)));
                i = end + 1;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == 'e')
                {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let number: serde_json::Number = raw
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .ok_or_else(|| err(format!("invalid number '{raw}'")))?;
                tokens.push(Token::Literal(Value::Number(number)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Literal(Value::Bool(true))),
                    "false" => tokens.push(Token::Literal(Value::Bool(false))),
                    "null" => tokens.push(Token::Literal(Value::Null)),
                    _ => {
                        let mut segments: Vec<String> =
                            word.split('.').map(ToString::to_string).collect();
                        // The canonical prefix is optional.
                        if segments.len() > 1 && segments[0] == "outputs" {
                            segments.remove(0);
                        }
                        if segments.iter().any(String::is_empty) {
                            return Err(err(format!("malformed path '{word}'")));
                        }
                        tokens.push(Token::Path(segments));
                    }
                }
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }

    if tokens.is_empty() {
        return Err(err("empty expression".to_string()));
    }
    Ok(tokens)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, detail: &str) -> ConditionParseError {
        ConditionParseError {
            expression: self.expression.to_string(),
            detail: detail.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<Condition, ConditionParseError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Condition, ConditionParseError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Condition, ConditionParseError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Condition, ConditionParseError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if self.advance() != Some(Token::RParen) {
                    return Err(self.error("missing ')'"));
                }
                Ok(inner)
            }
            Some(Token::Path(path)) => {
                if let Some(Token::Op(op)) = self.peek().cloned() {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Literal(literal)) => Ok(Condition::Compare {
                            path,
                            op,
                            literal,
                        }),
                        _ => Err(self.error("comparison needs a literal right-hand side")),
                    }
                } else {
                    Ok(Condition::Truthy(path))
                }
            }
            _ => Err(self.error("expected a path, literal, or '('")),
        }
    }
}
