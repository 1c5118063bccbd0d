//! Lexer, parser, and evaluator for predicate expressions
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! pipe    := or ( "|" "not" )*
//! or      := and ( "or" and )*
//! and     := cmp ( "and" cmp )*
//! cmp     := primary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") primary )?
//! primary := path | literal | "(" pipe ")"
//! path    := "." ( IDENT | STRING | "[" (STRING | NUMBER) "]" )?
//!            ( "." (IDENT | STRING) | "[" (STRING | NUMBER) "]" )*
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::PredicateError;

// =============================================================================
// AST
// =============================================================================

/// One step of a path
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Segment {
    Key(String),
    Index(i64),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, ".{}", k),
            Self::Index(i) => write!(f, "[{}]", i),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Path(Vec<Segment>),
    Literal(Value),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Pipe,
    Op(CmpOp),
    Ident(String),
    Str(String),
    Num(f64),
}

fn syntax(expression: &str, message: impl Into<String>) -> PredicateError {
    PredicateError::Syntax {
        expression: expression.to_string(),
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, PredicateError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, next_is_eq) {
                    ('=', true) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    ('<', true) => CmpOp::Le,
                    ('>', true) => CmpOp::Ge,
                    ('<', false) => CmpOp::Lt,
                    ('>', false) => CmpOp::Gt,
                    _ => return Err(syntax(src, format!("unexpected '{}' at {}", c, i))),
                };
                tokens.push(Token::Op(op));
                i += if next_is_eq { 2 } else { 1 };
            }
            '"' => {
                let start = i;
                i += 1;
                let mut escaped = false;
                while i < chars.len() {
                    match chars[i] {
                        '\\' if !escaped => escaped = true,
                        '"' if !escaped => break,
                        _ => escaped = false,
                    }
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(syntax(src, "unterminated string literal"));
                }
                let literal: String = chars[start..=i].iter().collect();
                let value: String = serde_json::from_str(&literal)
                    .map_err(|e| syntax(src, format!("invalid string literal {}: {}", literal, e)))?;
                tokens.push(Token::Str(value));
                i += 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
                        || matches!(chars[i], 'e' | 'E'))
                {
                    // exponent sign: 1e+5, 2E-3
                    if matches!(chars[i], 'e' | 'E') && matches!(chars.get(i + 1), Some('+' | '-')) {
                        i += 1;
                    }
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value: f64 = literal
                    .parse()
                    .map_err(|_| syntax(src, format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(syntax(src, format!("unexpected '{}' at {}", other, i))),
        }
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Self, PredicateError> {
        Ok(Self {
            src,
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == keyword)
    }

    fn error(&self, message: impl Into<String>) -> PredicateError {
        syntax(self.src, message)
    }

    fn finish(&self) -> Result<(), PredicateError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected trailing {:?}", token))),
        }
    }

    fn parse_pipe(&mut self) -> Result<Expr, PredicateError> {
        let mut expr = self.parse_or()?;
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            match self.next() {
                Some(Token::Ident(w)) if w == "not" => expr = Expr::Not(Box::new(expr)),
                other => {
                    return Err(self.error(format!("expected 'not' after '|', found {:?}", other)))
                }
            }
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, PredicateError> {
        let mut expr = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, PredicateError> {
        let mut expr = self.parse_cmp()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.parse_cmp()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_cmp(&mut self) -> Result<Expr, PredicateError> {
        let lhs = self.parse_primary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_primary()?;
            return Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, PredicateError> {
        match self.next() {
            Some(Token::Dot) => self.parse_path_after_dot().map(Expr::Path),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(number(n))),
            Some(Token::Ident(w)) => match w.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                other => Err(self.error(format!("unexpected identifier '{}'", other))),
            },
            Some(Token::LParen) => {
                let expr = self.parse_pipe()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    other => Err(self.error(format!("expected ')', found {:?}", other))),
                }
            }
            other => Err(self.error(format!("unexpected {:?}", other))),
        }
    }

    /// Parse the segments of a path whose leading `.` was already consumed
    fn parse_path_after_dot(&mut self) -> Result<Vec<Segment>, PredicateError> {
        let mut segments = Vec::new();

        match self.peek() {
            Some(Token::Ident(_)) | Some(Token::Str(_)) => {
                segments.push(self.parse_key()?);
            }
            Some(Token::LBracket) => {
                segments.push(self.parse_bracket()?);
            }
            _ => return Ok(segments),
        }

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.peek() {
                        Some(Token::LBracket) => segments.push(self.parse_bracket()?),
                        _ => segments.push(self.parse_key()?),
                    }
                }
                Some(Token::LBracket) => segments.push(self.parse_bracket()?),
                _ => return Ok(segments),
            }
        }
    }

    fn parse_key(&mut self) -> Result<Segment, PredicateError> {
        match self.next() {
            Some(Token::Ident(k)) | Some(Token::Str(k)) => Ok(Segment::Key(k)),
            other => Err(self.error(format!("expected field name, found {:?}", other))),
        }
    }

    fn parse_bracket(&mut self) -> Result<Segment, PredicateError> {
        self.pos += 1;
        let segment = match self.next() {
            Some(Token::Str(k)) => Segment::Key(k),
            Some(Token::Num(n)) if n.fract() == 0.0 => Segment::Index(n as i64),
            other => {
                return Err(self.error(format!(
                    "expected string or integer index, found {:?}",
                    other
                )))
            }
        };
        match self.next() {
            Some(Token::RBracket) => Ok(segment),
            other => Err(self.error(format!("expected ']', found {:?}", other))),
        }
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Parse a full predicate expression
pub(crate) fn parse(src: &str) -> Result<Expr, PredicateError> {
    let mut parser = Parser::new(src)?;
    if parser.peek().is_none() {
        return Err(syntax(src, "empty expression"));
    }
    let expr = parser.parse_pipe()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a bare path such as `.body.items[0].id`
pub(crate) fn parse_path(src: &str) -> Result<Vec<Segment>, PredicateError> {
    let mut parser = Parser::new(src)?;
    match parser.next() {
        Some(Token::Dot) => {}
        other => return Err(syntax(src, format!("path must start with '.', found {:?}", other))),
    }
    let segments = parser.parse_path_after_dot()?;
    parser.finish()?;
    Ok(segments)
}

// =============================================================================
// Evaluation
// =============================================================================

fn render_path(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return ".".to_string();
    }
    segments.iter().map(ToString::to_string).collect()
}

/// Resolve a path, returning `None` when any step does not exist
pub(crate) fn lookup<'v>(segments: &[Segment], root: &'v Value) -> Option<&'v Value> {
    segments.iter().try_fold(root, |current, segment| match segment {
        Segment::Key(key) => current.as_object()?.get(key),
        Segment::Index(index) => {
            let items = current.as_array()?;
            let resolved = if *index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                *index as usize
            };
            items.get(resolved)
        }
    })
}

pub(crate) fn evaluate(expr: &Expr, ctx: &Value) -> Result<Value, PredicateError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(segments) => lookup(segments, ctx)
            .cloned()
            .ok_or_else(|| PredicateError::MissingPath {
                path: render_path(segments),
            }),
        Expr::Compare(lhs, op, rhs) => {
            let lhs = evaluate(lhs, ctx)?;
            let rhs = evaluate(rhs, ctx)?;
            compare(&lhs, *op, &rhs).map(Value::Bool)
        }
        Expr::And(lhs, rhs) => {
            if !as_bool(&evaluate(lhs, ctx)?, "and")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(&evaluate(rhs, ctx)?, "and")?))
        }
        Expr::Or(lhs, rhs) => {
            if as_bool(&evaluate(lhs, ctx)?, "or")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(&evaluate(rhs, ctx)?, "or")?))
        }
        Expr::Not(inner) => Ok(Value::Bool(!as_bool(&evaluate(inner, ctx)?, "not")?)),
    }
}

fn as_bool(value: &Value, operator: &str) -> Result<bool, PredicateError> {
    value.as_bool().ok_or_else(|| PredicateError::Type {
        message: format!("'{}' requires booleans, got {}", operator, type_name(value)),
    })
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> Result<bool, PredicateError> {
    match op {
        CmpOp::Eq => Ok(values_equal(lhs, rhs)),
        CmpOp::Ne => Ok(!values_equal(lhs, rhs)),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = order(lhs, rhs)?;
            Ok(match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn order(lhs: &Value, rhs: &Value) -> Result<Ordering, PredicateError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .ok_or_else(|| PredicateError::Type {
                message: "numbers are not comparable".to_string(),
            }),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(PredicateError::Type {
            message: format!(
                "cannot order {} against {}",
                type_name(lhs),
                type_name(rhs)
            ),
        }),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
