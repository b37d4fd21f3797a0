use arrow::datatypes::{DataType, Schema, SchemaRef};
use vdb_common::ParseError;

use super::expr::{CmpOp, Expr, Literal};
use super::token::{tokenize, Keyword, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer { min: i64, max: i64 },
    Float,
    Text,
    Boolean,
    Other,
}

impl ColumnKind {
    fn of(dt: &DataType) -> ColumnKind {
        let int = |min: i64, max: i64| ColumnKind::Integer { min, max };
        match dt {
            DataType::Int8 => int(i8::MIN as i64, i8::MAX as i64),
            DataType::Int16 => int(i16::MIN as i64, i16::MAX as i64),
            DataType::Int32 => int(i32::MIN as i64, i32::MAX as i64),
            DataType::Int64 => int(i64::MIN, i64::MAX),
            DataType::UInt8 => int(0, u8::MAX as i64),
            DataType::UInt16 => int(0, u16::MAX as i64),
            DataType::UInt32 => int(0, u32::MAX as i64),
            DataType::UInt64 => int(0, i64::MAX),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnKind::Float,
            DataType::Utf8 | DataType::LargeUtf8 => ColumnKind::Text,
            DataType::Boolean => ColumnKind::Boolean,
            _ => ColumnKind::Other,
        }
    }
}

// literal as written, before coercion to the column type
enum RawLiteral<'t> {
    Number(&'t str),
    Str(&'t str),
    Bool(bool),
}

impl RawLiteral<'_> {
    fn describe(&self) -> String {
        match self {
            RawLiteral::Number(n) => format!("number {n}"),
            RawLiteral::Str(s) => format!("string '{s}'"),
            RawLiteral::Bool(b) => format!("boolean {b}"),
        }
    }
}

/// Deepest expression tree, and deepest `NOT`/parenthesis nesting, that
/// [`parse_filter`] accepts.
pub const MAX_DEPTH: usize = 256;

// expression and the depth of its tree
type Parsed = (Expr, usize);

/// Compiles filter text against a fixed schema.
#[derive(Debug, Clone)]
pub struct ExpressionBuilder {
    schema: SchemaRef,
}

impl ExpressionBuilder {
    pub fn new(schema: SchemaRef) -> Self {
        ExpressionBuilder { schema }
    }

    pub fn parse_filter(&self, filter: &str) -> Result<Expr, ParseError> {
        parse_filter(&self.schema, filter)
    }
}

/// Parse `filter` into an expression tree, resolving every column against `schema`.
pub fn parse_filter(schema: &Schema, filter: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(filter)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        schema,
        end: filter.len(),
        nesting: 0,
    };
    let (expr, _) = parser.parse_or()?;
    if let Some(t) = parser.peek() {
        let message = if t.kind == TokenKind::RParen {
            "unmatched ')'".to_string()
        } else {
            format!("unexpected trailing token '{}'", t.text)
        };
        return Err(ParseError::syntax(message, t.position));
    }
    Ok(expr)
}

struct Parser<'s> {
    tokens: Vec<Token>,
    pos: usize,
    schema: &'s Schema,
    end: usize, // position reported for errors at end of input
    nesting: usize,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, kw: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(kw))
    }

    fn peek_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn here(&self) -> usize {
        self.peek().map_or(self.end, |t| t.position)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(t) => ParseError::syntax(format!("expected {expected}, got '{}'", t.text), t.position),
            None => ParseError::syntax(format!("expected {expected}, got end of input"), self.end),
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(t) if t.kind == kind => {
                let t = t.clone();
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, expected: &str) -> Result<(), ParseError> {
        if self.peek_keyword(kw) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn too_deep(position: usize) -> ParseError {
        ParseError::syntax(format!("expression nested deeper than {MAX_DEPTH} levels"), position)
    }

    fn check_depth(depth: usize, position: usize) -> Result<usize, ParseError> {
        if depth > MAX_DEPTH {
            return Err(Self::too_deep(position));
        }
        Ok(depth)
    }

    fn enter(&mut self, position: usize) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(Self::too_deep(position));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut depth) = self.parse_and()?;
        while self.peek_keyword(Keyword::Or) {
            let at = self.here();
            self.pos += 1;
            let (right, right_depth) = self.parse_and()?;
            depth = Self::check_depth(1 + depth.max(right_depth), at)?;
            left = Expr::or(left, right);
        }
        Ok((left, depth))
    }

    fn parse_and(&mut self) -> Result<Parsed, ParseError> {
        let (mut left, mut depth) = self.parse_not()?;
        while self.peek_keyword(Keyword::And) {
            let at = self.here();
            self.pos += 1;
            let (right, right_depth) = self.parse_not()?;
            depth = Self::check_depth(1 + depth.max(right_depth), at)?;
            left = Expr::and(left, right);
        }
        Ok((left, depth))
    }

    fn parse_not(&mut self) -> Result<Parsed, ParseError> {
        if self.peek_keyword(Keyword::Not) {
            let at = self.here();
            self.pos += 1;
            self.enter(at)?;
            let (inner, depth) = self.parse_not()?;
            self.nesting -= 1;
            return Ok((Expr::not(inner), Self::check_depth(depth + 1, at)?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Parsed, ParseError> {
        if self.peek_kind(TokenKind::LParen) {
            let open = self.here();
            self.pos += 1;
            self.enter(open)?;
            let inner = self.parse_or()?;
            if !self.peek_kind(TokenKind::RParen) {
                return Err(match self.peek() {
                    Some(_) => self.unexpected("')'"),
                    None => ParseError::syntax("unmatched '('", open),
                });
            }
            self.pos += 1;
            self.nesting -= 1;
            return Ok(inner);
        }
        // NOT IN wraps the membership test
        let expr = self.parse_predicate()?;
        let depth = if matches!(expr, Expr::Not(_)) { 2 } else { 1 };
        Ok((expr, depth))
    }

    fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        let col_tok = self.expect_kind(TokenKind::Identifier, "column name")?;
        let kind = self.resolve(&col_tok)?;
        let column = col_tok.text;

        // IS [NOT] NULL
        if self.peek_keyword(Keyword::Is) {
            self.pos += 1;
            let negated = self.peek_keyword(Keyword::Not);
            if negated {
                self.pos += 1;
            }
            self.expect_keyword(Keyword::Null, "NULL")?;
            return Ok(Expr::NullCheck { negated, column });
        }

        let negated = self.peek_keyword(Keyword::Not);
        if negated {
            self.pos += 1;
        }
        if self.peek_keyword(Keyword::Like) {
            let like_pos = self.here();
            self.pos += 1;
            if matches!(kind, ColumnKind::Boolean | ColumnKind::Other) {
                return Err(ParseError::TypeMismatch {
                    column,
                    expected: "a column with a text form".into(),
                    found: "LIKE pattern".into(),
                    position: like_pos,
                });
            }
            let pattern = self.expect_kind(TokenKind::String, "string pattern after LIKE")?;
            return Ok(Expr::Like { negated, column, pattern: pattern.text });
        }
        if self.peek_keyword(Keyword::In) {
            let in_pos = self.here();
            self.pos += 1;
            let values = self.parse_list(&column, kind, in_pos)?;
            let membership = Expr::Membership { column, values };
            return Ok(if negated { Expr::not(membership) } else { membership });
        }
        if negated {
            return Err(self.unexpected("LIKE or IN after NOT"));
        }

        let op = match self.peek() {
            Some(t) if t.kind == TokenKind::Operator => CmpOp::from_symbol(&t.text),
            _ => None,
        };
        let Some(op) = op else {
            return Err(self.unexpected("comparison operator, LIKE, IN or IS"));
        };
        self.pos += 1;
        let literal = self.parse_literal(&column, kind)?;
        Ok(Expr::Comparison { op, column, literal })
    }

    fn parse_list(&mut self, column: &str, kind: ColumnKind, in_pos: usize) -> Result<Vec<Literal>, ParseError> {
        let close = if self.peek_kind(TokenKind::LParen) {
            TokenKind::RParen
        } else if self.peek_kind(TokenKind::LBracket) {
            TokenKind::RBracket
        } else {
            return Err(self.unexpected("'(' after IN"));
        };
        self.pos += 1;
        if self.peek_kind(close) {
            return Err(ParseError::EmptyInList { column: column.to_string(), position: in_pos });
        }
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal(column, kind)?);
            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => self.pos += 1,
                Some(t) if t.kind == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected("',' or end of IN list")),
            }
        }
        Ok(values)
    }

    fn parse_literal(&mut self, column: &str, kind: ColumnKind) -> Result<Literal, ParseError> {
        let position = self.here();
        let tok = match self.peek() {
            Some(t) if matches!(t.kind, TokenKind::Number | TokenKind::String) => t,
            Some(t) if t.is_keyword(Keyword::True) || t.is_keyword(Keyword::False) => t,
            _ => return Err(self.unexpected("literal value")),
        };
        let raw = match tok.kind {
            TokenKind::Number => RawLiteral::Number(&tok.text),
            TokenKind::String => RawLiteral::Str(&tok.text),
            _ => RawLiteral::Bool(tok.is_keyword(Keyword::True)),
        };
        let literal = coerce(raw, kind).map_err(|(expected, found)| ParseError::TypeMismatch {
            column: column.to_string(),
            expected,
            found,
            position,
        })?;
        self.pos += 1;
        Ok(literal)
    }

    fn resolve(&self, tok: &Token) -> Result<ColumnKind, ParseError> {
        match self.schema.field_with_name(&tok.text) {
            Ok(field) => Ok(ColumnKind::of(field.data_type())),
            Err(_) => Err(ParseError::UnknownColumn {
                column: tok.text.clone(),
                position: tok.position,
            }),
        }
    }
}

fn is_float_text(n: &str) -> bool {
    n.contains(['.', 'e', 'E'])
}

// overflowing text such as 1e999 has no canonical spelling
fn parse_finite(n: &str) -> Option<f64> {
    n.parse::<f64>().ok().filter(|v| v.is_finite())
}

// Err carries (expected, found) descriptions
fn coerce(raw: RawLiteral<'_>, kind: ColumnKind) -> Result<Literal, (String, String)> {
    let mismatch = |expected: &str, raw: &RawLiteral<'_>| Err((expected.to_string(), raw.describe()));
    match (kind, &raw) {
        (ColumnKind::Integer { min, max }, RawLiteral::Number(n)) if !is_float_text(n) => {
            match n.parse::<i64>() {
                Ok(v) if v >= min && v <= max => Ok(Literal::Int(v)),
                _ => Err((format!("integer in {min}..={max}"), raw.describe())),
            }
        }
        (ColumnKind::Integer { .. }, _) => mismatch("integer", &raw),
        (ColumnKind::Float, RawLiteral::Number(n)) => parse_finite(n)
            .map(Literal::Float)
            .ok_or_else(|| ("finite floating point number".to_string(), raw.describe())),
        (ColumnKind::Float, _) => mismatch("floating point number", &raw),
        (ColumnKind::Text, RawLiteral::Str(s)) => Ok(Literal::Str(s.to_string())),
        // numbers against text columns compare with the value's text form
        (ColumnKind::Text, RawLiteral::Number(n)) if is_float_text(n) => parse_finite(n)
            .map(Literal::Float)
            .ok_or_else(|| ("string or finite number".to_string(), raw.describe())),
        (ColumnKind::Text, RawLiteral::Number(n)) => n
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| ("string".to_string(), raw.describe())),
        (ColumnKind::Text, RawLiteral::Bool(_)) => mismatch("string", &raw),
        (ColumnKind::Boolean, RawLiteral::Bool(b)) => Ok(Literal::Bool(*b)),
        (ColumnKind::Boolean, _) => mismatch("TRUE or FALSE", &raw),
        (ColumnKind::Other, _) => mismatch("no literal (column is not comparable)", &raw),
    }
}
