use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub(crate) fn from_symbol(s: &str) -> Option<CmpOp> {
        Some(match s {
            "=" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => return None,
        })
    }
}

/// A literal already coerced to the referenced column's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            // Debug keeps a '.' or exponent so the text re-lexes as a float
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "''")),
            Literal::Bool(true) => f.write_str("TRUE"),
            Literal::Bool(false) => f.write_str("FALSE"),
        }
    }
}

/// Parsed filter. `And`/`Or` chains are left-leaning: `a AND b AND c` is
/// `And(And(a, b), c)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Comparison {
        op: CmpOp,
        column: String,
        literal: Literal,
    },
    Like {
        negated: bool,
        column: String,
        pattern: String,
    },
    Membership {
        column: String,
        values: Vec<Literal>,
    },
    NullCheck {
        negated: bool,
        column: String,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expr) -> Expr {
        Expr::Not(Box::new(operand))
    }

    /// Column names referenced by the expression, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Comparison { column, .. }
            | Expr::Like { column, .. }
            | Expr::Membership { column, .. }
            | Expr::NullCheck { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Expr::Not(inner) => inner.collect_columns(out),
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
        }
    }

    // writes the operands of a same-operator chain; only the left spine is flattened
    fn fmt_chain(&self, f: &mut fmt::Formatter<'_>, is_and: bool) -> fmt::Result {
        let (left, right, word) = match self {
            Expr::And(l, r) => (l, r, " AND "),
            Expr::Or(l, r) => (l, r, " OR "),
            _ => return write!(f, "{self}"),
        };
        match (left.as_ref(), is_and) {
            (Expr::And(..), true) | (Expr::Or(..), false) => left.fmt_chain(f, is_and)?,
            _ => write!(f, "{left}")?,
        }
        f.write_str(word)?;
        write!(f, "{right}")
    }
}

/// Canonical form: keywords uppercased, every AND/OR group parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Comparison { op, column, literal } => {
                write!(f, "{column} {} {literal}", op.symbol())
            }
            Expr::Like { negated, column, pattern } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{column} {not}LIKE {}", Literal::Str(pattern.clone()))
            }
            Expr::Membership { column, values } => {
                write!(f, "{column} IN [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Expr::NullCheck { negated, column } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{column} IS {not}NULL")
            }
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::And(..) => {
                f.write_str("(")?;
                self.fmt_chain(f, true)?;
                f.write_str(")")
            }
            Expr::Or(..) => {
                f.write_str("(")?;
                self.fmt_chain(f, false)?;
                f.write_str(")")
            }
        }
    }
}
