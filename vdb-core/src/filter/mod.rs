//! Filter compiler: SQL-`WHERE`-like text to a typed, schema-checked [`Expr`].
//!
//! ```text
//! expr      := or_expr
//! or_expr   := and_expr (OR and_expr)*
//! and_expr  := not_expr (AND not_expr)*
//! not_expr  := NOT not_expr | primary
//! primary   := "(" expr ")" | predicate
//! predicate := column cmp_op literal
//!            | column [NOT] LIKE string
//!            | column [NOT] IN ( "(" literal, ... ")" | "[" literal, ... "]" )
//!            | column IS [NOT] NULL
//! ```
//!
//! The `Display` impl of [`Expr`] is the canonical form; parsing it again
//! yields the same tree. Input nested deeper than [`MAX_DEPTH`] is a syntax
//! error.

pub mod eval;
pub mod expr;
pub mod parser;
pub mod token;

pub use eval::filter_batch;
pub use expr::{CmpOp, Expr, Literal};
pub use parser::{parse_filter, ExpressionBuilder, MAX_DEPTH};
pub use token::{tokenize, Keyword, Token, TokenKind};
