use arrow::array::{Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use regex::Regex;
use vdb_common::{Result, VdbError};

use super::expr::{CmpOp, Expr, Literal};

impl Expr {
    /// Selection mask over `batch`. The mask never contains nulls: a NULL
    /// value fails every comparison, LIKE and IN, and `NOT` inverts the
    /// collapsed result.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        match self {
            Expr::And(a, b) => Ok(arrow::compute::and(&a.evaluate(batch)?, &b.evaluate(batch)?)?),
            Expr::Or(a, b) => Ok(arrow::compute::or(&a.evaluate(batch)?, &b.evaluate(batch)?)?),
            Expr::Not(inner) => Ok(arrow::compute::not(&inner.evaluate(batch)?)?),
            Expr::NullCheck { negated, column } => {
                let arr = column_of(batch, column)?;
                if *negated {
                    Ok(arrow::compute::is_not_null(arr.as_ref())?)
                } else {
                    Ok(arrow::compute::is_null(arr.as_ref())?)
                }
            }
            Expr::Comparison { op, column, literal } => {
                let arr = column_of(batch, column)?;
                compare_column(&arr, |v| v.compare(*op, literal))
            }
            Expr::Membership { column, values } => {
                let arr = column_of(batch, column)?;
                compare_column(&arr, |v| values.iter().any(|lit| v.compare(CmpOp::Eq, lit)))
            }
            Expr::Like { negated, column, pattern } => {
                let arr = column_of(batch, column)?;
                let re = like_regex(pattern)?;
                // a NULL never matches, with or without NOT
                compare_column(&arr, |v| re.is_match(&v.text()) != *negated)
            }
        }
    }
}

/// Keep the rows of `batch` selected by `expr`.
pub fn filter_batch(batch: &RecordBatch, expr: &Expr) -> Result<RecordBatch> {
    let mask = expr.evaluate(batch)?;
    Ok(filter_record_batch(batch, &mask)?)
}

fn column_of(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    let idx = batch.schema().index_of(name)?;
    Ok(batch.column(idx).clone())
}

// one non-null cell, widened to a small set of physical types
enum Cell<'a> {
    Int(i64),
    Float(f64),
    Str(&'a str),
    Bool(bool),
}

impl Cell<'_> {
    fn text(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Str(s) => s.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    fn compare(&self, op: CmpOp, lit: &Literal) -> bool {
        use std::cmp::Ordering;
        let ord = match (self, lit) {
            (Cell::Int(v), Literal::Int(l)) => Some(v.cmp(l)),
            (Cell::Int(v), Literal::Float(l)) => (*v as f64).partial_cmp(l),
            (Cell::Float(v), Literal::Float(l)) => v.partial_cmp(l),
            (Cell::Float(v), Literal::Int(l)) => v.partial_cmp(&(*l as f64)),
            (Cell::Str(v), Literal::Str(l)) => Some((*v).cmp(l.as_str())),
            (Cell::Str(v), Literal::Int(l)) => Some((*v).cmp(l.to_string().as_str())),
            (Cell::Str(v), Literal::Float(l)) => Some((*v).cmp(l.to_string().as_str())),
            (Cell::Bool(v), Literal::Bool(l)) => Some(v.cmp(l)),
            _ => None,
        };
        match ord {
            None => false,
            Some(ord) => match op {
                CmpOp::Eq => ord == Ordering::Equal,
                CmpOp::Ne => ord != Ordering::Equal,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
            },
        }
    }
}

fn compare_column(arr: &ArrayRef, pred: impl Fn(Cell<'_>) -> bool) -> Result<BooleanArray> {
    let n = arr.len();
    let mut b = BooleanBuilder::with_capacity(n);
    match arr.data_type() {
        dt if dt.is_integer() => {
            let widened = cast(arr, &DataType::Int64)?;
            let a = downcast::<Int64Array>(&widened)?;
            for i in 0..n {
                b.append_value(!a.is_null(i) && pred(Cell::Int(a.value(i))));
            }
        }
        dt if dt.is_floating() => {
            let widened = cast(arr, &DataType::Float64)?;
            let a = downcast::<Float64Array>(&widened)?;
            for i in 0..n {
                b.append_value(!a.is_null(i) && pred(Cell::Float(a.value(i))));
            }
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let narrowed = cast(arr, &DataType::Utf8)?;
            let a = downcast::<StringArray>(&narrowed)?;
            for i in 0..n {
                b.append_value(!a.is_null(i) && pred(Cell::Str(a.value(i))));
            }
        }
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(arr)?;
            for i in 0..n {
                b.append_value(!a.is_null(i) && pred(Cell::Bool(a.value(i))));
            }
        }
        other => {
            return Err(VdbError::Other(format!("cannot evaluate predicates on {other} columns")))
        }
    }
    Ok(b.finish())
}

fn downcast<T: 'static>(arr: &ArrayRef) -> Result<&T> {
    arr.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| VdbError::Other(format!("unexpected array type {}", arr.data_type())))
}

// SQL LIKE: % = any run, _ = one char, everything else literal
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?s)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                re.push_str(&regex::escape(&std::mem::take(&mut literal)));
                re.push_str(if c == '%' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    re.push_str(&regex::escape(&literal));
    re.push('$');
    Regex::new(&re).map_err(|e| VdbError::Other(format!("bad LIKE pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use arrow::array::{Float32Array, Int32Array};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float32, true),
            Field::new("active", DataType::Boolean, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![Some(1), Some(2), None, Some(4)])),
                Arc::new(StringArray::from(vec![Some("alpha"), Some("beta"), Some("gamma"), None])),
                Arc::new(Float32Array::from(vec![Some(0.5), None, Some(2.5), Some(10.0)])),
                Arc::new(BooleanArray::from(vec![Some(true), Some(false), None, Some(true)])),
            ],
        )
        .unwrap()
    }

    fn selected(filter: &str) -> Vec<bool> {
        let b = batch();
        let expr = parse_filter(&b.schema(), filter).unwrap();
        expr.evaluate(&b).unwrap().iter().map(|v| v.unwrap()).collect()
    }

    #[test]
    fn comparisons_skip_nulls() {
        assert_eq!(selected("id >= 2"), vec![false, true, false, true]);
        assert_eq!(selected("score < 3"), vec![true, false, true, false]);
        assert_eq!(selected("name != 'beta'"), vec![true, false, true, false]);
        assert_eq!(selected("active = TRUE"), vec![true, false, false, true]);
    }

    #[test]
    fn not_inverts_collapsed_mask() {
        assert_eq!(selected("NOT id = 1"), vec![false, true, true, true]);
    }

    #[test]
    fn boolean_combinations() {
        assert_eq!(selected("id = 1 OR score > 5 AND active = TRUE"), vec![true, false, false, true]);
        assert_eq!(selected("(id = 1 OR id = 2) AND name LIKE '%a'"), vec![true, true, false, false]);
    }

    #[test]
    fn like_membership_and_null_checks() {
        assert_eq!(selected("name LIKE '_e%'"), vec![false, true, false, false]);
        assert_eq!(selected("name NOT LIKE '%mm%'"), vec![true, true, false, false]);
        assert_eq!(selected("id LIKE '4'"), vec![false, false, false, true]);
        assert_eq!(selected("id IN (1, 4)"), vec![true, false, false, true]);
        assert_eq!(selected("id NOT IN (1, 4)"), vec![false, true, true, false]);
        assert_eq!(selected("name IS NULL"), vec![false, false, false, true]);
        assert_eq!(selected("score IS NOT NULL"), vec![true, false, true, true]);
    }

    #[test]
    fn like_treats_regex_metacharacters_literally() {
        let re = like_regex("a.b%").unwrap();
        assert!(re.is_match("a.bxyz"));
        assert!(!re.is_match("axbxyz"));
    }

    #[test]
    fn filter_batch_keeps_selected_rows() {
        let b = batch();
        let expr = parse_filter(&b.schema(), "active = TRUE").unwrap();
        let out = filter_batch(&b, &expr).unwrap();
        assert_eq!(out.num_rows(), 2);
        let ids = out.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(ids.values().to_vec(), vec![1, 4]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let b = batch();
        let expr = Expr::NullCheck { negated: false, column: "ghost".into() };
        assert!(expr.evaluate(&b).is_err());
    }
}
