//! Per-row evaluation of selection expressions.
//!
//! Evaluation is pure: it reads the bound row and produces a fresh value.
//! Failures are reported per cell and never abort the surrounding result set.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use super::ast::{BinaryOp, Builtin, Expr};
use crate::value::{BoundRow, Value};

/// Default `format_date` pattern.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A runtime failure evaluating one selection for one row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionEvaluationError {
    /// An operand has the wrong type for the operation.
    #[error("type mismatch: {operation} cannot be applied to {found}")]
    TypeMismatch {
        /// Operator or function name.
        operation: String,
        /// Operand type(s) encountered.
        found: String,
    },

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed.
    #[error("integer overflow in {0}")]
    Overflow(String),

    /// A value could not be interpreted as a date.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// A `format_date` pattern is malformed.
    #[error("invalid date format: {0}")]
    InvalidFormat(String),

    /// The row does not bind a referenced variable.
    #[error("variable '{0}' is not bound in this row")]
    MissingVariable(String),

    /// A function name is not a built-in.
    #[error("unknown function: {0}")]
    UnknownFunction(String),
}

type EvalResult = Result<Value, SelectionEvaluationError>;

/// Evaluates `expr` against `row`.
pub fn evaluate(expr: &Expr, row: &BoundRow) -> EvalResult {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => row
            .get(name)
            .cloned()
            .ok_or_else(|| SelectionEvaluationError::MissingVariable(name.clone())),
        Expr::Neg(inner) => negate(evaluate(inner, row)?),
        Expr::Binary { op, lhs, rhs } => binary(*op, evaluate(lhs, row)?, evaluate(rhs, row)?),
        Expr::Call { name, args } => {
            let builtin = Builtin::from_name(name)
                .ok_or_else(|| SelectionEvaluationError::UnknownFunction(name.clone()))?;
            let values = args
                .iter()
                .map(|arg| evaluate(arg, row))
                .collect::<Result<Vec<_>, _>>()?;
            call(builtin, name, values)
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

fn negate(value: Value) -> EvalResult {
    match value {
        Value::Integer(n) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| SelectionEvaluationError::Overflow("-".to_string())),
        Value::Float(x) => Ok(Value::Float(-x)),
        other => Err(mismatch("-", &[&other])),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult {
    if let (BinaryOp::Add, Value::String(a), Value::String(b)) = (op, &lhs, &rhs) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b),
        _ => match (as_float(&lhs), as_float(&rhs)) {
            (Some(a), Some(b)) => float_op(op, a, b),
            _ => Err(mismatch(&op.to_string(), &[&lhs, &rhs])),
        },
    }
}

fn integer_op(op: BinaryOp, a: i64, b: i64) -> EvalResult {
    let overflow = || SelectionEvaluationError::Overflow(op.to_string());
    match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Integer).ok_or_else(overflow),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Integer).ok_or_else(overflow),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Integer).ok_or_else(overflow),
        BinaryOp::Div => {
            if b == 0 {
                return Err(SelectionEvaluationError::DivisionByZero);
            }
            // Exact quotients stay integral.
            match a.checked_rem(b) {
                Some(0) => a.checked_div(b).map(Value::Integer).ok_or_else(overflow),
                Some(_) => Ok(Value::Float(a as f64 / b as f64)),
                None => Err(overflow()),
            }
        }
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> EvalResult {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(SelectionEvaluationError::DivisionByZero);
            }
            a / b
        }
    };
    Ok(Value::Float(result))
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn mismatch(operation: &str, operands: &[&Value]) -> SelectionEvaluationError {
    let found = operands
        .iter()
        .map(|v| v.type_name())
        .collect::<Vec<_>>()
        .join(" and ");
    SelectionEvaluationError::TypeMismatch {
        operation: operation.to_string(),
        found,
    }
}

// ============================================================================
// Built-ins
// ============================================================================

fn call(builtin: Builtin, name: &str, args: Vec<Value>) -> EvalResult {
    let first = args.first().cloned().unwrap_or(Value::Null);
    match builtin {
        Builtin::Concat => Ok(Value::String(
            args.iter()
                .map(|v| if v.is_null() { String::new() } else { v.to_string() })
                .collect(),
        )),
        Builtin::Upper => text(name, &first).map(|s| Value::String(s.to_uppercase())),
        Builtin::Lower => text(name, &first).map(|s| Value::String(s.to_lowercase())),
        Builtin::Trim => text(name, &first).map(|s| Value::String(s.trim().to_string())),
        Builtin::Len => text(name, &first).map(|s| Value::Integer(s.chars().count() as i64)),
        Builtin::Abs => match first {
            Value::Integer(n) => n
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| SelectionEvaluationError::Overflow(name.to_string())),
            Value::Float(x) => Ok(Value::Float(x.abs())),
            other => Err(mismatch(name, &[&other])),
        },
        Builtin::Round => match first {
            Value::Integer(n) => Ok(Value::Integer(n)),
            Value::Float(x) => {
                let rounded = x.round();
                if rounded.is_finite() && rounded.abs() < i64::MAX as f64 {
                    Ok(Value::Integer(rounded as i64))
                } else {
                    Err(SelectionEvaluationError::Overflow(name.to_string()))
                }
            }
            other => Err(mismatch(name, &[&other])),
        },
        Builtin::FormatDate => {
            let pattern = match args.get(1) {
                None => DEFAULT_DATE_FORMAT.to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => return Err(mismatch(name, &[other])),
            };
            format_date(&first, &pattern)
        }
    }
}

fn text<'a>(name: &str, value: &'a Value) -> Result<&'a str, SelectionEvaluationError> {
    value.as_str().ok_or_else(|| mismatch(name, &[value]))
}

fn format_date(value: &Value, pattern: &str) -> EvalResult {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(SelectionEvaluationError::InvalidFormat(pattern.to_string()));
    }

    let datetime = to_datetime(value)?;
    Ok(Value::String(
        datetime.format_with_items(items.iter()).to_string(),
    ))
}

fn to_datetime(value: &Value) -> Result<DateTime<Utc>, SelectionEvaluationError> {
    let invalid = || SelectionEvaluationError::InvalidDate(value.to_string());
    match value {
        Value::Integer(millis) => DateTime::from_timestamp_millis(*millis).ok_or_else(invalid),
        Value::Float(millis) if millis.is_finite() => {
            DateTime::from_timestamp_millis(*millis as i64).ok_or_else(invalid)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::parse_expression;

    fn eval(source: &str, row: &BoundRow) -> EvalResult {
        evaluate(&parse_expression(source).unwrap(), row)
    }

    fn row() -> BoundRow {
        [
            ("Title", Value::from("Daily Notes")),
            ("Count", Value::Integer(7)),
            ("Score", Value::Float(1.5)),
            ("Created", Value::Integer(1640995200000)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_string_functions() {
        let row = row();
        assert_eq!(eval("upper(Title)", &row).unwrap(), Value::from("DAILY NOTES"));
        assert_eq!(eval("len(Title)", &row).unwrap(), Value::Integer(11));
        assert_eq!(
            eval("concat(\"[\", Title, \"] \", Count)", &row).unwrap(),
            Value::from("[Daily Notes] 7")
        );
        assert_eq!(eval("trim(\"  x \")", &row).unwrap(), Value::from("x"));
        assert_eq!(eval("Title + \"!\"", &row).unwrap(), Value::from("Daily Notes!"));
    }

    #[test]
    fn test_arithmetic() {
        let row = row();
        assert_eq!(eval("Count * 2 + 1", &row).unwrap(), Value::Integer(15));
        assert_eq!(eval("Count / 7", &row).unwrap(), Value::Integer(1));
        assert_eq!(eval("Count / 2", &row).unwrap(), Value::Float(3.5));
        assert_eq!(eval("Score + Count", &row).unwrap(), Value::Float(8.5));
        assert_eq!(eval("-Count", &row).unwrap(), Value::Integer(-7));
        assert_eq!(eval("round(Score)", &row).unwrap(), Value::Integer(2));
        assert_eq!(eval("abs(0 - Count)", &row).unwrap(), Value::Integer(7));
    }

    #[test]
    fn test_runtime_errors() {
        let row = row();
        assert_eq!(
            eval("Count / 0", &row).unwrap_err(),
            SelectionEvaluationError::DivisionByZero
        );
        assert_eq!(
            eval("Title * 2", &row).unwrap_err(),
            SelectionEvaluationError::TypeMismatch {
                operation: "*".to_string(),
                found: "string and integer".to_string(),
            }
        );
        assert!(matches!(
            eval("upper(Count)", &row).unwrap_err(),
            SelectionEvaluationError::TypeMismatch { .. }
        ));
        assert_eq!(
            eval("Missing", &row).unwrap_err(),
            SelectionEvaluationError::MissingVariable("Missing".to_string())
        );
        assert!(matches!(
            eval("9223372036854775807 + 1", &row).unwrap_err(),
            SelectionEvaluationError::Overflow(_)
        ));
    }

    #[test]
    fn test_format_date() {
        let row = row();
        assert_eq!(eval("format_date(Created)", &row).unwrap(), Value::from("2022-01-01"));
        assert_eq!(
            eval("format_date(Created, \"%d/%m/%Y %H:%M\")", &row).unwrap(),
            Value::from("01/01/2022 00:00")
        );
        assert_eq!(
            eval("format_date(\"2023-05-06\", \"%B %-d\")", &row).unwrap(),
            Value::from("May 6")
        );
        assert!(matches!(
            eval("format_date(Title)", &row).unwrap_err(),
            SelectionEvaluationError::InvalidDate(_)
        ));
        assert!(matches!(
            eval("format_date(Created, \"%Q\")", &row).unwrap_err(),
            SelectionEvaluationError::InvalidFormat(_)
        ));
    }

    #[test]
    fn test_evaluation_does_not_mutate_row() {
        let row = row();
        let before = row.clone();
        let _ = eval("concat(Title, Count)", &row);
        assert_eq!(row, before);
    }
}
