//! Selection expressions: named computed columns.
//!
//! A selection's expression is a small formula over bound variables and a
//! closed set of built-in functions:
//!
//! ```text
//! concat("#", upper(Title))
//! format_date(Created, "%Y-%m-%d")
//! (Count + 1) * 2
//! ```
//!
//! Parsing and validation happen once at compile time; evaluation runs per
//! result row.

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::{BinaryOp, Builtin, Expr};
pub use eval::{evaluate, SelectionEvaluationError, DEFAULT_DATE_FORMAT};
pub use parser::parse_expression;

use crate::error::{CompileError, CompileResult};
use crate::model::Selection;
use crate::value::{BoundRow, Value};

/// A selection whose expression has been parsed and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelection {
    /// Uid of the source selection.
    pub uid: String,
    /// Output column name.
    pub label: String,
    /// Parsed expression.
    pub expression: Expr,
    /// Variables referenced by the expression, first-seen order.
    pub variables: Vec<String>,
}

impl CompiledSelection {
    /// Parses and validates `selection`.
    ///
    /// Whether the referenced variables are bound is checked by the query
    /// compiler, which knows the conditions.
    pub fn compile(selection: &Selection) -> CompileResult<Self> {
        let invalid = |message: String| CompileError::InvalidSelectionExpression {
            label: selection.label.clone(),
            message,
        };

        let expression = parse_expression(&selection.expression).map_err(invalid)?;
        expression.validate().map_err(invalid)?;
        let variables = expression.variables();

        Ok(Self {
            uid: selection.uid.clone(),
            label: selection.label.clone(),
            expression,
            variables,
        })
    }

    /// Evaluates the selection for one row.
    pub fn evaluate(&self, row: &BoundRow) -> Result<Value, SelectionEvaluationError> {
        evaluate(&self.expression, row)
    }
}
