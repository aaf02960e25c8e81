//! Selection expression AST.

use std::fmt;

use crate::value::Value;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+` (numbers add, strings concatenate)
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{}", s)
    }
}

/// Built-in functions available to selection expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `concat(a, ...)`: joins the text of every argument.
    Concat,
    /// `upper(s)`
    Upper,
    /// `lower(s)`
    Lower,
    /// `trim(s)`
    Trim,
    /// `len(s)`: length in characters.
    Len,
    /// `abs(n)`
    Abs,
    /// `round(n)`: nearest integer.
    Round,
    /// `format_date(t[, fmt])`: strftime formatting of a timestamp.
    FormatDate,
}

impl Builtin {
    /// Looks a function up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name.to_ascii_lowercase().as_str() {
            "concat" => Builtin::Concat,
            "upper" => Builtin::Upper,
            "lower" => Builtin::Lower,
            "trim" => Builtin::Trim,
            "len" => Builtin::Len,
            "abs" => Builtin::Abs,
            "round" => Builtin::Round,
            "format_date" => Builtin::FormatDate,
            _ => return None,
        };
        Some(builtin)
    }

    /// Accepted argument count as `(min, max)`; `None` means unbounded.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Builtin::Concat => (1, None),
            Builtin::FormatDate => (1, Some(2)),
            _ => (1, Some(1)),
        }
    }

    /// Returns true if `count` arguments are accepted.
    pub fn accepts(self, count: usize) -> bool {
        let (min, max) = self.arity();
        count >= min && max.map_or(true, |max| count <= max)
    }
}

/// A parsed selection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Reference to a bound variable.
    Variable(String),
    /// Arithmetic negation.
    Neg(Box<Expr>),
    /// Binary arithmetic.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Function call.
    Call {
        /// Function name as written.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Variables referenced by the expression, first-seen order.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }

    /// Checks that every call names a built-in with a valid argument count.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Expr::Literal(_) | Expr::Variable(_) => Ok(()),
            Expr::Neg(inner) => inner.validate(),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.validate()?;
                rhs.validate()
            }
            Expr::Call { name, args } => {
                let builtin =
                    Builtin::from_name(name).ok_or_else(|| format!("unknown function '{}'", name))?;
                if !builtin.accepts(args.len()) {
                    return Err(format!(
                        "function '{}' does not accept {} argument(s)",
                        name,
                        args.len()
                    ));
                }
                args.iter().try_for_each(Expr::validate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(Builtin::from_name("CONCAT"), Some(Builtin::Concat));
        assert_eq!(Builtin::from_name("format_date"), Some(Builtin::FormatDate));
        assert_eq!(Builtin::from_name("eval"), None);
    }

    #[test]
    fn test_builtin_arity() {
        assert!(Builtin::Concat.accepts(5));
        assert!(!Builtin::Concat.accepts(0));
        assert!(Builtin::FormatDate.accepts(2));
        assert!(!Builtin::Upper.accepts(2));
    }

    #[test]
    fn test_validate_rejects_unknown_function() {
        let expr = Expr::Call {
            name: "shout".to_string(),
            args: vec![Expr::Variable("Page".to_string())],
        };
        assert_eq!(expr.validate().unwrap_err(), "unknown function 'shout'");
    }
}
