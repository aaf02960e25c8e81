//! Error types for query construction and compilation.

use std::fmt;

use thiserror::Error;

/// Why a condition cannot be compiled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    /// The clause has no source variable.
    MissingSource,
    /// The clause has no relation.
    MissingRelation,
    /// The relation label is not in the registry.
    UnknownRelation(String),
    /// The clause has no target.
    MissingTarget,
    /// A group has no children.
    EmptyGroup,
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::MissingSource => write!(f, "missing source"),
            IncompleteReason::MissingRelation => write!(f, "missing relation"),
            IncompleteReason::UnknownRelation(label) => write!(f, "unknown relation '{}'", label),
            IncompleteReason::MissingTarget => write!(f, "missing target"),
            IncompleteReason::EmptyGroup => write!(f, "group has no conditions"),
        }
    }
}

/// Errors detected before any execution attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The query has no return variable.
    #[error("return variable is empty")]
    EmptyReturnVariable,

    /// A condition is missing a relation, target, source or children.
    #[error("condition {uid} is incomplete: {reason}")]
    IncompleteQuery {
        /// Uid of the offending condition.
        uid: String,
        /// What is missing.
        reason: IncompleteReason,
    },

    /// A condition references a variable that no earlier condition binds.
    #[error("condition {uid} references unbound variable '{variable}'")]
    UnboundVariable {
        /// Uid of the offending condition.
        uid: String,
        /// The unbound variable name.
        variable: String,
    },

    /// The relation label is not registered.
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    /// A literal target cannot be interpreted for its relation.
    #[error("invalid target '{target}' for relation '{relation}': {message}")]
    InvalidTarget {
        /// Relation label.
        relation: String,
        /// The target as written.
        target: String,
        /// Description of the problem.
        message: String,
    },

    /// A selection expression is malformed or references an unbound variable.
    #[error("invalid selection '{label}': {message}")]
    InvalidSelectionExpression {
        /// Label of the offending selection.
        label: String,
        /// Description of the problem.
        message: String,
    },

    /// Two selections (or a selection and the return variable) share a label.
    #[error("duplicate selection label: {0}")]
    DuplicateSelectionLabel(String),

    /// Two distinct variable names render to the same Datalog symbol.
    #[error("variables '{first}' and '{second}' both render as ?{symbol}")]
    AmbiguousVariable {
        /// The name bound first.
        first: String,
        /// The later, conflicting name.
        second: String,
        /// The shared rendered symbol.
        symbol: String,
    },

    /// The plain-text query format could not be read.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },
}

/// Result type for query compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
