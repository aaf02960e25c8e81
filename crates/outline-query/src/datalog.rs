//! Datalog clause AST and its textual rendering.
//!
//! The rendered form follows the Datomic/Datascript dialect accepted by
//! outline graph stores:
//!
//! ```text
//! [:find ?Page
//!  :where
//!  [?Page :node/title "Daily Notes"]
//!  (not-join [?Page] [?Page :block/refs ?Block])]
//! ```

use std::fmt;

/// A term in a clause position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Logic variable, stored without the leading `?`.
    Variable(String),
    /// String literal.
    Text(String),
    /// Integer literal.
    Integer(i64),
    /// Wildcard `_`.
    Blank,
}

impl Term {
    /// Creates a variable term.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    /// Creates a string literal term.
    pub fn text(value: impl Into<String>) -> Self {
        Term::Text(value.into())
    }

    /// Returns the variable name if this term is a variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "?{}", symbol(name)),
            Term::Text(s) => write!(f, "\"{}\"", escape(s)),
            Term::Integer(n) => write!(f, "{}", n),
            Term::Blank => write!(f, "_"),
        }
    }
}

/// One clause of a `:where` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatalogClause {
    /// Data pattern `[e a v]`.
    Pattern {
        /// Entity position.
        entity: Term,
        /// Attribute keyword including the leading colon.
        attribute: String,
        /// Value position.
        value: Term,
    },
    /// Predicate expression `[(f args...)]`.
    Predicate {
        /// Function symbol.
        function: String,
        /// Arguments.
        args: Vec<Term>,
    },
    /// Negation scope `(not-join [vars] clauses...)`.
    NotJoin {
        /// Variables shared with the enclosing query.
        variables: Vec<String>,
        /// The negated conjunction.
        clauses: Vec<DatalogClause>,
    },
    /// Disjunction scope `(or-join [vars] branches...)`.
    OrJoin {
        /// Variables shared with the enclosing query.
        variables: Vec<String>,
        /// Alternative conjunctions.
        branches: Vec<Vec<DatalogClause>>,
    },
}

impl DatalogClause {
    /// Creates a data pattern clause.
    pub fn pattern(entity: Term, attribute: impl Into<String>, value: Term) -> Self {
        DatalogClause::Pattern {
            entity,
            attribute: attribute.into(),
            value,
        }
    }

    /// Creates a predicate clause.
    pub fn predicate(function: impl Into<String>, args: Vec<Term>) -> Self {
        DatalogClause::Predicate {
            function: function.into(),
            args,
        }
    }

    /// Collects every variable mentioned in this clause, first-seen order.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            DatalogClause::Pattern { entity, value, .. } => {
                for term in [entity, value] {
                    if let Some(name) = term.as_variable() {
                        push_unique(out, name);
                    }
                }
            }
            DatalogClause::Predicate { args, .. } => {
                for name in args.iter().filter_map(Term::as_variable) {
                    push_unique(out, name);
                }
            }
            DatalogClause::NotJoin { clauses, .. } => {
                for clause in clauses {
                    clause.collect_variables(out);
                }
            }
            DatalogClause::OrJoin { branches, .. } => {
                for clause in branches.iter().flatten() {
                    clause.collect_variables(out);
                }
            }
        }
    }

    /// Variables this clause binds for clauses that follow it.
    ///
    /// Patterns bind everything they mention, or-joins bind their join
    /// variables, predicates and negations bind nothing.
    pub fn binds(&self) -> Vec<String> {
        match self {
            DatalogClause::Pattern { .. } => self.variables(),
            DatalogClause::OrJoin { variables, .. } => variables.clone(),
            DatalogClause::Predicate { .. } | DatalogClause::NotJoin { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for DatalogClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatalogClause::Pattern {
                entity,
                attribute,
                value,
            } => write!(f, "[{} {} {}]", entity, attribute, value),
            DatalogClause::Predicate { function, args } => {
                write!(f, "[({}", function)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")]")
            }
            DatalogClause::NotJoin { variables, clauses } => {
                write!(f, "(not-join ")?;
                write_vector(f, variables)?;
                for clause in clauses {
                    write!(f, " {}", clause)?;
                }
                write!(f, ")")
            }
            DatalogClause::OrJoin {
                variables,
                branches,
            } => {
                write!(f, "(or-join ")?;
                write_vector(f, variables)?;
                for branch in branches {
                    if let [single] = branch.as_slice() {
                        write!(f, " {}", single)?;
                    } else {
                        write!(f, " (and")?;
                        for clause in branch {
                            write!(f, " {}", clause)?;
                        }
                        write!(f, ")")?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|v| v == name) {
        out.push(name.to_string());
    }
}

fn write_vector(f: &mut fmt::Formatter<'_>, variables: &[String]) -> fmt::Result {
    write!(f, "[")?;
    for (i, name) in variables.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "?{}", symbol(name))?;
    }
    write!(f, "]")
}

/// Renders a variable name as a Datalog symbol body.
///
/// Characters outside `[A-Za-z0-9_.-]` are replaced with `_`.
pub fn symbol(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_display() {
        let clause = DatalogClause::pattern(
            Term::var("Page"),
            ":node/title",
            Term::text("Daily Notes"),
        );
        assert_eq!(clause.to_string(), "[?Page :node/title \"Daily Notes\"]");
    }

    #[test]
    fn test_predicate_display_escapes_quotes() {
        let clause = DatalogClause::predicate(
            "clojure.string/includes?",
            vec![Term::var("Block-String"), Term::text("say \"hi\"")],
        );
        assert_eq!(
            clause.to_string(),
            "[(clojure.string/includes? ?Block-String \"say \\\"hi\\\"\")]"
        );
    }

    #[test]
    fn test_or_join_wraps_multi_clause_branches() {
        let a = DatalogClause::pattern(Term::var("B"), ":block/refs", Term::var("P"));
        let b = DatalogClause::pattern(Term::var("B"), ":block/page", Term::var("P"));
        let c = DatalogClause::pattern(Term::var("P"), ":node/title", Term::Blank);
        let clause = DatalogClause::OrJoin {
            variables: vec!["B".to_string()],
            branches: vec![vec![a], vec![b, c]],
        };
        assert_eq!(
            clause.to_string(),
            "(or-join [?B] [?B :block/refs ?P] (and [?B :block/page ?P] [?P :node/title _]))"
        );
    }

    #[test]
    fn test_symbol_sanitizes_spaces() {
        assert_eq!(symbol("My Page"), "My_Page");
        assert_eq!(Term::var("My Page").to_string(), "?My_Page");
    }

    #[test]
    fn test_binds() {
        let pattern = DatalogClause::pattern(Term::var("A"), ":block/refs", Term::var("B"));
        assert_eq!(pattern.binds(), vec!["A".to_string(), "B".to_string()]);

        let negation = DatalogClause::NotJoin {
            variables: vec!["A".to_string()],
            clauses: vec![pattern],
        };
        assert!(negation.binds().is_empty());
        assert_eq!(negation.variables(), vec!["A".to_string(), "B".to_string()]);
    }
}
