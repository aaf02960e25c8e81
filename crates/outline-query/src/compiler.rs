//! Query compiler: turns a [`Query`] into a Datalog query.
//!
//! Conditions are compiled left to right while tracking which variables are
//! bound. A condition's source must already be bound (it is the return
//! variable or was introduced by an earlier positive condition); node-typed
//! targets are introduced on first use.
//!
//! Negation and disjunction follow the usual Datalog scoping rules:
//!
//! - a negated clause or group becomes `(not-join [vars] ...)` over the
//!   variables it shares with what is already bound, and binds nothing;
//! - a disjunctive group becomes `(or-join [vars] ...)` with one branch per
//!   child, each child compiled from the same entry bindings. Variables newly
//!   bound by every branch are bound after the group;
//! - a plain conjunction group is inlined.

use std::fmt;

use tracing::debug;

use crate::datalog::{symbol, DatalogClause, Term};
use crate::error::{CompileError, CompileResult};
use crate::model::{Clause, Condition, Group, Query, RelationRef};
use crate::selection::CompiledSelection;

/// A compiled query ready to hand to a graph store.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Variable whose bindings identify result rows.
    pub return_variable: String,
    /// Variables in the `:find` clause: the return variable first, then
    /// every variable referenced by a selection.
    pub find: Vec<String>,
    /// The `:where` clauses, in condition order.
    pub clauses: Vec<DatalogClause>,
    /// Selections to evaluate per result row.
    pub selections: Vec<CompiledSelection>,
}

impl CompiledQuery {
    /// Renders the query in Datalog text form.
    pub fn to_datalog(&self) -> String {
        self.to_string()
    }

    /// Column names of a projected result: the return variable, then every
    /// selection label.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(self.return_variable.clone())
            .chain(self.selections.iter().map(|s| s.label.clone()))
            .collect()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[:find")?;
        for variable in &self.find {
            write!(f, " ?{}", symbol(variable))?;
        }
        write!(f, "\n :where")?;
        for clause in &self.clauses {
            write!(f, "\n {}", clause)?;
        }
        write!(f, "]")
    }
}

/// Compiles `query` into a Datalog query.
///
/// Compilation is pure: the same query always yields the same output.
///
/// # Errors
///
/// - [`CompileError::EmptyReturnVariable`] if the return variable is blank
/// - [`CompileError::IncompleteQuery`] for the first incomplete condition
/// - [`CompileError::UnboundVariable`] if a source is used before it is bound
/// - [`CompileError::InvalidTarget`] for uninterpretable literal targets
/// - [`CompileError::InvalidSelectionExpression`] and
///   [`CompileError::DuplicateSelectionLabel`] for bad selections
///
/// # Example
///
/// ```rust
/// use outline_query::{compile, Clause, Query};
///
/// let query = Query::new("Page")
///     .with_condition(Clause::new("c1", "Page", "has title", "Daily Notes"));
/// let compiled = compile(&query).unwrap();
/// assert_eq!(
///     compiled.to_datalog(),
///     "[:find ?Page\n :where\n [?Page :node/title \"Daily Notes\"]]"
/// );
/// ```
pub fn compile(query: &Query) -> CompileResult<CompiledQuery> {
    let return_variable = query.return_variable.trim();
    if return_variable.is_empty() {
        return Err(CompileError::EmptyReturnVariable);
    }

    if let Some((uid, reason)) = query.conditions.iter().find_map(Condition::first_incomplete) {
        return Err(CompileError::IncompleteQuery {
            uid: uid.to_string(),
            reason,
        });
    }

    let mut bound = vec![return_variable.to_string()];
    let mut clauses = compile_sequence(&query.conditions, "", &mut bound)?;

    if !clauses.iter().any(|c| binds_variable(c, return_variable)) {
        clauses.insert(0, anchor(return_variable));
    }

    let mut names = vec![return_variable.to_string()];
    names.extend(clauses.iter().flat_map(DatalogClause::variables));
    check_symbols(&names)?;

    let selections = compile_selections(query, return_variable, &bound)?;

    let mut find = vec![return_variable.to_string()];
    for variable in selections.iter().flat_map(|s| s.variables.iter()) {
        if !find.contains(variable) {
            find.push(variable.clone());
        }
    }

    let compiled = CompiledQuery {
        return_variable: return_variable.to_string(),
        find,
        clauses,
        selections,
    };
    debug!(
        conditions = query.conditions.len(),
        selections = compiled.selections.len(),
        query = %compiled,
        "compiled query"
    );
    Ok(compiled)
}

// ============================================================================
// Conditions
// ============================================================================

fn scope_path(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{}-{}", parent, index)
    }
}

fn compile_sequence(
    conditions: &[Condition],
    path: &str,
    bound: &mut Vec<String>,
) -> CompileResult<Vec<DatalogClause>> {
    let mut clauses = Vec::new();
    for (index, condition) in conditions.iter().enumerate() {
        let scope = scope_path(path, index);
        clauses.extend(compile_condition(condition, &scope, bound)?);
    }
    Ok(clauses)
}

fn compile_condition(
    condition: &Condition,
    scope: &str,
    bound: &mut Vec<String>,
) -> CompileResult<Vec<DatalogClause>> {
    match condition {
        Condition::Clause(clause) => compile_clause(clause, scope, bound),
        Condition::Group(group) => compile_group(group, scope, bound),
    }
}

fn compile_clause(
    clause: &Clause,
    scope: &str,
    bound: &mut Vec<String>,
) -> CompileResult<Vec<DatalogClause>> {
    let source = clause.source.trim();
    let target = clause.target.trim();

    if !bound.iter().any(|v| v == source) {
        return Err(CompileError::UnboundVariable {
            uid: clause.uid.clone(),
            variable: source.to_string(),
        });
    }

    let relation = match &clause.relation {
        RelationRef::Known(relation) => *relation,
        RelationRef::Unknown(label) => return Err(CompileError::UnknownRelation(label.clone())),
    };
    let clauses = relation.compile(source, target, Some(scope))?;

    if clause.negated {
        return Ok(vec![negate(clauses, bound)]);
    }
    for clause in &clauses {
        extend_bound(bound, clause.binds());
    }
    Ok(clauses)
}

fn compile_group(
    group: &Group,
    scope: &str,
    bound: &mut Vec<String>,
) -> CompileResult<Vec<DatalogClause>> {
    let mut inner_bound = bound.clone();
    let clauses = if group.disjunctive {
        vec![compile_disjunction(group, scope, &mut inner_bound)?]
    } else {
        compile_sequence(&group.children, scope, &mut inner_bound)?
    };

    if group.negated {
        return Ok(vec![negate(clauses, bound)]);
    }
    *bound = inner_bound;
    Ok(clauses)
}

fn compile_disjunction(
    group: &Group,
    scope: &str,
    bound: &mut Vec<String>,
) -> CompileResult<DatalogClause> {
    let mut branches = Vec::with_capacity(group.children.len());
    let mut branch_bindings = Vec::with_capacity(group.children.len());

    for (index, child) in group.children.iter().enumerate() {
        let mut branch_bound = bound.clone();
        let clauses = compile_condition(child, &scope_path(scope, index), &mut branch_bound)?;
        branch_bindings.push(branch_bound);
        branches.push(clauses);
    }

    // Entry variables the branches use, then whatever every branch binds.
    let mut variables: Vec<String> = Vec::new();
    for clause in branches.iter().flatten() {
        for variable in clause.variables() {
            if bound.contains(&variable) && !variables.contains(&variable) {
                variables.push(variable);
            }
        }
    }
    // Each branch must mention every join variable; anchor the ones it skips.
    for branch in &mut branches {
        let mentioned: Vec<String> = branch.iter().flat_map(DatalogClause::variables).collect();
        let mut anchored: Vec<DatalogClause> = variables
            .iter()
            .filter(|v| !mentioned.contains(v))
            .map(|v| anchor(v))
            .collect();
        if !anchored.is_empty() {
            anchored.append(branch);
            *branch = anchored;
        }
    }
    let exits: Vec<String> = match branch_bindings.split_first() {
        Some((first, rest)) => first
            .iter()
            .filter(|v| !bound.contains(v))
            .filter(|v| rest.iter().all(|other| other.contains(v)))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    variables.extend(exits.iter().cloned());
    extend_bound(bound, exits);

    Ok(DatalogClause::OrJoin {
        variables,
        branches,
    })
}

/// `[?variable :block/uid _]`: true for every page and block.
fn anchor(variable: &str) -> DatalogClause {
    DatalogClause::pattern(Term::var(variable), ":block/uid", Term::Blank)
}

/// Rejects distinct variable names that render to the same symbol.
fn check_symbols(variables: &[String]) -> CompileResult<()> {
    let mut seen: Vec<(String, &str)> = Vec::with_capacity(variables.len());
    for variable in variables {
        let rendered = symbol(variable);
        let clash = seen
            .iter()
            .find(|(s, name)| *s == rendered && *name != variable.as_str());
        if let Some((_, first)) = clash {
            return Err(CompileError::AmbiguousVariable {
                first: first.to_string(),
                second: variable.clone(),
                symbol: rendered,
            });
        }
        seen.push((rendered, variable));
    }
    Ok(())
}

/// Wraps `clauses` in a negation scope joined on the variables already bound.
fn negate(clauses: Vec<DatalogClause>, bound: &[String]) -> DatalogClause {
    let mut variables: Vec<String> = Vec::new();
    for clause in &clauses {
        for variable in clause.variables() {
            if bound.contains(&variable) && !variables.contains(&variable) {
                variables.push(variable);
            }
        }
    }
    DatalogClause::NotJoin { variables, clauses }
}

fn extend_bound(bound: &mut Vec<String>, variables: Vec<String>) {
    for variable in variables {
        if !bound.contains(&variable) {
            bound.push(variable);
        }
    }
}

fn binds_variable(clause: &DatalogClause, variable: &str) -> bool {
    match clause {
        DatalogClause::Pattern { .. } => clause.variables().iter().any(|v| v == variable),
        DatalogClause::OrJoin { branches, .. } => branches
            .iter()
            .all(|branch| branch.iter().any(|c| binds_variable(c, variable))),
        DatalogClause::Predicate { .. } | DatalogClause::NotJoin { .. } => false,
    }
}

// ============================================================================
// Selections
// ============================================================================

fn compile_selections(
    query: &Query,
    return_variable: &str,
    bound: &[String],
) -> CompileResult<Vec<CompiledSelection>> {
    let mut labels: Vec<&str> = vec![return_variable];
    let mut compiled = Vec::with_capacity(query.selections.len());

    for selection in &query.selections {
        let label = selection.label.trim();
        if label.is_empty() {
            return Err(CompileError::InvalidSelectionExpression {
                label: selection.uid.clone(),
                message: "label is empty".to_string(),
            });
        }
        if labels.contains(&label) {
            return Err(CompileError::DuplicateSelectionLabel(label.to_string()));
        }
        labels.push(label);

        let mut selection = CompiledSelection::compile(selection)?;
        selection.label = label.to_string();
        if let Some(unbound) = selection.variables.iter().find(|v| !bound.contains(v)) {
            return Err(CompileError::InvalidSelectionExpression {
                label: selection.label,
                message: format!("variable '{}' is never bound", unbound),
            });
        }
        compiled.push(selection);
    }

    Ok(compiled)
}
