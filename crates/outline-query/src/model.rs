//! In-memory query model: conditions, selections and the query itself.
//!
//! These are plain value types. Editors replace them wholesale rather than
//! mutating shared instances, and the compiler only ever reads them.

use crate::error::IncompleteReason;
use crate::relation::{Relation, RelationRegistry};

/// A relation as written on a clause, resolved against the registry once.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelationRef {
    /// A registered relation.
    Known(Relation),
    /// A label the registry does not know (or an empty label).
    Unknown(String),
}

impl RelationRef {
    /// Resolves `label` against the built-in registry.
    pub fn resolve(label: &str) -> Self {
        Self::resolve_in(RelationRegistry::builtin(), label)
    }

    /// Resolves `label` against `registry`.
    pub fn resolve_in(registry: &RelationRegistry, label: &str) -> Self {
        match registry.resolve(label) {
            Some(relation) => RelationRef::Known(relation),
            None => RelationRef::Unknown(label.trim().to_string()),
        }
    }

    /// The label as it should be displayed.
    pub fn label(&self) -> &str {
        match self {
            RelationRef::Known(relation) => relation.label(),
            RelationRef::Unknown(label) => label,
        }
    }

    /// Returns the registered relation, if any.
    pub fn known(&self) -> Option<Relation> {
        match self {
            RelationRef::Known(relation) => Some(*relation),
            RelationRef::Unknown(_) => None,
        }
    }
}

/// A single `source relation target` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clause {
    /// Stable identifier of the persisted condition.
    pub uid: String,
    /// Source variable.
    pub source: String,
    /// Relation operator.
    pub relation: RelationRef,
    /// Target variable or literal, depending on the relation.
    pub target: String,
    /// Whether the clause is negated.
    pub negated: bool,
}

impl Clause {
    /// Creates a positive clause, resolving `relation` against the built-in registry.
    pub fn new(
        uid: impl Into<String>,
        source: impl Into<String>,
        relation: &str,
        target: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            source: source.into(),
            relation: RelationRef::resolve(relation),
            target: target.into(),
            negated: false,
        }
    }

    /// Returns the clause with its negation flag set to `negated`.
    pub fn with_negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    /// Returns why this clause cannot be compiled, if it cannot.
    pub fn incomplete_reason(&self) -> Option<IncompleteReason> {
        if self.source.trim().is_empty() {
            return Some(IncompleteReason::MissingSource);
        }
        match &self.relation {
            RelationRef::Unknown(label) if label.trim().is_empty() => {
                return Some(IncompleteReason::MissingRelation)
            }
            RelationRef::Unknown(label) => {
                return Some(IncompleteReason::UnknownRelation(label.clone()))
            }
            RelationRef::Known(_) => {}
        }
        if self.target.trim().is_empty() {
            return Some(IncompleteReason::MissingTarget);
        }
        None
    }

    /// Returns true if the target of this clause names a variable.
    pub fn target_is_variable(&self) -> bool {
        self.relation
            .known()
            .map(|r| r.target_kind().is_variable())
            .unwrap_or(false)
    }
}

/// A nested list of conditions combined by conjunction or disjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    /// Stable identifier of the persisted group.
    pub uid: String,
    /// Whether the whole group is negated.
    pub negated: bool,
    /// Disjunction (`or`) when true, conjunction (`and`) otherwise.
    pub disjunctive: bool,
    /// Child conditions in order.
    pub children: Vec<Condition>,
}

impl Group {
    /// Creates a disjunction over `children`.
    pub fn or(uid: impl Into<String>, children: Vec<Condition>) -> Self {
        Self {
            uid: uid.into(),
            negated: false,
            disjunctive: true,
            children,
        }
    }

    /// Creates a conjunction over `children`.
    pub fn and(uid: impl Into<String>, children: Vec<Condition>) -> Self {
        Self {
            uid: uid.into(),
            negated: false,
            disjunctive: false,
            children,
        }
    }

    /// Returns the group with its negation flag set to `negated`.
    pub fn with_negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }
}

/// One condition of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    /// A single clause.
    Clause(Clause),
    /// A nested group.
    Group(Group),
}

impl Condition {
    /// Uid of the underlying clause or group.
    pub fn uid(&self) -> &str {
        match self {
            Condition::Clause(c) => &c.uid,
            Condition::Group(g) => &g.uid,
        }
    }

    /// Returns true if the condition is negated.
    pub fn is_negated(&self) -> bool {
        match self {
            Condition::Clause(c) => c.negated,
            Condition::Group(g) => g.negated,
        }
    }

    /// Finds the first incomplete clause or group, depth first.
    pub fn first_incomplete(&self) -> Option<(&str, IncompleteReason)> {
        match self {
            Condition::Clause(clause) => clause
                .incomplete_reason()
                .map(|reason| (clause.uid.as_str(), reason)),
            Condition::Group(group) if group.children.is_empty() => {
                Some((group.uid.as_str(), IncompleteReason::EmptyGroup))
            }
            Condition::Group(group) => group.children.iter().find_map(Condition::first_incomplete),
        }
    }
}

impl From<Clause> for Condition {
    fn from(clause: Clause) -> Self {
        Condition::Clause(clause)
    }
}

impl From<Group> for Condition {
    fn from(group: Group) -> Self {
        Condition::Group(group)
    }
}

/// A named computed column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    /// Stable identifier of the persisted selection.
    pub uid: String,
    /// Output column name.
    pub label: String,
    /// Formula over bound variables.
    pub expression: String,
}

impl Selection {
    /// Creates a selection.
    pub fn new(
        uid: impl Into<String>,
        label: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            label: label.into(),
            expression: expression.into(),
        }
    }
}

/// A complete structured query.
///
/// # Example
///
/// ```rust
/// use outline_query::{Clause, Query};
///
/// let query = Query::new("Page")
///     .with_condition(Clause::new("c1", "Page", "has title", "Daily Notes"));
/// assert_eq!(query.conditions.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Query {
    /// Variable whose bindings identify result rows.
    pub return_variable: String,
    /// Conditions in binding order.
    pub conditions: Vec<Condition>,
    /// Computed columns.
    pub selections: Vec<Selection>,
}

impl Query {
    /// Creates a query with no conditions or selections.
    pub fn new(return_variable: impl Into<String>) -> Self {
        Self {
            return_variable: return_variable.into(),
            conditions: Vec::new(),
            selections: Vec::new(),
        }
    }

    /// Appends a condition.
    pub fn with_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Appends a selection.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Variables a top-level condition at `index` may use as its source.
    ///
    /// The return variable comes first, followed by the distinct variable
    /// targets of the conditions before `index`.
    pub fn source_options(&self, index: usize) -> Vec<String> {
        let mut options = Vec::new();
        if !self.return_variable.is_empty() {
            options.push(self.return_variable.clone());
        }
        for condition in self.conditions.iter().take(index) {
            if let Condition::Clause(clause) = condition {
                if clause.target_is_variable()
                    && !clause.negated
                    && !clause.target.is_empty()
                    && !options.contains(&clause.target)
                {
                    options.push(clause.target.clone());
                }
            }
        }
        options
    }

    /// Returns true if nothing obviously blocks compilation.
    ///
    /// This is the cheap check an editor uses to enable its run action; the
    /// compiler still performs full validation.
    pub fn is_executable(&self) -> bool {
        !self.return_variable.trim().is_empty()
            && self.conditions.iter().all(|c| c.first_incomplete().is_none())
            && self.selections.iter().all(|s| !s.expression.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_resolves_relation() {
        let clause = Clause::new("c1", "Page", "Has Title", "Daily Notes");
        assert_eq!(clause.relation, RelationRef::Known(Relation::HasTitle));
        assert!(clause.incomplete_reason().is_none());
    }

    #[test]
    fn test_unknown_relation_is_retained_but_incomplete() {
        let clause = Clause::new("c1", "Page", "links to", "Block");
        assert_eq!(clause.relation, RelationRef::Unknown("links to".to_string()));
        assert_eq!(
            clause.incomplete_reason(),
            Some(IncompleteReason::UnknownRelation("links to".to_string()))
        );
    }

    #[test]
    fn test_missing_parts() {
        assert_eq!(
            Clause::new("c", "Page", "", "x").incomplete_reason(),
            Some(IncompleteReason::MissingRelation)
        );
        assert_eq!(
            Clause::new("c", "Page", "references", " ").incomplete_reason(),
            Some(IncompleteReason::MissingTarget)
        );
        assert_eq!(
            Clause::new("c", "", "references", "Block").incomplete_reason(),
            Some(IncompleteReason::MissingSource)
        );
    }

    #[test]
    fn test_group_first_incomplete_recurses() {
        let group = Condition::from(Group::or(
            "g",
            vec![
                Clause::new("a", "Page", "has title", "x").into(),
                Clause::new("b", "Page", "has title", "").into(),
            ],
        ));
        assert_eq!(
            group.first_incomplete(),
            Some(("b", IncompleteReason::MissingTarget))
        );

        let empty = Condition::from(Group::or("e", vec![]));
        assert_eq!(empty.first_incomplete(), Some(("e", IncompleteReason::EmptyGroup)));
    }

    #[test]
    fn test_source_options() {
        let query = Query::new("Page")
            .with_condition(Clause::new("c1", "Page", "references", "Block"))
            .with_condition(Clause::new("c2", "Block", "with text", "todo"))
            .with_condition(Clause::new("c3", "Block", "references", "Block"));
        assert_eq!(query.source_options(0), vec!["Page"]);
        assert_eq!(query.source_options(2), vec!["Page", "Block"]);
        assert_eq!(query.source_options(3), vec!["Page", "Block"]);
    }

    #[test]
    fn test_is_executable() {
        let query = Query::new("Page")
            .with_condition(Clause::new("c1", "Page", "has title", "Daily Notes"));
        assert!(query.is_executable());
        assert!(!Query::new("").is_executable());
        let blank_selection = query.clone().with_selection(Selection::new("s", "x", " "));
        assert!(!blank_selection.is_executable());
    }
}
