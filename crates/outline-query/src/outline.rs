//! Adapter between persisted outline trees and the query model.
//!
//! Queries are stored as nested outline nodes:
//!
//! ```text
//! scratch
//!   return
//!     Page
//!   conditions
//!     0
//!       source
//!         Page
//!       relation
//!         references
//!       target
//!         Block
//!       not
//!   selections
//!     upper(Title)
//!       Shout
//! ```
//!
//! Setting keys match case-insensitively and ignore surrounding whitespace.
//! Missing nodes read as empty values: an absent `not` means not negated,
//! absent `conditions` or `selections` mean empty sequences.
//!
//! Grouped conditions carry a `type` setting (`or`, `not or`, `and`,
//! `not and`) and their children under a nested `conditions` node.

use tracing::{debug, warn};

use crate::error::{CompileError, CompileResult};
use crate::model::{Clause, Condition, Group, Query, Selection};

const SCRATCH: &str = "scratch";
const RETURN: &str = "return";
const CONDITIONS: &str = "conditions";
const SELECTIONS: &str = "selections";
const SOURCE: &str = "source";
const RELATION: &str = "relation";
const TARGET: &str = "target";
const TYPE: &str = "type";
const NOT: &str = "not";

/// One node of a persisted outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutlineNode {
    /// Stable node identifier.
    #[cfg_attr(feature = "serde", serde(default))]
    pub uid: String,
    /// Node text.
    pub text: String,
    /// Ordered children.
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// Creates a childless node.
    pub fn new(uid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Creates a childless node without a uid.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new("", text)
    }

    /// Returns the node with `children` appended.
    pub fn with_children(mut self, children: impl IntoIterator<Item = OutlineNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Finds the first child whose text matches `key`.
    pub fn child(&self, key: &str) -> Option<&OutlineNode> {
        self.children.iter().find(|c| matches_key(&c.text, key))
    }

    /// Reads the setting `key`: the text of the first child of the child named `key`.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.child(key)
            .and_then(|node| node.children.first())
            .map(|value| value.text.trim())
    }

    /// Creates a `key -> value` setting node.
    fn setting_node(key: &str, value: &str) -> Self {
        Self::text(key).with_children([Self::text(value)])
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn matches_key(text: &str, key: &str) -> bool {
    normalize(text) == key
}

// ============================================================================
// Reading
// ============================================================================

/// Builds a [`Query`] from a persisted outline.
///
/// `root` is either the scratch node itself or a node with a `scratch` child.
///
/// # Errors
///
/// Returns [`CompileError::DuplicateSelectionLabel`] if two selections share
/// a label. Every other defect (empty return variable, incomplete
/// conditions) is left for the compiler to report.
pub fn build_query(root: &OutlineNode) -> CompileResult<Query> {
    let scratch = root.child(SCRATCH).unwrap_or(root);

    let return_variable = scratch.setting(RETURN).unwrap_or_default().to_string();
    let conditions = scratch
        .child(CONDITIONS)
        .map(read_conditions)
        .unwrap_or_default();
    let selections = scratch
        .child(SELECTIONS)
        .map(read_selections)
        .transpose()?
        .unwrap_or_default();

    debug!(
        return_variable = %return_variable,
        conditions = conditions.len(),
        selections = selections.len(),
        "built query from outline"
    );

    Ok(Query {
        return_variable,
        conditions,
        selections,
    })
}

/// Like [`build_query`], with `default_return` taking precedence over the
/// stored return variable when it is non-empty.
pub fn build_query_with_default(root: &OutlineNode, default_return: &str) -> CompileResult<Query> {
    let mut query = build_query(root)?;
    if !default_return.trim().is_empty() {
        query.return_variable = default_return.trim().to_string();
    }
    Ok(query)
}

fn read_conditions(node: &OutlineNode) -> Vec<Condition> {
    node.children.iter().map(read_condition).collect()
}

fn read_condition(node: &OutlineNode) -> Condition {
    let kind = node.setting(TYPE).map(normalize).unwrap_or_default();
    let marked_not = node.child(NOT).is_some();

    let group = |negated: bool, disjunctive: bool| {
        Condition::Group(Group {
            uid: node.uid.clone(),
            negated: negated || marked_not,
            disjunctive,
            children: node.child(CONDITIONS).map(read_conditions).unwrap_or_default(),
        })
    };

    match kind.as_str() {
        "or" => group(false, true),
        "not or" => group(true, true),
        "and" => group(false, false),
        "not and" => group(true, false),
        "not" => read_clause(node, true),
        "" | "clause" => read_clause(node, marked_not),
        other => {
            warn!(uid = %node.uid, kind = %other, "unknown condition type, reading as clause");
            read_clause(node, marked_not)
        }
    }
}

fn read_clause(node: &OutlineNode, negated: bool) -> Condition {
    Clause::new(
        node.uid.clone(),
        node.setting(SOURCE).unwrap_or_default(),
        node.setting(RELATION).unwrap_or_default(),
        node.setting(TARGET).unwrap_or_default(),
    )
    .with_negated(negated)
    .into()
}

fn read_selections(node: &OutlineNode) -> CompileResult<Vec<Selection>> {
    let mut selections: Vec<Selection> = Vec::with_capacity(node.children.len());
    for child in &node.children {
        let label = child
            .children
            .first()
            .map(|c| c.text.trim())
            .unwrap_or_default();
        if !label.is_empty() && selections.iter().any(|s| s.label == label) {
            return Err(CompileError::DuplicateSelectionLabel(label.to_string()));
        }
        selections.push(Selection::new(child.uid.clone(), label, child.text.trim()));
    }
    Ok(selections)
}

// ============================================================================
// Writing
// ============================================================================

/// Renders `query` as a `scratch` outline that [`build_query`] reads back.
pub fn query_to_outline(query: &Query) -> OutlineNode {
    let conditions = OutlineNode::text(CONDITIONS).with_children(
        query
            .conditions
            .iter()
            .enumerate()
            .map(|(order, c)| condition_to_outline(c, order)),
    );
    let selections = OutlineNode::text(SELECTIONS).with_children(query.selections.iter().map(|s| {
        OutlineNode::new(s.uid.clone(), s.expression.clone())
            .with_children([OutlineNode::text(s.label.clone())])
    }));

    OutlineNode::text(SCRATCH).with_children([
        OutlineNode::setting_node(RETURN, &query.return_variable),
        conditions,
        selections,
    ])
}

fn condition_to_outline(condition: &Condition, order: usize) -> OutlineNode {
    let node = OutlineNode::new(condition.uid(), order.to_string());
    match condition {
        Condition::Clause(clause) => {
            let mut children = vec![
                OutlineNode::setting_node(SOURCE, &clause.source),
                OutlineNode::setting_node(RELATION, clause.relation.label()),
                OutlineNode::setting_node(TARGET, &clause.target),
            ];
            if clause.negated {
                children.push(OutlineNode::text(NOT));
            }
            node.with_children(children)
        }
        Condition::Group(group) => {
            let kind = match (group.negated, group.disjunctive) {
                (false, true) => "or",
                (true, true) => "not or",
                (false, false) => "and",
                (true, false) => "not and",
            };
            let nested = OutlineNode::text(CONDITIONS).with_children(
                group
                    .children
                    .iter()
                    .enumerate()
                    .map(|(order, c)| condition_to_outline(c, order)),
            );
            node.with_children([OutlineNode::setting_node(TYPE, kind), nested])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationRef;
    use crate::relation::Relation;

    fn setting(key: &str, value: &str) -> OutlineNode {
        OutlineNode::text(key).with_children([OutlineNode::text(value)])
    }

    fn sample_tree() -> OutlineNode {
        OutlineNode::new("page", "Query Page").with_children([OutlineNode::text(" Scratch ")
            .with_children([
                setting("Return", "Page"),
                OutlineNode::text("conditions").with_children([
                    OutlineNode::new("c1", "0").with_children([
                        setting("source", "Page"),
                        setting("relation", "references"),
                        setting("target", "Block"),
                    ]),
                    OutlineNode::new("c2", "1").with_children([
                        setting("source", "Block"),
                        setting("relation", "with text"),
                        setting("target", "todo"),
                        OutlineNode::text("NOT"),
                    ]),
                ]),
                OutlineNode::text("selections").with_children([OutlineNode::new(
                    "s1",
                    "upper(Page)",
                )
                .with_children([OutlineNode::text("Shout")])]),
            ])])
    }

    #[test]
    fn test_build_query_reads_settings() {
        let query = build_query(&sample_tree()).unwrap();
        assert_eq!(query.return_variable, "Page");
        assert_eq!(query.conditions.len(), 2);

        match &query.conditions[1] {
            Condition::Clause(clause) => {
                assert_eq!(clause.uid, "c2");
                assert_eq!(clause.source, "Block");
                assert_eq!(clause.relation, RelationRef::Known(Relation::WithText));
                assert!(clause.negated);
            }
            other => panic!("expected clause, got {:?}", other),
        }

        assert_eq!(query.selections, vec![Selection::new("s1", "Shout", "upper(Page)")]);
    }

    #[test]
    fn test_missing_nodes_read_as_empty() {
        let query = build_query(&OutlineNode::text("scratch")).unwrap();
        assert_eq!(query, Query::default());

        let partial = OutlineNode::text("scratch").with_children([OutlineNode::text("conditions")
            .with_children([OutlineNode::new("c1", "0").with_children([setting("source", "Page")])])]);
        let query = build_query(&partial).unwrap();
        match &query.conditions[0] {
            Condition::Clause(clause) => {
                assert!(!clause.negated);
                assert_eq!(clause.relation, RelationRef::Unknown(String::new()));
                assert_eq!(clause.target, "");
            }
            other => panic!("expected clause, got {:?}", other),
        }
    }

    #[test]
    fn test_groups() {
        let tree = OutlineNode::text("scratch").with_children([
            setting("return", "Block"),
            OutlineNode::text("conditions").with_children([OutlineNode::new("g", "0")
                .with_children([
                    setting("type", "Not  Or"),
                    OutlineNode::text("conditions").with_children([
                        OutlineNode::new("a", "0").with_children([
                            setting("source", "Block"),
                            setting("relation", "with text"),
                            setting("target", "x"),
                        ]),
                        OutlineNode::new("b", "1").with_children([
                            setting("source", "Block"),
                            setting("relation", "with text"),
                            setting("target", "y"),
                        ]),
                    ]),
                ])]),
        ]);
        let query = build_query(&tree).unwrap();
        match &query.conditions[0] {
            Condition::Group(group) => {
                assert!(group.negated);
                assert!(group.disjunctive);
                assert_eq!(group.children.len(), 2);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_selection_labels_rejected() {
        let tree = OutlineNode::text("scratch").with_children([OutlineNode::text("selections")
            .with_children([
                OutlineNode::new("s1", "Page").with_children([OutlineNode::text("Name")]),
                OutlineNode::new("s2", "upper(Page)").with_children([OutlineNode::text("Name")]),
            ])]);
        assert_eq!(
            build_query(&tree).unwrap_err(),
            CompileError::DuplicateSelectionLabel("Name".to_string())
        );
    }

    #[test]
    fn test_default_return_takes_precedence() {
        let query = build_query_with_default(&sample_tree(), "Block").unwrap();
        assert_eq!(query.return_variable, "Block");
        let query = build_query_with_default(&sample_tree(), "").unwrap();
        assert_eq!(query.return_variable, "Page");
    }

    #[test]
    fn test_query_to_outline_reads_back() {
        let query = build_query(&sample_tree()).unwrap().with_condition(
            Group::or(
                "g",
                vec![Clause::new("c3", "Page", "has title", "x").into()],
            )
            .with_negated(true),
        );
        let outline = query_to_outline(&query);
        assert_eq!(build_query(&outline).unwrap(), query);
    }
}
