//! Integration tests for query compilation.
//!
//! These cover the compiler's observable properties: purity, binding order,
//! negation scoping and disjunction branching.

use outline_query::{
    build_query, compile, parse_query_text, Clause, CompileError, Condition, DatalogClause, Group,
    IncompleteReason, OutlineNode, Query, Selection,
};

fn setting(key: &str, value: &str) -> OutlineNode {
    OutlineNode::text(key).with_children([OutlineNode::text(value)])
}

fn clause_node(uid: &str, source: &str, relation: &str, target: &str) -> OutlineNode {
    OutlineNode::new(uid, "0").with_children([
        setting("source", source),
        setting("relation", relation),
        setting("target", target),
    ])
}

/// A query touching every relation family.
fn rich_query() -> Query {
    Query::new("Page")
        .with_condition(Clause::new("c0", "Page", "is a", "page"))
        .with_condition(Clause::new("c1", "Page", "is referenced by", "Block"))
        .with_condition(Clause::new("c2", "Block", "with text", "TODO"))
        .with_condition(Clause::new("c3", "Block", "created after", "2022-01-01"))
        .with_condition(Clause::new("c4", "Block", "has parent", "Parent"))
        .with_condition(Clause::new("c5", "Parent", "edited by", "Alice").with_negated(true))
        .with_condition(Group::or(
            "g6",
            vec![
                Clause::new("c6a", "Page", "has attribute", "Status").into(),
                Clause::new("c6b", "Page", "with text in title", "Project").into(),
            ],
        ))
        .with_selection(Selection::new("s1", "Created", "format_date(Block)"))
}

#[test]
fn test_compile_is_pure() {
    let query = rich_query();
    let first = compile(&query).unwrap().to_datalog();
    for _ in 0..5 {
        assert_eq!(compile(&query).unwrap().to_datalog(), first);
    }
    assert_eq!(compile(&query.clone()).unwrap().to_datalog(), first);
}

#[test]
fn test_clause_count_matches_templates() {
    let compiled = compile(&rich_query()).unwrap();
    // is a (1) + is referenced by (1) + with text (2) + created after (2)
    // + has parent (1) + negation scope (1) + or-join (1)
    assert_eq!(compiled.clauses.len(), 9);

    match compiled.clauses.last() {
        Some(DatalogClause::OrJoin { branches, .. }) => assert_eq!(branches.len(), 2),
        other => panic!("expected or-join, got {:?}", other),
    }
}

#[test]
fn test_group_of_n_children_has_n_branches() {
    let children: Vec<Condition> = (0..4)
        .map(|i| Clause::new(format!("c{}", i), "Page", "has title", format!("T{}", i)).into())
        .collect();
    let query = Query::new("Page").with_condition(Group::or("g", children));
    let compiled = compile(&query).unwrap();
    match &compiled.clauses[0] {
        DatalogClause::OrJoin { branches, variables } => {
            assert_eq!(branches.len(), 4);
            assert_eq!(variables, &vec!["Page".to_string()]);
        }
        other => panic!("expected or-join, got {:?}", other),
    }
}

#[test]
fn test_negation_toggle_changes_only_scope() {
    let build = |negated: bool| {
        Query::new("Page")
            .with_condition(Clause::new("c1", "Page", "is a", "page"))
            .with_condition(Clause::new("c2", "Page", "with text in title", "x").with_negated(negated))
    };

    let positive = compile(&build(false)).unwrap();
    let negative = compile(&build(true)).unwrap();

    assert_eq!(positive.clauses[0], negative.clauses[0]);
    match &negative.clauses[1] {
        DatalogClause::NotJoin { variables, clauses } => {
            assert_eq!(variables, &vec!["Page".to_string()]);
            assert_eq!(clauses.as_slice(), &positive.clauses[1..]);
        }
        other => panic!("expected not-join, got {:?}", other),
    }
}

#[test]
fn test_unbound_source_always_detected() {
    for relation in ["references", "has child", "with text", "created before"] {
        let query = Query::new("Page")
            .with_condition(Clause::new("c1", "Ghost", relation, "2022-01-01"));
        assert_eq!(
            compile(&query).unwrap_err(),
            CompileError::UnboundVariable {
                uid: "c1".to_string(),
                variable: "Ghost".to_string(),
            },
            "relation {}",
            relation
        );
    }
}

#[test]
fn test_variable_bound_later_is_rejected() {
    let query = Query::new("Page")
        .with_condition(Clause::new("c1", "Block", "with text", "x"))
        .with_condition(Clause::new("c2", "Page", "is referenced by", "Block"));
    assert!(matches!(
        compile(&query).unwrap_err(),
        CompileError::UnboundVariable { uid, .. } if uid == "c1"
    ));
}

#[test]
fn test_incomplete_group_child_blocks_compilation() {
    let query = Query::new("Page").with_condition(Group::or(
        "g",
        vec![
            Clause::new("a", "Page", "has title", "x").into(),
            Clause::new("b", "Page", "links to", "y").into(),
        ],
    ));
    assert_eq!(
        compile(&query).unwrap_err(),
        CompileError::IncompleteQuery {
            uid: "b".to_string(),
            reason: IncompleteReason::UnknownRelation("links to".to_string()),
        }
    );
}

#[test]
fn test_duplicate_conditions_are_kept() {
    let query = Query::new("Page")
        .with_condition(Clause::new("c1", "Page", "has title", "x"))
        .with_condition(Clause::new("c2", "Page", "has title", "x"));
    assert_eq!(compile(&query).unwrap().clauses.len(), 2);
}

#[test]
fn test_variable_names_with_spaces_are_sanitized() {
    let query = Query::new("My Page").with_condition(Clause::new("c1", "My Page", "has title", "x"));
    let compiled = compile(&query).unwrap();
    assert_eq!(compiled.find, vec!["My Page"]);
    assert_eq!(
        compiled.to_datalog(),
        "[:find ?My_Page\n :where\n [?My_Page :node/title \"x\"]]"
    );
}

#[test]
fn test_end_to_end_from_outline() {
    let tree = OutlineNode::new("root", "Query").with_children([OutlineNode::text("scratch")
        .with_children([
            setting("return", "Page"),
            OutlineNode::text("conditions")
                .with_children([clause_node("c1", "Page", "has title", "Daily Notes")]),
        ])]);
    let query = build_query(&tree).unwrap();
    let compiled = compile(&query).unwrap();
    assert_eq!(
        compiled.to_datalog(),
        "[:find ?Page\n :where\n [?Page :node/title \"Daily Notes\"]]"
    );
}

#[test]
fn test_text_and_builder_agree() {
    let from_text = parse_query_text(
        "Find Page Where\n\
         Page is referenced by Block\n\
         NOT Block with text done\n\
         Select\n\
         upper(Page) AS Shout",
    )
    .unwrap();
    let built = Query::new("Page")
        .with_condition(Clause::new("x", "Page", "is referenced by", "Block"))
        .with_condition(Clause::new("y", "Block", "with text", "done").with_negated(true))
        .with_selection(Selection::new("z", "Shout", "upper(Page)"));

    assert_eq!(
        compile(&from_text).unwrap().to_datalog(),
        compile(&built).unwrap().to_datalog()
    );
}
