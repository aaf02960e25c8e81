//! Relation operator catalog.
//!
//! Every relation a condition can use is a variant of the closed [`Relation`]
//! enum. The [`RelationRegistry`] maps user-facing labels onto those variants
//! and compiles them into Datalog clause templates. The registry is built once
//! and is read-only afterwards, so a single instance is shared by every
//! compilation.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;

use crate::datalog::{DatalogClause, Term};
use crate::error::{CompileError, CompileResult};

/// Kind of node a relation accepts as its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Pages or blocks.
    Any,
    /// Pages only.
    Page,
    /// Blocks only.
    Block,
}

impl NodeKind {
    /// Returns true if a relation accepting `self` can start from a node of
    /// kind `node`. `Any` on either side matches.
    pub fn accepts(self, node: NodeKind) -> bool {
        self == NodeKind::Any || node == NodeKind::Any || self == node
    }
}

/// How a relation interprets its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetKind {
    /// A variable naming another node; introduces it when not yet bound.
    Node,
    /// A literal node type (`page` or `block`).
    NodeType,
    /// A literal string.
    Text,
    /// A literal date (`YYYY-MM-DD`) or epoch milliseconds.
    Date,
}

impl TargetKind {
    /// Returns true if the target names a variable rather than a literal.
    pub fn is_variable(self) -> bool {
        matches!(self, TargetKind::Node)
    }
}

/// The closed set of built-in relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    /// `is a`
    IsA,
    /// `has title`
    HasTitle,
    /// `with text in title`
    WithTextInTitle,
    /// `with text`
    WithText,
    /// `references`
    References,
    /// `is referenced by`
    IsReferencedBy,
    /// `references title`
    ReferencesTitle,
    /// `is in page`
    IsInPage,
    /// `is in page with title`
    IsInPageWithTitle,
    /// `has child`
    HasChild,
    /// `has parent`
    HasParent,
    /// `has ancestor`
    HasAncestor,
    /// `has descendant`
    HasDescendant,
    /// `has attribute`
    HasAttribute,
    /// `created by`
    CreatedBy,
    /// `edited by`
    EditedBy,
    /// `created before`
    CreatedBefore,
    /// `created after`
    CreatedAfter,
    /// `edited before`
    EditedBefore,
    /// `edited after`
    EditedAfter,
    /// `titled before`
    TitledBefore,
    /// `titled after`
    TitledAfter,
}

/// Static description of one relation.
#[derive(Debug, Clone, Copy)]
pub struct RelationDefinition {
    /// The relation variant.
    pub relation: Relation,
    /// Unique user-facing label.
    pub label: &'static str,
    /// Accepted source node kind.
    pub source: NodeKind,
    /// How the target is interpreted.
    pub target: TargetKind,
    /// Suggested target values for autocompletion.
    pub suggestions: &'static [&'static str],
}

const fn def(
    relation: Relation,
    label: &'static str,
    source: NodeKind,
    target: TargetKind,
) -> RelationDefinition {
    RelationDefinition {
        relation,
        label,
        source,
        target,
        suggestions: &[],
    }
}

static DEFINITIONS: &[RelationDefinition] = &[
    RelationDefinition {
        relation: Relation::IsA,
        label: "is a",
        source: NodeKind::Any,
        target: TargetKind::NodeType,
        suggestions: &["page", "block"],
    },
    def(Relation::HasTitle, "has title", NodeKind::Page, TargetKind::Text),
    def(Relation::WithTextInTitle, "with text in title", NodeKind::Page, TargetKind::Text),
    def(Relation::WithText, "with text", NodeKind::Block, TargetKind::Text),
    def(Relation::References, "references", NodeKind::Any, TargetKind::Node),
    def(Relation::IsReferencedBy, "is referenced by", NodeKind::Any, TargetKind::Node),
    def(Relation::ReferencesTitle, "references title", NodeKind::Block, TargetKind::Text),
    def(Relation::IsInPage, "is in page", NodeKind::Block, TargetKind::Node),
    def(Relation::IsInPageWithTitle, "is in page with title", NodeKind::Block, TargetKind::Text),
    def(Relation::HasChild, "has child", NodeKind::Any, TargetKind::Node),
    def(Relation::HasParent, "has parent", NodeKind::Block, TargetKind::Node),
    def(Relation::HasAncestor, "has ancestor", NodeKind::Block, TargetKind::Node),
    def(Relation::HasDescendant, "has descendant", NodeKind::Any, TargetKind::Node),
    def(Relation::HasAttribute, "has attribute", NodeKind::Any, TargetKind::Text),
    def(Relation::CreatedBy, "created by", NodeKind::Any, TargetKind::Text),
    def(Relation::EditedBy, "edited by", NodeKind::Any, TargetKind::Text),
    def(Relation::CreatedBefore, "created before", NodeKind::Any, TargetKind::Date),
    def(Relation::CreatedAfter, "created after", NodeKind::Any, TargetKind::Date),
    def(Relation::EditedBefore, "edited before", NodeKind::Any, TargetKind::Date),
    def(Relation::EditedAfter, "edited after", NodeKind::Any, TargetKind::Date),
    def(Relation::TitledBefore, "titled before", NodeKind::Page, TargetKind::Date),
    def(Relation::TitledAfter, "titled after", NodeKind::Page, TargetKind::Date),
];

impl Relation {
    /// Returns the static definition of this relation.
    pub fn definition(self) -> &'static RelationDefinition {
        // DEFINITIONS holds one entry per variant.
        DEFINITIONS
            .iter()
            .find(|d| d.relation == self)
            .unwrap_or(&DEFINITIONS[0])
    }

    /// User-facing label.
    pub fn label(self) -> &'static str {
        self.definition().label
    }

    /// How this relation interprets its target.
    pub fn target_kind(self) -> TargetKind {
        self.definition().target
    }

    /// Looks a relation up by label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        RelationRegistry::builtin().resolve(label)
    }

    /// Emits the clause template for `source <relation> target`.
    ///
    /// Helper variables introduced by the template are named after the source
    /// and suffixed with `scope` when given, so two conditions on the same
    /// source never share helpers.
    pub fn compile(
        self,
        source: &str,
        target: &str,
        scope: Option<&str>,
    ) -> CompileResult<Vec<DatalogClause>> {
        let s = Term::var(source);
        let helper = |suffix: &str| match scope {
            Some(scope) => Term::var(format!("{}-{}-{}", source, suffix, scope)),
            None => Term::var(format!("{}-{}", source, suffix)),
        };
        let pattern = DatalogClause::pattern;
        let includes = |var: Term, text: &str| {
            DatalogClause::predicate("clojure.string/includes?", vec![var, Term::text(text)])
        };

        let clauses = match self {
            Relation::IsA => match target.trim().to_lowercase().as_str() {
                "page" => vec![pattern(s, ":node/title", Term::Blank)],
                "block" => vec![pattern(s, ":block/page", Term::Blank)],
                _ => {
                    return Err(CompileError::InvalidTarget {
                        relation: self.label().to_string(),
                        target: target.to_string(),
                        message: "expected 'page' or 'block'".to_string(),
                    })
                }
            },
            Relation::HasTitle => vec![pattern(s, ":node/title", Term::text(target))],
            Relation::WithTextInTitle => {
                let title = helper("Title");
                vec![
                    pattern(s, ":node/title", title.clone()),
                    includes(title, target),
                ]
            }
            Relation::WithText => {
                let string = helper("String");
                vec![
                    pattern(s, ":block/string", string.clone()),
                    includes(string, target),
                ]
            }
            Relation::References => vec![pattern(s, ":block/refs", Term::var(target))],
            Relation::IsReferencedBy => vec![pattern(Term::var(target), ":block/refs", s)],
            Relation::ReferencesTitle => {
                let reference = helper("Ref");
                vec![
                    pattern(s, ":block/refs", reference.clone()),
                    pattern(reference, ":node/title", Term::text(target)),
                ]
            }
            Relation::IsInPage => vec![pattern(s, ":block/page", Term::var(target))],
            Relation::IsInPageWithTitle => {
                let page = helper("Page");
                vec![
                    pattern(s, ":block/page", page.clone()),
                    pattern(page, ":node/title", Term::text(target)),
                ]
            }
            Relation::HasChild => vec![pattern(s, ":block/children", Term::var(target))],
            Relation::HasParent => vec![pattern(Term::var(target), ":block/children", s)],
            Relation::HasAncestor => vec![pattern(s, ":block/parents", Term::var(target))],
            Relation::HasDescendant => vec![pattern(Term::var(target), ":block/parents", s)],
            Relation::HasAttribute => {
                let attribute = helper("Attribute");
                let block = helper("AttributeBlock");
                vec![
                    pattern(attribute.clone(), ":node/title", Term::text(target)),
                    pattern(block.clone(), ":block/refs", attribute),
                    pattern(block, ":block/parents", s),
                ]
            }
            Relation::CreatedBy => {
                let user = helper("Creator");
                vec![
                    pattern(s, ":create/user", user.clone()),
                    pattern(user, ":user/display-name", Term::text(target)),
                ]
            }
            Relation::EditedBy => {
                let user = helper("Editor");
                vec![
                    pattern(s, ":edit/user", user.clone()),
                    pattern(user, ":user/display-name", Term::text(target)),
                ]
            }
            Relation::CreatedBefore
            | Relation::CreatedAfter
            | Relation::EditedBefore
            | Relation::EditedAfter
            | Relation::TitledBefore
            | Relation::TitledAfter => {
                let (attribute, suffix) = match self {
                    Relation::CreatedBefore | Relation::CreatedAfter => (":create/time", "CreateTime"),
                    Relation::EditedBefore | Relation::EditedAfter => (":edit/time", "EditTime"),
                    _ => (":log/id", "Log"),
                };
                let comparator = match self {
                    Relation::CreatedBefore | Relation::EditedBefore | Relation::TitledBefore => "<",
                    _ => ">",
                };
                let millis = parse_date_millis(self, target)?;
                let time = helper(suffix);
                vec![
                    pattern(s, attribute, time.clone()),
                    DatalogClause::predicate(comparator, vec![time, Term::Integer(millis)]),
                ]
            }
        };

        Ok(clauses)
    }
}

fn parse_date_millis(relation: Relation, target: &str) -> CompileResult<i64> {
    let trimmed = target.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Ok(millis);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc().timestamp_millis())
        .ok_or_else(|| CompileError::InvalidTarget {
            relation: relation.label().to_string(),
            target: target.to_string(),
            message: "expected a date as YYYY-MM-DD or epoch milliseconds".to_string(),
        })
}

/// Registry of relation definitions keyed by case-insensitive label.
///
/// # Example
///
/// ```rust
/// use outline_query::RelationRegistry;
///
/// let registry = RelationRegistry::builtin();
/// assert_eq!(registry.labels()[0], "is a");
///
/// let clauses = registry.compile("has title", "Page", "Daily Notes").unwrap();
/// assert_eq!(clauses[0].to_string(), "[?Page :node/title \"Daily Notes\"]");
/// ```
#[derive(Debug)]
pub struct RelationRegistry {
    definitions: &'static [RelationDefinition],
    by_label: HashMap<String, Relation>,
}

impl RelationRegistry {
    fn new(definitions: &'static [RelationDefinition]) -> Self {
        let by_label = definitions
            .iter()
            .map(|d| (normalize_label(d.label), d.relation))
            .collect();
        Self {
            definitions,
            by_label,
        }
    }

    /// Returns the shared built-in registry.
    pub fn builtin() -> &'static RelationRegistry {
        static REGISTRY: OnceLock<RelationRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| RelationRegistry::new(DEFINITIONS))
    }

    /// Relation labels in presentation order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.definitions.iter().map(|d| d.label).collect()
    }

    /// Labels of the relations that accept a source of kind `node`, in
    /// presentation order. Editors use this to narrow the relation list once
    /// the source is known to be a page or a block.
    pub fn labels_for(&self, node: NodeKind) -> Vec<&'static str> {
        self.definitions
            .iter()
            .filter(|d| d.source.accepts(node))
            .map(|d| d.label)
            .collect()
    }

    /// All definitions in presentation order.
    pub fn definitions(&self) -> &[RelationDefinition] {
        self.definitions
    }

    /// Resolves a label to its relation.
    pub fn resolve(&self, label: &str) -> Option<Relation> {
        self.by_label.get(&normalize_label(label)).copied()
    }

    /// Returns the definition registered under `label`.
    pub fn definition(&self, label: &str) -> Option<&'static RelationDefinition> {
        self.resolve(label).map(Relation::definition)
    }

    /// Compiles `source <relation> target` into clauses.
    ///
    /// Fails with [`CompileError::UnknownRelation`] if `relation` is not
    /// registered.
    pub fn compile(
        &self,
        relation: &str,
        source: &str,
        target: &str,
    ) -> CompileResult<Vec<DatalogClause>> {
        self.compile_scoped(relation, source, target, None)
    }

    /// Like [`compile`](Self::compile), with helper variables suffixed by `scope`.
    pub fn compile_scoped(
        &self,
        relation: &str,
        source: &str,
        target: &str,
        scope: Option<&str>,
    ) -> CompileResult<Vec<DatalogClause>> {
        let resolved = self
            .resolve(relation)
            .ok_or_else(|| CompileError::UnknownRelation(relation.to_string()))?;
        resolved.compile(source, target, scope)
    }

    /// Suggested target values for `source <relation> ?`.
    ///
    /// Empty when the relation imposes no constraint or is unknown. The
    /// suggestions depend on the relation alone, not on the source variable.
    pub fn valid_targets(&self, _source: &str, relation: &str) -> Vec<String> {
        self.definition(relation)
            .map(|d| d.suggestions.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }
}

fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
