//! Line-oriented plain-text query format.
//!
//! ```text
//! Find Page Where
//! Page references Block
//! NOT Block with text done
//! Select
//! upper(Page) AS Shout
//! ```
//!
//! The first non-blank line is the `Find <var> Where` header. Each following
//! line is a condition `[NOT] <source> <relation> <target>` until an optional
//! `Select` line, after which each line is `<expression> AS <label>`.
//! Relation labels are matched longest first, ignoring case.

use nom::{
    bytes::complete::{tag_no_case, take_till1},
    character::complete::{space0, space1},
    combinator::{all_consuming, opt},
    sequence::{delimited, terminated, tuple},
    IResult,
};

use crate::error::{CompileError, CompileResult};
use crate::model::{Clause, Query, Selection};
use crate::relation::RelationRegistry;

/// Parses the plain-text query format.
///
/// # Errors
///
/// Returns [`CompileError::Syntax`] with the one-based line number of the
/// first line that cannot be read.
///
/// # Example
///
/// ```rust
/// use outline_query::{compile, parse_query_text};
///
/// let query = parse_query_text("Find Page Where\nPage has title Daily Notes").unwrap();
/// assert_eq!(query.return_variable, "Page");
/// assert!(compile(&query).is_ok());
/// ```
pub fn parse_query_text(text: &str) -> CompileResult<Query> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header) = lines.next().ok_or_else(|| CompileError::Syntax {
        line: 1,
        message: "expected 'Find <variable> Where'".to_string(),
    })?;
    let return_variable = match header_parser(header) {
        Ok((_, variable)) => variable.to_string(),
        Err(_) => {
            return Err(CompileError::Syntax {
                line: header_line,
                message: "expected 'Find <variable> Where'".to_string(),
            })
        }
    };

    let registry = RelationRegistry::builtin();
    let mut labels = registry.labels();
    labels.sort_by_key(|label| std::cmp::Reverse(label.len()));

    let mut query = Query::new(return_variable);
    let mut in_selections = false;

    for (line_number, line) in lines {
        if !in_selections && line.eq_ignore_ascii_case("select") {
            in_selections = true;
            continue;
        }

        if in_selections {
            let selection = parse_selection_line(line, query.selections.len())
                .map_err(|message| CompileError::Syntax {
                    line: line_number,
                    message,
                })?;
            if query.selections.iter().any(|s| s.label == selection.label) {
                return Err(CompileError::DuplicateSelectionLabel(selection.label));
            }
            query.selections.push(selection);
        } else {
            let clause = parse_condition_line(line, &labels, query.conditions.len())
                .map_err(|message| CompileError::Syntax {
                    line: line_number,
                    message,
                })?;
            query.conditions.push(clause.into());
        }
    }

    Ok(query)
}

fn header_parser(input: &str) -> IResult<&str, &str> {
    all_consuming(delimited(
        tuple((tag_no_case("find"), space1)),
        take_till1(char::is_whitespace),
        tuple((space1, tag_no_case("where"), space0)),
    ))(input)
}

fn not_prefix(input: &str) -> IResult<&str, Option<&str>> {
    opt(terminated(tag_no_case("not"), space1))(input)
}

fn parse_condition_line(line: &str, labels: &[&str], index: usize) -> Result<Clause, String> {
    let (rest, negated) = not_prefix(line)
        .map(|(rest, not)| (rest, not.is_some()))
        .unwrap_or((line, false));

    let mut parts = rest.splitn(2, char::is_whitespace);
    let source = parts.next().unwrap_or_default();
    let remainder = parts.next().unwrap_or_default().trim_start();
    if source.is_empty() {
        return Err("expected '<source> <relation> <target>'".to_string());
    }

    let (label, target) = labels
        .iter()
        .find_map(|label| split_relation(remainder, label).map(|target| (*label, target)))
        .ok_or_else(|| format!("no known relation in '{}'", remainder))?;

    Ok(Clause::new(format!("c{}", index), source, label, target).with_negated(negated))
}

/// Splits `input` into `label` and the target that follows it.
fn split_relation<'a>(input: &'a str, label: &str) -> Option<&'a str> {
    let mut rest = input;
    for word in label.split_whitespace() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if !rest[..end].eq_ignore_ascii_case(word) {
            return None;
        }
        rest = rest[end..].trim_start();
    }
    Some(rest.trim())
}

fn parse_selection_line(line: &str, index: usize) -> Result<Selection, String> {
    let lower = line.to_ascii_lowercase();
    let split = lower
        .rfind(" as ")
        .ok_or_else(|| "expected '<expression> AS <label>'".to_string())?;
    let expression = line[..split].trim();
    let label = line[split + 4..].trim();
    if expression.is_empty() || label.is_empty() {
        return Err("expected '<expression> AS <label>'".to_string());
    }
    Ok(Selection::new(format!("s{}", index), label, expression))
}
