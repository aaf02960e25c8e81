//! Query result types.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use outline_query::{SelectionEvaluationError, Value};

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cell {
    /// A computed or bound value.
    Value(Value),
    /// A selection that failed for this row.
    Error(SelectionEvaluationError),
}

impl Cell {
    /// Returns the value, or `None` for an error cell.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Cell::Value(value) => Some(value),
            Cell::Error(_) => None,
        }
    }

    /// Returns true for an error cell.
    pub fn is_error(&self) -> bool {
        matches!(self, Cell::Error(_))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(value) => write!(f, "{}", value),
            Cell::Error(err) => write!(f, "#ERROR({})", err),
        }
    }
}

/// One projected result row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultRow {
    /// Stable identifier: the text of the value bound to the return variable,
    /// suffixed with its type name only when another value in the same
    /// result already rendered to that text.
    pub id: String,
    /// Cells keyed by column name (the return variable or a selection label).
    pub columns: HashMap<String, Cell>,
}

impl ResultRow {
    /// Returns the cell for `column`.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns.get(column)
    }

    /// Returns the value for `column`, skipping error cells.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.get(column).and_then(Cell::value)
    }
}

/// Result of running a query.
///
/// # Example
///
/// ```ignore
/// let result = executor.run(&query).await?;
///
/// println!("Found {} rows", result.len());
/// for row in &result {
///     println!("{}: {:?}", row.id, row.get("Title"));
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultSet {
    /// Column names in display order.
    pub columns: Vec<String>,
    /// Rows in first-seen order, unique by id.
    pub rows: Vec<ResultRow>,
    /// Execution statistics.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub stats: ExecutionStats,
}

impl ResultSet {
    /// Creates a result set.
    pub fn new(columns: Vec<String>, rows: Vec<ResultRow>, stats: ExecutionStats) -> Self {
        Self {
            columns,
            rows,
            stats,
        }
    }

    /// Creates an empty result set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns an iterator over rows.
    pub fn iter(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter()
    }

    /// Row ids in order.
    pub fn ids(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.id.as_str()).collect()
    }

    /// Looks a row up by id.
    pub fn get(&self, id: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|row| row.id == id)
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Statistics from query execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStats {
    /// Total execution duration.
    pub duration: Duration,
    /// Number of raw tuples returned by the backend.
    pub raw_tuples: usize,
    /// Number of tuples dropped because their id was already seen.
    pub duplicates_merged: usize,
    /// Number of cells whose selection failed.
    pub degraded_cells: usize,
}
