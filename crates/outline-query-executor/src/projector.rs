//! Projection of bound rows into result rows.

use std::collections::{HashMap, HashSet};

use outline_query::{BoundRow, CompiledQuery, Value};
use tracing::{debug, warn};

use crate::result::{Cell, ExecutionStats, ResultRow, ResultSet};

/// Minimum row count before selections are evaluated on the rayon pool.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 256;

/// Turns bound rows into deduplicated result rows with selection columns.
///
/// Rows are keyed by the value bound to the return variable. When several
/// rows share an id (disjunctions can derive the same entity more than
/// once) the first one wins, and selections are evaluated only for the rows
/// that survive.
#[derive(Debug, Clone)]
pub struct ResultProjector<'q> {
    query: &'q CompiledQuery,
    parallel: bool,
}

impl<'q> ResultProjector<'q> {
    /// Creates a sequential projector for `query`.
    pub fn new(query: &'q CompiledQuery) -> Self {
        Self {
            query,
            parallel: false,
        }
    }

    /// Enables parallel selection evaluation (requires `parallel` feature).
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Projects `rows` into a result set.
    ///
    /// The returned stats carry tuple, duplicate and degraded-cell counts;
    /// the duration is left for the caller to fill in.
    pub fn project(&self, rows: Vec<BoundRow>) -> ResultSet {
        let raw_tuples = rows.len();
        let return_variable = self.query.return_variable.as_str();

        let mut seen = HashSet::with_capacity(rows.len());
        let mut ids = HashSet::with_capacity(rows.len());
        let mut unique = Vec::with_capacity(rows.len());
        let mut duplicates_merged = 0;
        for row in rows {
            let Some(value) = row.get(return_variable) else {
                warn!(variable = %return_variable, "row without return variable skipped");
                continue;
            };
            if !seen.insert(value.key()) {
                duplicates_merged += 1;
                continue;
            }
            let id = unique_id(value, &mut ids);
            unique.push((id, row));
        }

        let projected = self.project_unique(unique);
        let degraded_cells = projected
            .iter()
            .flat_map(|row| row.columns.values())
            .filter(|cell| cell.is_error())
            .count();

        if degraded_cells > 0 {
            warn!(degraded_cells, "some selections failed to evaluate");
        }
        debug!(
            raw_tuples,
            rows = projected.len(),
            duplicates_merged,
            parallel = self.parallel,
            "projected result rows"
        );

        ResultSet::new(
            self.query.columns(),
            projected,
            ExecutionStats {
                raw_tuples,
                duplicates_merged,
                degraded_cells,
                ..ExecutionStats::default()
            },
        )
    }

    #[cfg(feature = "parallel")]
    fn project_unique(&self, unique: Vec<(String, BoundRow)>) -> Vec<ResultRow> {
        use rayon::prelude::*;

        if self.parallel && unique.len() >= PARALLEL_THRESHOLD {
            unique
                .into_par_iter()
                .map(|(id, row)| self.project_row(id, &row))
                .collect()
        } else {
            unique
                .into_iter()
                .map(|(id, row)| self.project_row(id, &row))
                .collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn project_unique(&self, unique: Vec<(String, BoundRow)>) -> Vec<ResultRow> {
        unique
            .into_iter()
            .map(|(id, row)| self.project_row(id, &row))
            .collect()
    }

    fn project_row(&self, id: String, row: &BoundRow) -> ResultRow {
        let mut columns = HashMap::with_capacity(self.query.selections.len() + 1);
        if let Some(value) = row.get(&self.query.return_variable) {
            columns.insert(self.query.return_variable.clone(), Cell::Value(value.clone()));
        }
        for selection in &self.query.selections {
            let cell = match selection.evaluate(row) {
                Ok(value) => Cell::Value(value),
                Err(err) => {
                    debug!(row = %id, label = %selection.label, error = %err, "selection failed");
                    Cell::Error(err)
                }
            };
            columns.insert(selection.label.clone(), cell);
        }
        ResultRow { id, columns }
    }
}

/// Display text of `value`, suffixed with its type when a different value
/// already took the same text (`1` and `"1"` in one column).
fn unique_id(value: &Value, ids: &mut HashSet<String>) -> String {
    let text = value.to_string();
    if ids.insert(text.clone()) {
        return text;
    }
    let tagged = format!("{}:{}", text, value.type_name());
    ids.insert(tagged.clone());
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_query::{compile, Clause, Query, Selection, SelectionEvaluationError};

    fn compiled(selections: &[(&str, &str)]) -> CompiledQuery {
        let mut query = Query::new("x").with_condition(Clause::new("c1", "x", "is a", "page"));
        for (i, (label, expression)) in selections.iter().enumerate() {
            query = query.with_selection(Selection::new(format!("s{}", i), *label, *expression));
        }
        compile(&query).unwrap()
    }

    fn rows(ids: &[&str]) -> Vec<BoundRow> {
        ids.iter()
            .map(|id| [("x", Value::from(*id))].into_iter().collect())
            .collect()
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let query = compiled(&[]);
        let result = ResultProjector::new(&query).project(rows(&["A", "A", "B"]));
        assert_eq!(result.ids(), vec!["A", "B"]);
        assert_eq!(result.stats.raw_tuples, 3);
        assert_eq!(result.stats.duplicates_merged, 1);
        assert_eq!(result.rows[0].value("x"), Some(&Value::from("A")));
    }

    #[test]
    fn test_selection_error_degrades_single_cell() {
        let query = compiled(&[("Len", "len(x)"), ("Half", "10 / len(x)")]);
        let result = ResultProjector::new(&query).project(rows(&["ab", ""]));

        let first = result.get("ab").unwrap();
        assert_eq!(first.value("Len"), Some(&Value::Integer(2)));
        assert_eq!(first.value("Half"), Some(&Value::Integer(5)));

        let second = result.get("").unwrap();
        assert_eq!(second.value("Len"), Some(&Value::Integer(0)));
        assert_eq!(
            second.get("Half"),
            Some(&Cell::Error(SelectionEvaluationError::DivisionByZero))
        );
        assert_eq!(result.stats.degraded_cells, 1);
        assert_eq!(result.columns, vec!["x", "Len", "Half"]);
    }

    #[test]
    fn test_dedup_keeps_values_of_different_types_apart() {
        let query = compiled(&[]);
        let input: Vec<BoundRow> = [Value::Integer(1), Value::from("1"), Value::Integer(1)]
            .into_iter()
            .map(|value| [("x", value)].into_iter().collect())
            .collect();

        let result = ResultProjector::new(&query).project(input);
        assert_eq!(result.ids(), vec!["1", "1:string"]);
        assert_eq!(result.rows[0].value("x"), Some(&Value::Integer(1)));
        assert_eq!(result.rows[1].value("x"), Some(&Value::from("1")));
        assert_eq!(result.stats.duplicates_merged, 1);
    }

    #[test]
    fn test_rows_without_return_variable_are_skipped() {
        let query = compiled(&[]);
        let mut input = rows(&["A"]);
        input.push([("y", Value::Integer(1))].into_iter().collect());
        let result = ResultProjector::new(&query).project(input);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_parallel_flag_preserves_order() {
        let query = compiled(&[("Upper", "upper(x)")]);
        let ids: Vec<String> = (0..600).map(|i| format!("n{}", i)).collect();
        let input: Vec<BoundRow> = ids
            .iter()
            .map(|id| [("x", Value::from(id.as_str()))].into_iter().collect())
            .collect();

        let result = ResultProjector::new(&query).with_parallel(true).project(input);
        let expected: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(result.ids(), expected);
        assert_eq!(result.rows[599].value("Upper"), Some(&Value::from("N599")));
    }
}
