//! SQL query models.
//!
//! Contains the result set returned by query execution and the bar chart
//! derived from it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a SQL query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    /// Column information, in select-list order.
    pub columns: Vec<ColumnInfo>,

    /// Row data (each row is a vector of JSON values, one per column).
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned.
    #[serde(default)]
    pub row_count: usize,

    /// Query execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Column information in query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the driver.
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

impl QueryResult {
    /// Creates a query result from columns and rows.
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms: 0,
        }
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether the result can be drawn as a bar chart.
    ///
    /// Requires exactly two columns, at least one row, and a second column
    /// made entirely of numbers (a NULL disqualifies the column).
    pub fn is_chartable(&self) -> bool {
        self.columns.len() == 2
            && !self.rows.is_empty()
            && self
                .rows
                .iter()
                .all(|row| row.get(1).is_some_and(serde_json::Value::is_number))
    }

    /// Bar chart keyed by the first column, valued by the second.
    pub fn bar_chart(&self) -> Option<BarChart> {
        if !self.is_chartable() {
            return None;
        }
        let bars = self
            .rows
            .iter()
            .filter_map(|row| {
                let value = row.get(1)?.as_f64()?;
                let category = row.first().map(display_value).unwrap_or_default();
                Some(Bar { category, value })
            })
            .collect();
        Some(BarChart {
            category_label: self.columns[0].name.clone(),
            value_label: self.columns[1].name.clone(),
            bars,
        })
    }
}

/// Bar chart derived from a two-column result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BarChart {
    /// Name of the category (first) column.
    pub category_label: String,
    /// Name of the value (second) column.
    pub value_label: String,
    /// One bar per row, in row order.
    pub bars: Vec<Bar>,
}

/// A single bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bar {
    pub category: String,
    pub value: f64,
}

/// Renders a cell value as plain text.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> QueryResult {
        QueryResult::new(
            columns.iter().map(|c| ColumnInfo::new(*c, "TEXT")).collect(),
            rows,
        )
    }

    #[test]
    fn test_two_numeric_columns_chart() {
        let r = result(
            &["category", "revenue"],
            vec![
                vec![json!("Beauty"), json!(143515.0)],
                vec![json!("Clothing"), json!(155580)],
            ],
        );
        let chart = r.bar_chart().expect("chartable");
        assert_eq!(chart.category_label, "category");
        assert_eq!(chart.value_label, "revenue");
        assert_eq!(chart.bars.len(), 2);
        assert_eq!(chart.bars[1].category, "Clothing");
        assert_eq!(chart.bars[1].value, 155580.0);
    }

    #[test]
    fn test_other_arities_do_not_chart() {
        let one = result(&["n"], vec![vec![json!(1)]]);
        assert!(one.bar_chart().is_none());

        let three = result(
            &["a", "b", "c"],
            vec![vec![json!("x"), json!(1), json!(2)]],
        );
        assert!(three.bar_chart().is_none());
    }

    #[test]
    fn test_non_numeric_second_column_does_not_chart() {
        let r = result(
            &["customer", "gender"],
            vec![
                vec![json!("CUST001"), json!("Male")],
                vec![json!("CUST002"), json!("Female")],
            ],
        );
        assert!(!r.is_chartable());

        let mixed = result(
            &["day", "total"],
            vec![vec![json!("Mon"), json!(3)], vec![json!("Tue"), json!(null)]],
        );
        assert!(!mixed.is_chartable());
    }

    #[test]
    fn test_empty_result_does_not_chart() {
        let r = result(&["day", "total"], vec![]);
        assert!(!r.is_chartable());
        assert_eq!(r.row_count, 0);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!(null)), "NULL");
        assert_eq!(display_value(&json!("a")), "a");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&json!(true)), "true");
    }
}
