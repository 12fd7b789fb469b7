//! Shape and missing-value summaries for operator visibility.
//!
//! Read-only observers of a table: nothing here changes what the pipeline produces.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::types::DataSet;

/// Summary of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    /// Table name as shown to the operator.
    pub table: String,
    pub rows: usize,
    pub columns: usize,
    /// Rows with at least one missing value.
    pub rows_with_missing: usize,
    pub column_names: Vec<String>,
    /// Missing values per column, in column order.
    pub missing_by_column: Vec<usize>,
}

/// Summarize a table.
pub fn summarize(table: impl Into<String>, ds: &DataSet) -> TableSummary {
    let columns = ds.column_count();
    let mut missing_by_column = vec![0usize; columns];
    let mut rows_with_missing = 0usize;
    for row in &ds.rows {
        let mut any = false;
        for (idx, missing) in missing_by_column.iter_mut().enumerate() {
            if row.get(idx).is_none_or(|v| v.is_null()) {
                *missing += 1;
                any = true;
            }
        }
        if any {
            rows_with_missing += 1;
        }
    }

    TableSummary {
        table: table.into(),
        rows: ds.row_count(),
        columns,
        rows_with_missing,
        column_names: ds.schema.field_names().map(str::to_owned).collect(),
        missing_by_column,
    }
}

/// Render summaries as a text grid: one line per table.
pub fn render_summary(summaries: &[TableSummary]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120)
        .set_header(vec!["Table", "Rows, Columns", "Rows with missing", "Columns"]);

    for s in summaries {
        table.add_row(vec![
            Cell::new(&s.table),
            Cell::new(format!("{}, {}", s.rows, s.columns)).set_alignment(CellAlignment::Right),
            Cell::new(s.rows_with_missing).set_alignment(CellAlignment::Right),
            Cell::new(s.column_names.join(", ")),
        ]);
    }
    table.to_string()
}

/// Log a titled summary grid at `info`.
pub fn log_summary(title: &str, summaries: &[TableSummary]) {
    tracing::info!("{title}\n{}", render_summary(summaries));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field, Schema, Value};

    fn sample() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("id_student", DataType::Utf8),
                Field::new("imd_band", DataType::Utf8),
                Field::new("studied_credits", DataType::Int64),
            ]),
            vec![
                vec![Value::Utf8("1".into()), Value::Null, Value::Int64(60)],
                vec![Value::Utf8("2".into()), Value::Utf8("0-10%".into()), Value::Null],
                vec![Value::Utf8("3".into()), Value::Utf8("0-10%".into()), Value::Int64(30)],
            ],
        )
    }

    #[test]
    fn counts_rows_and_columns_with_missing_values() {
        let s = summarize("studentInfo", &sample());
        assert_eq!(s.rows, 3);
        assert_eq!(s.columns, 3);
        assert_eq!(s.rows_with_missing, 2);
        assert_eq!(s.missing_by_column, vec![0, 1, 1]);
    }

    #[test]
    fn rendered_grid_names_each_table() {
        let out = render_summary(&[summarize("studentInfo", &sample())]);
        assert!(out.contains("studentInfo"));
        assert!(out.contains("3, 3"));
    }

    #[test]
    fn summary_serializes_to_json() {
        let json = serde_json::to_value(summarize("vle", &sample())).unwrap();
        assert_eq!(json["rows_with_missing"], 2);
        assert_eq!(json["column_names"][1], "imd_band");
    }
}
