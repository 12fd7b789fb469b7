//! Persistence of cleaned, joined and encoded tables.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EtlResult;
use crate::types::DataSet;

/// Output name of the joined record set.
pub const JOINED_OUTPUT: &str = "etl_output";
/// Output name of the encoded student table.
pub const ENCODED_OUTPUT: &str = "studentInfo_ordinal";

/// A destination for finished tables.
pub trait TableSink: Send + Sync {
    /// Persist `table` under `name`.
    fn persist(&self, name: &str, table: &DataSet) -> EtlResult<()>;
}

/// Writes each table to `<dir>/<name>.csv`.
///
/// Header row present, no index column, missing values as empty fields, `-1` sentinels literal.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    dir: PathBuf,
}

impl CsvDirectorySink {
    /// Sink into `dir`; the directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path a table named `name` is written to.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }
}

impl TableSink for CsvDirectorySink {
    fn persist(&self, name: &str, table: &DataSet) -> EtlResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_of(name);
        let mut wtr = csv::Writer::from_path(&path)?;
        write_csv(&mut wtr, table)?;
        tracing::debug!(output = name, path = %path.display(), rows = table.row_count(), "wrote table");
        Ok(())
    }
}

/// Write `table` through an existing CSV writer.
pub fn write_csv<W: std::io::Write>(wtr: &mut csv::Writer<W>, table: &DataSet) -> EtlResult<()> {
    wtr.write_record(table.schema.field_names())?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render `table` as CSV text.
pub fn to_csv_string(table: &DataSet) -> EtlResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    write_csv(&mut wtr, table)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogicalTable;
    use crate::types::Value;

    #[test]
    fn sentinels_are_literal_and_missing_is_empty() {
        let ds = DataSet::new(
            LogicalTable::StudentRegistration.cleaned_schema(),
            vec![vec![
                Value::Utf8("AAA".into()),
                Value::Utf8("2013J".into()),
                Value::Utf8("11391".into()),
                Value::Int64(-159),
                Value::Int64(-1),
            ]],
        );
        let text = to_csv_string(&ds).unwrap();
        assert_eq!(
            text,
            "code_module,code_presentation,id_student,date_registration,date_unregistration\n\
             AAA,2013J,11391,-159,-1\n"
        );
    }

    #[test]
    fn floats_and_flags_render_like_the_raw_bundle() {
        let ds = DataSet::new(
            LogicalTable::StudentAssessment.cleaned_schema(),
            vec![vec![
                Value::Utf8("11391".into()),
                Value::Utf8("1752".into()),
                Value::Int64(18),
                Value::Bool(false),
                Value::Null,
            ]],
        );
        let text = to_csv_string(&ds).unwrap();
        assert!(text.ends_with("11391,1752,18,0,\n"));
    }
}
