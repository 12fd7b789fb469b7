//! Delimited-bundle adapter: one `<table>.csv` per logical table in a directory.

use std::path::{Path, PathBuf};

use crate::error::{EtlError, EtlResult};
use crate::schema::{LogicalTable, RawLayout};
use crate::types::{DataSet, Value};

use super::{project_headers, raw_schema, raw_text, RawSource};

/// A directory holding the delimited bundle.
#[derive(Debug, Clone)]
pub struct DelimitedBundle {
    dir: PathBuf,
    delimiter: u8,
}

impl DelimitedBundle {
    /// Bundle of comma-separated files under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    /// Use a different field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Path of the file holding `table`.
    pub fn path_of(&self, table: LogicalTable) -> PathBuf {
        self.dir.join(format!(
            "{}.csv",
            RawLayout::DelimitedBundle.source_name(table)
        ))
    }
}

impl RawSource for DelimitedBundle {
    fn layout(&self) -> RawLayout {
        RawLayout::DelimitedBundle
    }

    fn load(&self, table: LogicalTable) -> EtlResult<DataSet> {
        let path = self.path_of(table);
        if !path.is_file() {
            return Err(EtlError::load(
                table.name(),
                format!("expected {} not found", path.display()),
            ));
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_path(&path)?;
        ingest_csv_from_reader(&mut rdr, table)
    }
}

/// Read one raw table from an existing CSV reader.
///
/// Rules:
///
/// - The reader must have headers, containing every physical column of `table` (order can differ).
/// - Extra columns are ignored.
/// - Blank cells become [`Value::Null`]; everything else is kept as raw text.
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    table: LogicalTable,
) -> EtlResult<DataSet> {
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();
    let col_idxs = project_headers(RawLayout::DelimitedBundle, table, &headers)?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row = col_idxs
            .iter()
            .map(|&idx| raw_text(record.get(idx).unwrap_or("")))
            .collect();
        rows.push(row);
    }

    Ok(DataSet::new(raw_schema(table), rows))
}
