#![cfg(feature = "excel")]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use crate::error::{EtlError, EtlResult};
use crate::schema::{LogicalTable, RawLayout};
use crate::types::{DataSet, Value};

use super::{project_headers, raw_schema, raw_text, RawSource};

/// A multi-sheet workbook (`.xlsx`, `.xls`, `.ods`, ...) holding one sheet per logical table.
///
/// The workbook is opened once; sheets are read on demand.
pub struct Workbook {
    path: PathBuf,
    sheets: Mutex<Sheets<BufReader<File>>>,
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook").field("path", &self.path).finish()
    }
}

impl Workbook {
    /// Open the workbook at `path`.
    ///
    /// A missing file is an [`EtlError::Load`].
    pub fn open(path: impl AsRef<Path>) -> EtlResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(EtlError::load(
                "workbook",
                format!("expected {} not found", path.display()),
            ));
        }
        let sheets = open_workbook_auto(&path)?;
        Ok(Self {
            path,
            sheets: Mutex::new(sheets),
        })
    }

    /// Path the workbook was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawSource for Workbook {
    fn layout(&self) -> RawLayout {
        RawLayout::Workbook
    }

    fn load(&self, table: LogicalTable) -> EtlResult<DataSet> {
        let sheet = RawLayout::Workbook.source_name(table);
        let range = {
            let mut sheets = self
                .sheets
                .lock()
                .map_err(|_| EtlError::load(table.name(), "workbook lock poisoned"))?;
            if !sheets.sheet_names().iter().any(|name| name == sheet) {
                return Err(EtlError::load(
                    table.name(),
                    format!("sheet '{sheet}' not found in {}", self.path.display()),
                ));
            }
            sheets.worksheet_range(sheet)?
        };
        ingest_sheet_range(table, &range)
    }
}

/// Read one raw table from a sheet range.
///
/// The first non-empty row is the header row. Cells keep their workbook type (numbers stay
/// numbers); empty cells, blank strings and error cells become [`Value::Null`].
pub fn ingest_sheet_range(table: LogicalTable, range: &calamine::Range<Data>) -> EtlResult<DataSet> {
    let sheet = RawLayout::Workbook.source_name(table);
    let (header_row_idx, headers) = find_header_row(range).ok_or_else(|| {
        EtlError::schema(
            table.name(),
            format!("sheet '{sheet}' has no non-empty rows (no header row found)"),
        )
    })?;
    let col_idxs = project_headers(RawLayout::Workbook, table, &headers)?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in range.rows().skip(header_row_idx + 1) {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let out_row = col_idxs
            .iter()
            .map(|&idx| raw_cell(row.get(idx).unwrap_or(&Data::Empty)))
            .collect();
        rows.push(out_row);
    }

    Ok(DataSet::new(raw_schema(table), rows))
}

fn find_header_row(range: &calamine::Range<Data>) -> Option<(usize, Vec<String>)> {
    range.rows().enumerate().find_map(|(idx0, row)| {
        let non_empty = row.iter().any(|c| !matches!(c, Data::Empty));
        non_empty.then(|| (idx0, row.iter().map(cell_to_header_string).collect()))
    })
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn raw_cell(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => raw_text(s),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTimeIso(s) | Data::DurationIso(s) => raw_text(s),
        Data::DateTime(d) => Value::Utf8(d.to_string()),
    }
}
