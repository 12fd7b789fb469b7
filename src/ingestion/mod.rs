//! Raw-layout adapters.
//!
//! Each adapter implements [`RawSource`]: it lists the logical tables it can provide and loads
//! one of them as a raw [`DataSet`] whose columns already carry logical names (physical headers
//! are resolved through [`crate::schema::RawLayout::resolve`]). Values are left as found in the
//! source, apart from blank cells and missing markers such as `NA`, which become
//! [`Value::Null`]; typing is the cleaner's job.
//!
//! - [`csv`]: the delimited bundle (one `.csv` per table)
//! - [`excel`]: the multi-sheet workbook (cargo feature `excel`)
//! - [`InMemorySource`]: tables the caller already holds

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;

use std::collections::BTreeMap;

use crate::cleaning::coerce::is_missing_marker;
use crate::error::{EtlError, EtlResult};
use crate::schema::{LogicalTable, RawLayout};
use crate::types::{DataSet, Schema, Value};

pub use self::csv::DelimitedBundle;
#[cfg(feature = "excel")]
pub use self::excel::Workbook;

/// Tables keyed by logical table, iterated in canonical order.
pub type Tables = BTreeMap<LogicalTable, DataSet>;

/// A provider of raw tables in one physical layout.
pub trait RawSource: Send + Sync {
    /// Layout whose physical names this source uses.
    fn layout(&self) -> RawLayout;

    /// Logical tables this source provides, in canonical order.
    fn list_tables(&self) -> Vec<LogicalTable> {
        LogicalTable::ALL.to_vec()
    }

    /// Load one raw table.
    ///
    /// A missing file or sheet is an [`EtlError::Load`]; a missing column is an
    /// [`EtlError::Schema`].
    fn load(&self, table: LogicalTable) -> EtlResult<DataSet>;
}

/// Load every table the source lists.
///
/// Fails on the first table that cannot be loaded, before any cleaning has started.
pub fn load_all(source: &dyn RawSource) -> EtlResult<Tables> {
    let mut tables = Tables::new();
    for table in source.list_tables() {
        let ds = source.load(table)?;
        tracing::debug!(
            layout = source.layout().label(),
            table = table.name(),
            rows = ds.row_count(),
            "loaded raw table"
        );
        tables.insert(table, ds);
    }
    Ok(tables)
}

/// A [`RawSource`] over tables already in memory, keyed by logical table.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    layout: RawLayout,
    tables: Tables,
}

impl InMemorySource {
    /// Wrap tables whose columns already use logical names.
    pub fn new(tables: Tables) -> Self {
        Self {
            layout: RawLayout::DelimitedBundle,
            tables,
        }
    }
}

impl RawSource for InMemorySource {
    fn layout(&self) -> RawLayout {
        self.layout
    }

    fn load(&self, table: LogicalTable) -> EtlResult<DataSet> {
        self.tables
            .get(&table)
            .cloned()
            .ok_or_else(|| EtlError::load(table.name(), "table not provided"))
    }
}

/// Map each logical field of `table` to its column index in `headers`.
///
/// Header comparison ignores surrounding whitespace; column order in the source is free.
pub(crate) fn project_headers(
    layout: RawLayout,
    table: LogicalTable,
    headers: &[String],
) -> EtlResult<Vec<usize>> {
    let mut col_idxs = Vec::with_capacity(table.fields().len());
    for logical in table.field_names() {
        let physical = layout.resolve(table, logical)?;
        match headers.iter().position(|h| h.trim() == physical) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(EtlError::schema(
                    table.name(),
                    format!(
                        "missing required column '{physical}' (logical '{logical}') in {} '{}'. headers={headers:?}",
                        layout.label(),
                        layout.source_name(table),
                    ),
                ));
            }
        }
    }
    Ok(col_idxs)
}

/// Raw-table schema for `table`: logical names, untyped.
pub(crate) fn raw_schema(table: LogicalTable) -> Schema {
    Schema::untyped(table.field_names())
}

/// Blank text and missing markers (`NA`, `NaN`, `null`, ...) are missing; anything else is kept
/// verbatim.
pub(crate) fn raw_text(raw: &str) -> Value {
    if is_missing_marker(raw) {
        Value::Null
    } else {
        Value::Utf8(raw.to_owned())
    }
}
