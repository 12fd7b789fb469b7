use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type EtlResult<T> = Result<T, EtlError>;

/// Error type returned by loading, cleaning, joining and persistence.
///
/// Every variant is fatal for the run. Unparseable numeric text is never reported here: it becomes
/// a missing value handled by the cleaning rules. Out-of-vocabulary categories are reported as
/// [`EncodingGap`] records instead.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Unknown table or logical field, or a column the rules need is structurally absent.
    #[error("schema error in '{table}': {message}")]
    Schema { table: String, message: String },

    /// A required raw table (file or sheet) is missing.
    #[error("failed to load '{table}': {message}")]
    Load { table: String, message: String },

    /// The "one" side of a join carries duplicate keys.
    #[error(
        "join cardinality violated on '{table}': {duplicates} duplicated key(s), first duplicate {key}"
    )]
    JoinCardinality {
        table: String,
        key: String,
        duplicates: usize,
    },

    /// Invalid pipeline configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Underlying I/O error (e.g. permission denied while writing outputs).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    /// Workbook read error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// JSON config or summary error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cleaning thread pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl EtlError {
    pub(crate) fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    pub(crate) fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// A category value outside its closed vocabulary.
///
/// Recoverable: the encoded cell is left missing and the gap is logged and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingGap {
    /// Source column (e.g. `imd_band`).
    pub column: String,
    /// The unmapped value as found in the table.
    pub value: String,
    /// Number of rows carrying this value.
    pub rows: usize,
}

impl fmt::Display for EncodingGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' has no code in {} ({} row(s))",
            self.value, self.column, self.rows
        )
    }
}
