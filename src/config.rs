//! Pipeline configuration.
//!
//! A [`PipelineConfig`] can be read from a JSON file and then overridden field by field (the CLI
//! does this with its flags). Every field has a default, so an empty object is a valid config.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};
use crate::join::CardinalityPolicy;
use crate::observability::PipelineSeverity;

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the delimited bundle.
    pub raw_dir: PathBuf,
    /// Output directory; defaults to `processed` next to `raw_dir`.
    pub processed_dir: Option<PathBuf>,
    /// Workbook to process as well; discovered in `raw_dir` when unset.
    pub workbook: Option<PathBuf>,
    /// Policy for duplicate keys on the "one" side of a join.
    pub cardinality: CardinalityPolicy,
    /// Size of the cleaning thread pool; available parallelism when unset.
    pub num_threads: Option<usize>,
    /// Where to dump run summaries as JSON.
    pub summary_json: Option<PathBuf>,
    /// Failures at or above this severity are raised as alerts.
    pub alert_at_or_above: PipelineSeverity,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: None,
            workbook: None,
            cardinality: CardinalityPolicy::default(),
            num_threads: None,
            summary_json: None,
            alert_at_or_above: PipelineSeverity::Critical,
        }
    }
}

impl PipelineConfig {
    /// Read a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EtlResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run can use.
    pub fn validate(&self) -> EtlResult<()> {
        if self.num_threads == Some(0) {
            return Err(EtlError::Config {
                message: "num_threads must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Effective output directory.
    pub fn processed_dir(&self) -> PathBuf {
        self.processed_dir.clone().unwrap_or_else(|| {
            self.raw_dir
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("processed")
        })
    }

    /// Effective workbook path: the configured one, or the first `*.xlsx` in `raw_dir`.
    ///
    /// Discovery only happens in builds with the `excel` feature.
    pub fn workbook_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.workbook {
            return Some(path.clone());
        }
        if !cfg!(feature = "excel") {
            return None;
        }
        let pattern = self.raw_dir.join("*.xlsx");
        let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .ok()?
            .filter_map(Result::ok)
            .collect();
        found.sort();
        found.into_iter().next()
    }
}
