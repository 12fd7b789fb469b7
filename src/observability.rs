//! Observer hooks for pipeline runs.
//!
//! A [`PipelineObserver`] sees every table after it is loaded, cleaned and persisted, plus every
//! fatal failure with a [`PipelineSeverity`]. Observers only read; they cannot change outputs.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::report::TableSummary;
use crate::schema::RawLayout;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (run failed).
    Error,
    /// Critical error (missing inputs, I/O failures).
    Critical,
}

/// Which stage of a run an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Clean,
    Merge,
    Encode,
    Persist,
}

/// Context about the run an event belongs to.
#[derive(Debug, Clone, Copy)]
pub struct RunEventContext {
    pub layout: RawLayout,
    pub stage: Stage,
}

/// Observer interface for pipeline outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called once per raw table after loading.
    fn on_loaded(&self, _ctx: &RunEventContext, _summary: &TableSummary) {}

    /// Called once per cleaned table.
    fn on_cleaned(&self, _ctx: &RunEventContext, _summary: &TableSummary) {}

    /// Called once per persisted output.
    fn on_persisted(&self, _ctx: &RunEventContext, _name: &str, _rows: usize) {}

    /// Called when the run fails.
    fn on_failure(&self, _ctx: &RunEventContext, _severity: PipelineSeverity, _error: &EtlError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Severity of a fatal error.
pub fn severity_for_error(e: &EtlError) -> PipelineSeverity {
    match e {
        EtlError::Load { .. } | EtlError::Io(_) => PipelineSeverity::Critical,
        EtlError::Csv(err) => match err.kind() {
            csv::ErrorKind::Io(_) => PipelineSeverity::Critical,
            _ => PipelineSeverity::Error,
        },
        #[cfg(feature = "excel")]
        EtlError::Excel(_) => PipelineSeverity::Error,
        EtlError::Schema { .. }
        | EtlError::JoinCardinality { .. }
        | EtlError::Config { .. }
        | EtlError::Json(_)
        | EtlError::ThreadPool(_) => PipelineSeverity::Error,
    }
}

/// Report a failure to `observer`, alerting at or above `alert_at_or_above`.
pub fn report_failure(
    observer: &dyn PipelineObserver,
    ctx: &RunEventContext,
    error: &EtlError,
    alert_at_or_above: PipelineSeverity,
) {
    let severity = severity_for_error(error);
    observer.on_failure(ctx, severity, error);
    if severity >= alert_at_or_above {
        observer.on_alert(ctx, severity, error);
    }
}

/// An observer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_loaded(&self, ctx: &RunEventContext, summary: &TableSummary) {
        for o in &self.observers {
            o.on_loaded(ctx, summary);
        }
    }

    fn on_cleaned(&self, ctx: &RunEventContext, summary: &TableSummary) {
        for o in &self.observers {
            o.on_cleaned(ctx, summary);
        }
    }

    fn on_persisted(&self, ctx: &RunEventContext, name: &str, rows: usize) {
        for o in &self.observers {
            o.on_persisted(ctx, name, rows);
        }
    }

    fn on_failure(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits events as `tracing` records.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_loaded(&self, ctx: &RunEventContext, summary: &TableSummary) {
        tracing::debug!(
            layout = ctx.layout.label(),
            table = %summary.table,
            rows = summary.rows,
            rows_with_missing = summary.rows_with_missing,
            "raw table loaded"
        );
    }

    fn on_cleaned(&self, ctx: &RunEventContext, summary: &TableSummary) {
        tracing::info!(
            layout = ctx.layout.label(),
            table = %summary.table,
            rows = summary.rows,
            rows_with_missing = summary.rows_with_missing,
            "table cleaned"
        );
    }

    fn on_persisted(&self, ctx: &RunEventContext, name: &str, rows: usize) {
        tracing::info!(layout = ctx.layout.label(), output = name, rows, "output written");
    }

    fn on_failure(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        tracing::error!(
            layout = ctx.layout.label(),
            stage = ?ctx.stage,
            ?severity,
            %error,
            "run failed"
        );
    }

    fn on_alert(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        tracing::error!(
            alert = true,
            layout = ctx.layout.label(),
            stage = ?ctx.stage,
            ?severity,
            %error,
            "run failed"
        );
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_cleaned(&self, ctx: &RunEventContext, summary: &TableSummary) {
        self.append_line(&format!(
            "{} cleaned layout={} table={} rows={} rows_with_missing={}",
            unix_ts(),
            ctx.layout.label(),
            summary.table,
            summary.rows,
            summary.rows_with_missing
        ));
    }

    fn on_persisted(&self, ctx: &RunEventContext, name: &str, rows: usize) {
        self.append_line(&format!(
            "{} persisted layout={} output={name} rows={rows}",
            unix_ts(),
            ctx.layout.label(),
        ));
    }

    fn on_failure(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        self.append_line(&format!(
            "{} fail severity={:?} layout={} stage={:?} err={}",
            unix_ts(),
            severity,
            ctx.layout.label(),
            ctx.stage,
            error
        ));
    }

    fn on_alert(&self, ctx: &RunEventContext, severity: PipelineSeverity, error: &EtlError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} layout={} stage={:?} err={}",
            unix_ts(),
            severity,
            ctx.layout.label(),
            ctx.stage,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_io_failures_are_critical() {
        let load = EtlError::Load {
            table: "vle".into(),
            message: "missing".into(),
        };
        assert_eq!(severity_for_error(&load), PipelineSeverity::Critical);

        let join = EtlError::JoinCardinality {
            table: "assessments".into(),
            key: "(1752)".into(),
            duplicates: 1,
        };
        assert_eq!(severity_for_error(&join), PipelineSeverity::Error);
    }

    #[test]
    fn severities_are_ordered() {
        assert!(PipelineSeverity::Critical > PipelineSeverity::Error);
        assert!(PipelineSeverity::Warning > PipelineSeverity::Info);
    }
}
