//! End-to-end run: load, clean, merge, encode, persist.
//!
//! A run is fail-fast and non-partial. Every raw table is loaded before cleaning starts, and
//! nothing is written until the merge and the encoding have both succeeded.

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;

use crate::cleaning::clean;
use crate::config::PipelineConfig;
use crate::encoding::encode;
use crate::error::{EncodingGap, EtlError, EtlResult};
use crate::ingestion::{load_all, RawSource, Tables};
use crate::join::merge;
use crate::observability::{
    report_failure, PipelineObserver, RunEventContext, Stage, TracingObserver,
};
use crate::output::{TableSink, ENCODED_OUTPUT, JOINED_OUTPUT};
use crate::report::{log_summary, summarize, TableSummary};
use crate::schema::{LogicalTable, RawLayout};
use crate::types::DataSet;

/// Configuration and observer shared by every stage of a run.
#[derive(Clone)]
pub struct RunContext {
    pub config: PipelineConfig,
    pub observer: Arc<dyn PipelineObserver>,
}

impl RunContext {
    /// Context that reports through [`TracingObserver`].
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub layout: RawLayout,
    /// Summaries of the raw tables, in canonical order.
    pub raw: Vec<TableSummary>,
    /// Summaries of the cleaned tables, in canonical order.
    pub cleaned: Vec<TableSummary>,
    pub joined_rows: usize,
    pub encoded_rows: usize,
    pub encoding_gaps: Vec<EncodingGap>,
}

/// Run the whole pipeline over `source`, writing outputs to `sink`.
///
/// On failure the observer receives the error with the stage it happened in, and an alert when
/// its severity reaches `config.alert_at_or_above`.
pub fn run(source: &dyn RawSource, sink: &dyn TableSink, ctx: &RunContext) -> EtlResult<RunReport> {
    let layout = source.layout();
    let span = tracing::info_span!("run", layout = layout.label());
    let _enter = span.enter();

    let mut stage = Stage::Load;
    let result = run_stages(source, sink, ctx, &mut stage);
    if let Err(e) = &result {
        report_failure(
            ctx.observer.as_ref(),
            &RunEventContext { layout, stage },
            e,
            ctx.config.alert_at_or_above,
        );
    }
    result
}

fn run_stages(
    source: &dyn RawSource,
    sink: &dyn TableSink,
    ctx: &RunContext,
    stage: &mut Stage,
) -> EtlResult<RunReport> {
    let layout = source.layout();
    let event = |stage| RunEventContext { layout, stage };
    ctx.config.validate()?;

    *stage = Stage::Load;
    let raw = load_all(source)?;
    let raw_summaries = summarize_tables(&raw);
    for summary in &raw_summaries {
        ctx.observer.on_loaded(&event(Stage::Load), summary);
    }
    log_summary("raw tables", &raw_summaries);

    *stage = Stage::Clean;
    let cleaned = clean_all(&raw, ctx.config.num_threads)?;
    let cleaned_summaries = summarize_tables(&cleaned);
    for summary in &cleaned_summaries {
        ctx.observer.on_cleaned(&event(Stage::Clean), summary);
    }
    log_summary("cleaned tables", &cleaned_summaries);

    *stage = Stage::Merge;
    let joined = merge(
        table(&cleaned, LogicalTable::StudentAssessment)?,
        table(&cleaned, LogicalTable::Assessments)?,
        table(&cleaned, LogicalTable::StudentInfo)?,
        ctx.config.cardinality,
    )?;

    *stage = Stage::Encode;
    let encoding = encode(table(&cleaned, LogicalTable::StudentInfo)?)?;

    *stage = Stage::Persist;
    let outputs = cleaned
        .iter()
        .map(|(t, ds)| (t.name(), ds))
        .chain([(JOINED_OUTPUT, &joined), (ENCODED_OUTPUT, &encoding.dataset)]);
    for (name, ds) in outputs {
        sink.persist(name, ds)?;
        ctx.observer
            .on_persisted(&event(Stage::Persist), name, ds.row_count());
    }

    let report = RunReport {
        layout,
        raw: raw_summaries,
        cleaned: cleaned_summaries,
        joined_rows: joined.row_count(),
        encoded_rows: encoding.dataset.row_count(),
        encoding_gaps: encoding.gaps,
    };
    if let Some(path) = &ctx.config.summary_json {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &report)?;
        tracing::debug!(path = %path.display(), "wrote run summary");
    }
    tracing::info!(
        joined_rows = report.joined_rows,
        encoded_rows = report.encoded_rows,
        encoding_gaps = report.encoding_gaps.len(),
        "run finished"
    );
    Ok(report)
}

/// Clean every raw table on a dedicated thread pool.
///
/// Tables are independent, so they are cleaned in parallel; the first error wins and no partial
/// result is returned.
pub fn clean_all(raw: &Tables, num_threads: Option<usize>) -> EtlResult<Tables> {
    let n_threads = num_threads
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
        .max(1);
    let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
    pool.install(|| {
        raw.par_iter()
            .map(|(&t, ds)| clean(t, ds).map(|cleaned| (t, cleaned)))
            .collect::<EtlResult<Tables>>()
    })
}

/// Load and summarize the raw tables without cleaning or writing anything.
pub fn summarize_source(source: &dyn RawSource) -> EtlResult<Vec<TableSummary>> {
    let raw = load_all(source)?;
    Ok(summarize_tables(&raw))
}

fn summarize_tables(tables: &Tables) -> Vec<TableSummary> {
    tables.iter().map(|(t, ds)| summarize(t.name(), ds)).collect()
}

fn table(tables: &Tables, t: LogicalTable) -> EtlResult<&DataSet> {
    tables
        .get(&t)
        .ok_or_else(|| EtlError::load(t.name(), "table was not provided by the source"))
}
