//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use oulad_etl::config::PipelineConfig;
use oulad_etl::ingestion::{DelimitedBundle, RawSource};
use oulad_etl::join::CardinalityPolicy;
use oulad_etl::observability::{CompositeObserver, FileObserver, PipelineObserver, TracingObserver};
use oulad_etl::output::CsvDirectorySink;
use oulad_etl::pipeline::{run, summarize_source, RunContext, RunReport};
use oulad_etl::report::render_summary;
use oulad_etl::schema::{LogicalTable, RawLayout};

use crate::cli::{RunArgs, SourceArgs};

/// `run`: the delimited bundle, then the workbook when one is found.
pub fn run_pipeline(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;
    let observer = build_observer(args);

    let bundle = DelimitedBundle::new(&config.raw_dir);
    let sink = CsvDirectorySink::new(config.processed_dir());
    let ctx = RunContext::new(config.clone()).with_observer(Arc::clone(&observer));
    let report = run(&bundle, &sink, &ctx)
        .with_context(|| format!("delimited bundle run over {}", config.raw_dir.display()))?;
    print_report(&report);

    match config.workbook_path() {
        Some(path) => {
            let workbook_config = PipelineConfig {
                summary_json: config.summary_json.as_deref().map(layout_variant),
                ..config.clone()
            };
            let sink = CsvDirectorySink::new(config.processed_dir().join(RawLayout::Workbook.label()));
            let ctx = RunContext::new(workbook_config).with_observer(observer);
            let report = run_workbook(&path, &sink, &ctx)?;
            print_report(&report);
        }
        None => tracing::info!(dir = %config.raw_dir.display(), "no workbook found; skipping workbook run"),
    }
    Ok(())
}

#[cfg(feature = "excel")]
fn run_workbook(path: &Path, sink: &CsvDirectorySink, ctx: &RunContext) -> Result<RunReport> {
    let workbook = oulad_etl::ingestion::Workbook::open(path)?;
    run(&workbook, sink, ctx)
        .with_context(|| format!("workbook run over {}", workbook.path().display()))
}

#[cfg(not(feature = "excel"))]
fn run_workbook(path: &Path, _sink: &CsvDirectorySink, _ctx: &RunContext) -> Result<RunReport> {
    anyhow::bail!(
        "workbook {} found but this build lacks the `excel` feature",
        path.display()
    )
}

/// `summary`: raw-table summaries for every available layout.
pub fn summarize(args: &SourceArgs) -> Result<()> {
    let config = PipelineConfig {
        raw_dir: args.data_dir.clone().unwrap_or_else(|| PipelineConfig::default().raw_dir),
        workbook: args.workbook.clone(),
        ..PipelineConfig::default()
    };
    let bundle = DelimitedBundle::new(&config.raw_dir);
    print_summaries(&bundle)?;

    if let Some(path) = config.workbook_path() {
        summarize_workbook(&path)?;
    }
    Ok(())
}

#[cfg(feature = "excel")]
fn summarize_workbook(path: &Path) -> Result<()> {
    let workbook = oulad_etl::ingestion::Workbook::open(path)?;
    print_summaries(&workbook)
}

#[cfg(not(feature = "excel"))]
fn summarize_workbook(path: &Path) -> Result<()> {
    tracing::warn!(path = %path.display(), "workbook ignored: built without the `excel` feature");
    Ok(())
}

fn print_summaries(source: &dyn RawSource) -> Result<()> {
    let summaries = summarize_source(source)
        .with_context(|| format!("loading {} layout", source.layout().label()))?;
    println!("{} layout", source.layout().label());
    println!("{}", render_summary(&summaries));
    Ok(())
}

/// `tables`: the registry as a grid.
pub fn print_tables() {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Logical table", "Bundle file", "Workbook sheet", "Columns"]);
    for t in LogicalTable::ALL {
        table.add_row(vec![
            t.name().to_string(),
            format!("{}.csv", RawLayout::DelimitedBundle.source_name(t)),
            RawLayout::Workbook.source_name(t).to_string(),
            t.field_names().collect::<Vec<_>>().join(", "),
        ]);
    }
    println!("{table}");
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &args.source.data_dir {
        config.raw_dir = dir.clone();
    }
    if let Some(path) = &args.source.workbook {
        config.workbook = Some(path.clone());
    }
    if let Some(dir) = &args.processed_dir {
        config.processed_dir = Some(dir.clone());
    }
    if args.many_to_many {
        config.cardinality = CardinalityPolicy::ManyToMany;
    }
    if args.threads.is_some() {
        config.num_threads = args.threads;
    }
    if let Some(path) = &args.summary_json {
        config.summary_json = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_observer(args: &RunArgs) -> Arc<dyn PipelineObserver> {
    let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &args.events_log {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    Arc::new(CompositeObserver::new(observers))
}

/// `summary.json` becomes `summary_workbook.json`.
fn layout_variant(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_workbook.{}", ext.to_string_lossy()),
        None => format!("{stem}_workbook"),
    };
    path.with_file_name(name)
}

fn print_report(report: &RunReport) {
    println!(
        "{} layout: {} joined rows, {} encoded rows, {} encoding gap(s)",
        report.layout.label(),
        report.joined_rows,
        report.encoded_rows,
        report.encoding_gaps.len()
    );
    for gap in &report.encoding_gaps {
        println!("  {gap}");
    }
}
