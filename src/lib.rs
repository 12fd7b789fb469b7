//! `oulad-etl` cleans, joins and ordinally encodes the seven tables of the Open University
//! Learning Analytics Dataset (OULAD).
//!
//! The raw data arrives in one of two physical layouts: a bundle of delimited files, or a single
//! workbook with its own sheet and column names. Both are mapped onto the same seven logical
//! tables by the [`schema`] registry, so every later stage speaks logical names only.
//!
//! ## Stages
//!
//! 1. [`ingestion`]: load every raw table through a [`ingestion::RawSource`]
//! 2. [`cleaning`]: coerce, drop rows missing required fields, impute, normalize identifiers
//! 3. [`join`]: submissions ⋈ assessments, then enrollments ⋈ that result (both left joins)
//! 4. [`encoding`]: ordinal codes for four categorical student columns
//! 5. [`output`]: persist cleaned tables, the joined record set and the encoded table
//!
//! [`pipeline::run`] drives all five; [`report`] and [`observability`] only watch.
//!
//! ## Example
//!
//! ```no_run
//! use oulad_etl::config::PipelineConfig;
//! use oulad_etl::ingestion::DelimitedBundle;
//! use oulad_etl::output::CsvDirectorySink;
//! use oulad_etl::pipeline::{run, RunContext};
//!
//! # fn main() -> Result<(), oulad_etl::EtlError> {
//! let config = PipelineConfig::default();
//! let source = DelimitedBundle::new(&config.raw_dir);
//! let sink = CsvDirectorySink::new(config.processed_dir());
//! let report = run(&source, &sink, &RunContext::new(config))?;
//! println!("joined rows={}", report.joined_rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Cargo features
//!
//! - `excel` (default): workbook layout via `calamine`
//! - `excel_test_writer`: workbook fixtures for integration tests via `rust_xlsxwriter`

pub mod cleaning;
pub mod config;
pub mod encoding;
pub mod error;
pub mod ingestion;
pub mod join;
pub mod logging;
pub mod observability;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod types;

pub use error::{EncodingGap, EtlError, EtlResult};
