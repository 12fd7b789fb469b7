//! Per-table cleaning.
//!
//! [`clean`] turns a raw table into a cleaned table with the canonical column order and types of
//! [`LogicalTable::cleaned_schema`]. Four rule classes run in a fixed order:
//!
//! 1. **Coercion**: every column is parsed into its canonical type. Numbers that fail to parse
//!    (or a score/weight outside `[0, 100]`) become missing; nothing is raised. Non-integral
//!    numbers in integer columns are rounded. Category text is trimmed; blank text and missing
//!    markers such as `NA` become missing.
//! 2. **Required-field drop**: rows missing a value in a required column are discarded.
//! 3. **Imputation**: remaining gaps are filled from the column's own surviving values (mode,
//!    median, mean), a zero score, or the `-1` "not applicable" sentinel.
//! 4. **Identifier normalization**: identifiers become trimmed text, rows without one are dropped,
//!    and `imd_band` "10-20" is rewritten to "10-20%".
//!
//! Cleaning reads nothing but its own table, so tables can be cleaned in any order or in parallel.
//!
//! ```rust
//! use oulad_etl::cleaning::clean;
//! use oulad_etl::schema::LogicalTable;
//! use oulad_etl::types::{DataSet, Schema, Value};
//!
//! let raw = DataSet::new(
//!     Schema::untyped(LogicalTable::Assessments.field_names()),
//!     vec![
//!         ["AAA", "2013J", "1", "TMA", "10", "50"].map(|s| Value::Utf8(s.into())).to_vec(),
//!         ["AAA", "2013J", "2", "TMA", "20", "bad"].map(|s| Value::Utf8(s.into())).to_vec(),
//!     ],
//! );
//! let cleaned = clean(LogicalTable::Assessments, &raw).unwrap();
//! assert_eq!(cleaned.row_count(), 1);
//! assert_eq!(cleaned.value(0, "weight"), Some(&Value::Float64(50.0)));
//! assert_eq!(cleaned.value(0, "date"), Some(&Value::Int64(10)));
//! ```

pub mod coerce;
pub mod stats;

use crate::error::{EtlError, EtlResult};
use crate::schema::field::*;
use crate::schema::{FieldSpec, LogicalTable};
use crate::types::{DataSet, DataType, Value};

/// Identifier columns, normalized to trimmed text in the last step.
pub const IDENTIFIERS: [&str; 5] = [CODE_MODULE, CODE_PRESENTATION, ID_STUDENT, ID_ASSESSMENT, ID_SITE];

/// Columns holding a percentage; values outside `[0, 100]` count as unparseable.
const PERCENT_COLUMNS: [&str; 2] = [SCORE, WEIGHT];

/// The `-1` marker for "not applicable / unbounded".
pub const SENTINEL: i64 = -1;

/// How a gap in a non-required column is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imputation {
    /// Most frequent value, ties to the first seen.
    Mode,
    /// Median, rounded for integer columns.
    Median,
    /// Mean, rounded for integer columns.
    Mean,
    /// Constant zero.
    Zero,
    /// Constant [`SENTINEL`].
    Sentinel,
}

/// The rule set of one logical table.
#[derive(Debug, Clone, Copy)]
pub struct CleaningRules {
    pub table: LogicalTable,
    /// Rows missing any of these after coercion are dropped.
    pub required: &'static [&'static str],
    /// Gap-filling policy per column, applied in order.
    pub impute: &'static [(&'static str, Imputation)],
}

static RULES: [CleaningRules; 7] = [
    CleaningRules {
        table: LogicalTable::Courses,
        required: &[],
        impute: &[],
    },
    CleaningRules {
        table: LogicalTable::StudentInfo,
        required: &[],
        impute: &[
            (GENDER, Imputation::Mode),
            (REGION, Imputation::Mode),
            (HIGHEST_EDUCATION, Imputation::Mode),
            (IMD_BAND, Imputation::Mode),
            (AGE_BAND, Imputation::Mode),
            (DISABILITY, Imputation::Mode),
            (FINAL_RESULT, Imputation::Mode),
            (NUM_OF_PREV_ATTEMPTS, Imputation::Median),
            (STUDIED_CREDITS, Imputation::Median),
        ],
    },
    CleaningRules {
        table: LogicalTable::Assessments,
        required: &[DATE, WEIGHT],
        impute: &[(WEIGHT, Imputation::Mean)],
    },
    CleaningRules {
        table: LogicalTable::Vle,
        required: &[],
        impute: &[
            (ACTIVITY_TYPE, Imputation::Mode),
            (WEEK_FROM, Imputation::Sentinel),
            (WEEK_TO, Imputation::Sentinel),
        ],
    },
    CleaningRules {
        table: LogicalTable::StudentAssessment,
        required: &[DATE_SUBMITTED],
        impute: &[(SCORE, Imputation::Zero)],
    },
    CleaningRules {
        table: LogicalTable::StudentRegistration,
        required: &[DATE_REGISTRATION],
        impute: &[(DATE_UNREGISTRATION, Imputation::Sentinel)],
    },
    CleaningRules {
        table: LogicalTable::StudentVle,
        required: &[DATE, SUM_CLICK],
        impute: &[],
    },
];

/// Rule set for `table`.
pub fn rules_for(table: LogicalTable) -> &'static CleaningRules {
    RULES
        .iter()
        .find(|r| r.table == table)
        .unwrap_or_else(|| unreachable!("every logical table has a rule set"))
}

/// Canonical spelling of an IMD decile band.
///
/// The raw data carries "10-20" without the percent sign used by every other band.
pub fn canonical_imd_band(band: &str) -> &str {
    if band == "10-20" { "10-20%" } else { band }
}

/// Clean a table identified by its logical name.
pub fn clean_named(table_name: &str, raw: &DataSet) -> EtlResult<DataSet> {
    clean(table_name.parse()?, raw)
}

/// Clean one raw table under its table-specific rules.
///
/// The raw table may carry its columns in any order and may have extra columns; the result has
/// exactly the canonical columns in canonical order. Fails with [`EtlError::Schema`] only when a
/// canonical column is absent from `raw`.
pub fn clean(table: LogicalTable, raw: &DataSet) -> EtlResult<DataSet> {
    let rules = rules_for(table);
    let specs = table.fields();
    let source_idxs = specs
        .iter()
        .map(|spec| {
            raw.schema.index_of(spec.name).ok_or_else(|| {
                EtlError::schema(
                    table.name(),
                    format!("column '{}' required by the cleaning rules is absent", spec.name),
                )
            })
        })
        .collect::<EtlResult<Vec<usize>>>()?;

    let mut ds = DataSet::new(table.cleaned_schema(), coerce_rows(raw, table, &source_idxs));
    let required_idxs = column_indexes(&ds, table, rules.required)?;

    let before = ds.row_count();
    ds.rows
        .retain(|row| required_idxs.iter().all(|&idx| !row[idx].is_null()));
    let dropped_required = before - ds.row_count();

    for &(column, imputation) in rules.impute {
        impute(&mut ds, table, column, imputation)?;
    }

    let dropped_ids = normalize_identifiers(&mut ds, table);

    tracing::debug!(
        table = table.name(),
        rows_in = raw.row_count(),
        rows_out = ds.row_count(),
        dropped_required,
        dropped_ids,
        "cleaned table"
    );
    Ok(ds)
}

fn coerce_rows(raw: &DataSet, table: LogicalTable, source_idxs: &[usize]) -> Vec<Vec<Value>> {
    let specs = table.fields();
    let mut rounded = vec![0usize; specs.len()];
    let rows = raw
        .rows
        .iter()
        .map(|row| {
            specs
                .iter()
                .zip(source_idxs)
                .zip(rounded.iter_mut())
                .map(|((spec, &idx), rounded)| {
                    let value = row.get(idx).unwrap_or(&Value::Null);
                    if spec.data_type == DataType::Int64 && coerce::is_fractional(value) {
                        *rounded += 1;
                    }
                    coerce_cell(spec, value)
                })
                .collect()
        })
        .collect();

    for (spec, &count) in specs.iter().zip(&rounded) {
        if count > 0 {
            tracing::debug!(
                table = table.name(),
                column = spec.name,
                rows = count,
                "rounded non-integral values to the nearest integer"
            );
        }
    }
    rows
}

fn coerce_cell(spec: &FieldSpec, value: &Value) -> Value {
    let coerced = match spec.data_type {
        // Identifiers are normalized last so text casting never touches numeric parsing.
        DataType::Utf8 if IDENTIFIERS.contains(&spec.name) => Some(value.clone()),
        DataType::Utf8 => coerce::to_trimmed_text(value).map(Value::Utf8),
        DataType::Int64 => coerce::to_i64(value).map(Value::Int64),
        DataType::Float64 => coerce::to_f64(value)
            .filter(|v| !PERCENT_COLUMNS.contains(&spec.name) || (0.0..=100.0).contains(v))
            .map(Value::Float64),
        DataType::Bool => coerce::to_bool(value).map(Value::Bool),
    };
    coerced.unwrap_or(Value::Null)
}

fn column_indexes(ds: &DataSet, table: LogicalTable, columns: &[&str]) -> EtlResult<Vec<usize>> {
    columns
        .iter()
        .map(|&column| column_index(ds, table, column))
        .collect()
}

fn column_index(ds: &DataSet, table: LogicalTable, column: &str) -> EtlResult<usize> {
    ds.schema
        .index_of(column)
        .ok_or_else(|| EtlError::schema(table.name(), format!("rule names unknown column '{column}'")))
}

fn impute(ds: &mut DataSet, table: LogicalTable, column: &str, imputation: Imputation) -> EtlResult<()> {
    let idx = column_index(ds, table, column)?;
    let gaps = ds.column(idx).filter(|v| v.is_null()).count();
    if gaps == 0 {
        return Ok(());
    }

    let data_type = ds.schema.fields[idx].data_type;
    let fill = match imputation {
        Imputation::Mode => stats::mode(ds.column(idx)).map(Value::Utf8),
        Imputation::Median => {
            stats::median(ds.column(idx)).map(|v| numeric(table, column, data_type, v))
        }
        Imputation::Mean => stats::mean(ds.column(idx)).map(|v| numeric(table, column, data_type, v)),
        Imputation::Zero => Some(numeric(table, column, data_type, 0.0)),
        Imputation::Sentinel => Some(Value::Int64(SENTINEL)),
    };

    let Some(fill) = fill else {
        tracing::warn!(
            table = table.name(),
            column,
            rows = gaps,
            ?imputation,
            "column has no values to impute from; gaps left missing"
        );
        return Ok(());
    };

    tracing::debug!(table = table.name(), column, rows = gaps, ?imputation, fill = %fill, "imputed");
    for row in &mut ds.rows {
        if row[idx].is_null() {
            row[idx] = fill.clone();
        }
    }
    Ok(())
}

fn numeric(table: LogicalTable, column: &str, data_type: DataType, v: f64) -> Value {
    match data_type {
        DataType::Int64 => {
            let rounded = v.round();
            if rounded != v {
                tracing::debug!(
                    table = table.name(),
                    column,
                    statistic = v,
                    fill = rounded,
                    "rounded statistic for integer column"
                );
            }
            Value::Int64(rounded as i64)
        }
        _ => Value::Float64(v),
    }
}

/// Returns the number of rows dropped for a missing identifier.
fn normalize_identifiers(ds: &mut DataSet, table: LogicalTable) -> usize {
    let id_idxs: Vec<usize> = IDENTIFIERS
        .iter()
        .filter_map(|id| ds.schema.index_of(id))
        .collect();
    let imd_idx = (table == LogicalTable::StudentInfo)
        .then(|| ds.schema.index_of(IMD_BAND))
        .flatten();

    let before = ds.row_count();
    ds.rows.retain_mut(|row| {
        for &idx in &id_idxs {
            match coerce::to_trimmed_text(&row[idx]) {
                Some(id) => row[idx] = Value::Utf8(id),
                None => return false,
            }
        }
        if let Some(idx) = imd_idx {
            if let Value::Utf8(band) = &row[idx] {
                let canonical = canonical_imd_band(band);
                if canonical != band {
                    row[idx] = Value::Utf8(canonical.to_owned());
                }
            }
        }
        true
    });

    let dropped = before - ds.row_count();
    if dropped > 0 {
        tracing::warn!(table = table.name(), rows = dropped, "dropped rows without an identifier");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::Schema;

    fn text(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn raw(table: LogicalTable, rows: Vec<Vec<Value>>) -> DataSet {
        DataSet::new(Schema::untyped(table.field_names()), rows)
    }

    #[test]
    fn every_table_has_rules_naming_real_columns() {
        for table in LogicalTable::ALL {
            let rules = rules_for(table);
            assert_eq!(rules.table, table);
            for column in rules.required.iter().chain(rules.impute.iter().map(|(c, _)| c)) {
                assert!(table.field(column).is_ok(), "{table}: {column}");
            }
        }
    }

    #[test]
    fn out_of_range_weight_drops_the_row() {
        let ds = raw(
            LogicalTable::Assessments,
            vec![
                vec![text("AAA"), text("2013J"), text("1"), text("TMA"), text("10"), text("150")],
                vec![text("AAA"), text("2013J"), text("2"), text("TMA"), text("10"), text("0")],
            ],
        );
        let out = clean(LogicalTable::Assessments, &ds).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.value(0, ID_ASSESSMENT), Some(&text("2")));
    }

    #[test]
    fn median_of_integer_column_is_rounded() {
        let mut rows = Vec::new();
        for credits in ["30", "45", ""] {
            rows.push(vec![
                text("AAA"),
                text("2013J"),
                text("1"),
                text("M"),
                text("Scotland"),
                text("HE Qualification"),
                text("90-100%"),
                text("55<="),
                text("0"),
                text(credits),
                text("N"),
                text("Pass"),
            ]);
        }
        let out = clean(LogicalTable::StudentInfo, &raw(LogicalTable::StudentInfo, rows)).unwrap();
        assert_eq!(out.value(2, STUDIED_CREDITS), Some(&Value::Int64(38)));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn debug_logs_of(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn rounded_median_is_logged_with_the_unrounded_statistic() {
        let mut rows = Vec::new();
        for credits in ["30", "45", ""] {
            rows.push(vec![
                text("AAA"),
                text("2013J"),
                text("1"),
                text("M"),
                text("Scotland"),
                text("HE Qualification"),
                text("90-100%"),
                text("55<="),
                text("0"),
                text(credits),
                text("N"),
                text("Pass"),
            ]);
        }
        let logs = debug_logs_of(|| {
            clean(LogicalTable::StudentInfo, &raw(LogicalTable::StudentInfo, rows)).unwrap();
        });
        assert!(logs.contains("rounded statistic for integer column"), "{logs}");
        assert!(logs.contains("statistic=37.5"), "{logs}");
    }

    #[test]
    fn fractional_day_offsets_are_rounded_and_logged() {
        let ds = raw(
            LogicalTable::StudentRegistration,
            vec![vec![text("AAA"), text("2013J"), text("11391"), text("-5"), text("10.5")]],
        );
        let mut out = None;
        let logs = debug_logs_of(|| out = Some(clean(LogicalTable::StudentRegistration, &ds).unwrap()));
        let out = out.unwrap();
        assert_eq!(out.value(0, DATE_UNREGISTRATION), Some(&Value::Int64(11)));
        assert!(logs.contains("rounded non-integral values"), "{logs}");
        assert!(logs.contains("date_unregistration"), "{logs}");
    }

    #[test]
    fn all_null_category_stays_missing() {
        let ds = raw(
            LogicalTable::Vle,
            vec![vec![text("546943"), text("AAA"), text("2013J"), Value::Null, Value::Null, Value::Null]],
        );
        let out = clean(LogicalTable::Vle, &ds).unwrap();
        assert_eq!(out.value(0, ACTIVITY_TYPE), Some(&Value::Null));
        assert_eq!(out.value(0, WEEK_FROM), Some(&Value::Int64(SENTINEL)));
        assert_eq!(out.value(0, WEEK_TO), Some(&Value::Int64(SENTINEL)));
    }

    #[test]
    fn rows_without_identifier_are_dropped() {
        let ds = raw(
            LogicalTable::Courses,
            vec![
                vec![text(" AAA "), text("2013J"), text("268")],
                vec![text("   "), text("2013J"), text("268")],
            ],
        );
        let out = clean(LogicalTable::Courses, &ds).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.value(0, CODE_MODULE), Some(&text("AAA")));
        assert_eq!(out.value(0, MODULE_PRESENTATION_LENGTH), Some(&Value::Int64(268)));
    }

    #[test]
    fn absent_column_is_a_schema_error() {
        let ds = DataSet::new(
            Schema::untyped([CODE_MODULE, CODE_PRESENTATION]),
            vec![vec![text("AAA"), text("2013J")]],
        );
        let err = clean(LogicalTable::Courses, &ds).unwrap_err();
        assert!(matches!(err, EtlError::Schema { .. }));
        assert!(err.to_string().contains("module_presentation_length"));
    }

    #[test]
    fn imd_band_correction_is_exact_match_only() {
        assert_eq!(canonical_imd_band("10-20"), "10-20%");
        assert_eq!(canonical_imd_band("10-20%"), "10-20%");
        assert_eq!(canonical_imd_band("0-10%"), "0-10%");
    }
}
