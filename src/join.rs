//! Denormalizing join of submissions, assessments and enrollments.
//!
//! [`merge`] runs two sequential left joins over cleaned tables:
//!
//! 1. studentAssessment ⋈ assessments on `id_assessment`, keeping every submission.
//! 2. studentInfo ⋈ (result of 1) on `(id_student, code_module, code_presentation)`, keeping every
//!    enrollment. An enrollment with N submissions appears N times; one with none appears once
//!    with null assessment columns.
//!
//! Keys on the "one" side of each join (assessments in step 1, studentInfo in step 2) are checked
//! for uniqueness first. Under [`CardinalityPolicy::Strict`] a duplicate is an
//! [`EtlError::JoinCardinality`]; under [`CardinalityPolicy::ManyToMany`] it is logged and every
//! match is kept.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};
use crate::schema::field::*;
use crate::schema::{joined_fields, joined_schema, LogicalTable};
use crate::types::{DataSet, Value};

/// What to do when the "one" side of a join has duplicate keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityPolicy {
    /// Fail the run.
    #[default]
    Strict,
    /// Log a warning and join every match.
    ManyToMany,
}

/// Columns carried over from step 1 into the joined output, in output order.
const DETAIL_COLUMNS: [&str; 7] = [
    ID_ASSESSMENT,
    DATE_SUBMITTED,
    IS_BANKED,
    SCORE,
    ASSESSMENT_TYPE,
    DATE,
    WEIGHT,
];

const ENROLLMENT_KEY: [&str; 3] = [ID_STUDENT, CODE_MODULE, CODE_PRESENTATION];

/// Join three cleaned tables into the denormalized record set.
///
/// Output columns follow [`joined_schema`]; rows follow studentInfo order, then submission order.
pub fn merge(
    student_assessment: &DataSet,
    assessments: &DataSet,
    student_info: &DataSet,
    policy: CardinalityPolicy,
) -> EtlResult<DataSet> {
    let detail = join_assessments(student_assessment, assessments, policy)?;
    let joined = join_enrollments(student_info, &detail, policy)?;
    tracing::info!(
        submissions = student_assessment.row_count(),
        enrollments = student_info.row_count(),
        rows = joined.row_count(),
        "joined submissions, assessments and enrollments"
    );
    Ok(joined)
}

/// Submission-level detail: the submission row plus its assessment's metadata, keyed for step 2.
struct Detail {
    key: Option<Vec<String>>,
    values: Vec<Value>,
}

/// Where a detail column is read from.
enum Source {
    Submission(usize),
    Assessment(usize),
}

fn join_assessments(
    student_assessment: &DataSet,
    assessments: &DataSet,
    policy: CardinalityPolicy,
) -> EtlResult<Vec<Detail>> {
    let sa = Columns::resolve(student_assessment, LogicalTable::StudentAssessment)?;
    let a = Columns::resolve(assessments, LogicalTable::Assessments)?;

    let index = index_unique(
        assessments,
        &[a.idx(ID_ASSESSMENT)?],
        LogicalTable::Assessments,
        policy,
    )?;

    let sa_id = sa.idx(ID_ASSESSMENT)?;
    let sa_student = sa.idx(ID_STUDENT)?;
    let a_module = a.idx(CODE_MODULE)?;
    let a_presentation = a.idx(CODE_PRESENTATION)?;
    let sources = DETAIL_COLUMNS
        .iter()
        .map(|&column| match sa.get(column) {
            Some(idx) => Ok(Source::Submission(idx)),
            None => a.idx(column).map(Source::Assessment),
        })
        .collect::<EtlResult<Vec<Source>>>()?;

    let mut out = Vec::with_capacity(student_assessment.row_count());
    for row in &student_assessment.rows {
        let detail_for = |a_row: Option<&[Value]>| Detail {
            key: a_row.and_then(|a_row| {
                Some(vec![
                    row[sa_student].as_str()?.to_owned(),
                    a_row[a_module].as_str()?.to_owned(),
                    a_row[a_presentation].as_str()?.to_owned(),
                ])
            }),
            values: sources
                .iter()
                .map(|source| match (source, a_row) {
                    (Source::Submission(idx), _) => row[*idx].clone(),
                    (Source::Assessment(idx), Some(a_row)) => a_row[*idx].clone(),
                    (Source::Assessment(_), None) => Value::Null,
                })
                .collect(),
        };

        match key_of(row, &[sa_id]).and_then(|k| index.get(&k)) {
            Some(matches) => out.extend(
                matches
                    .iter()
                    .map(|&a_idx| detail_for(Some(assessments.rows[a_idx].as_slice()))),
            ),
            None => out.push(detail_for(None)),
        }
    }
    Ok(out)
}

fn join_enrollments(
    student_info: &DataSet,
    detail: &[Detail],
    policy: CardinalityPolicy,
) -> EtlResult<DataSet> {
    let si = Columns::resolve(student_info, LogicalTable::StudentInfo)?;
    let key_idxs = ENROLLMENT_KEY
        .iter()
        .map(|c| si.idx(c))
        .collect::<EtlResult<Vec<usize>>>()?;
    // Validated for its side effect: duplicate enrollments are the "one" side here.
    index_unique(student_info, &key_idxs, LogicalTable::StudentInfo, policy)?;

    let mut by_enrollment: HashMap<&[String], Vec<&Detail>> = HashMap::new();
    for d in detail {
        if let Some(key) = &d.key {
            by_enrollment.entry(key.as_slice()).or_default().push(d);
        }
    }

    let info_idxs = LogicalTable::StudentInfo
        .field_names()
        .map(|c| si.idx(c))
        .collect::<EtlResult<Vec<usize>>>()?;
    let width = joined_fields().count();

    let mut rows = Vec::new();
    for row in &student_info.rows {
        let mut base: Vec<Value> = Vec::with_capacity(width);
        base.extend(info_idxs.iter().map(|&idx| row[idx].clone()));

        let matched = key_of(row, &key_idxs)
            .and_then(|k| by_enrollment.get(k.as_slice()))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if matched.is_empty() {
            let mut out = base;
            out.resize(width, Value::Null);
            rows.push(out);
        } else {
            for d in matched {
                let mut out = base.clone();
                out.extend(d.values.iter().cloned());
                rows.push(out);
            }
        }
    }

    Ok(DataSet::new(joined_schema(), rows))
}

/// Build `key -> row indexes`, enforcing uniqueness under [`CardinalityPolicy::Strict`].
fn index_unique(
    ds: &DataSet,
    key_idxs: &[usize],
    table: LogicalTable,
    policy: CardinalityPolicy,
) -> EtlResult<HashMap<Vec<String>, Vec<usize>>> {
    let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::with_capacity(ds.row_count());
    let mut first_duplicate: Option<Vec<String>> = None;
    let mut duplicates = 0usize;

    for (row_idx, row) in ds.rows.iter().enumerate() {
        let Some(key) = key_of(row, key_idxs) else {
            continue;
        };
        match index.entry(key) {
            Entry::Occupied(mut e) => {
                if e.get().len() == 1 {
                    duplicates += 1;
                    first_duplicate.get_or_insert_with(|| e.key().clone());
                }
                e.get_mut().push(row_idx);
            }
            Entry::Vacant(e) => {
                e.insert(vec![row_idx]);
            }
        }
    }

    if let Some(key) = first_duplicate {
        let key = format!("({})", key.join(", "));
        match policy {
            CardinalityPolicy::Strict => {
                return Err(EtlError::JoinCardinality {
                    table: table.name().to_string(),
                    key,
                    duplicates,
                });
            }
            CardinalityPolicy::ManyToMany => tracing::warn!(
                table = table.name(),
                duplicates,
                first = %key,
                "duplicate join keys; joining many-to-many"
            ),
        }
    }
    Ok(index)
}

/// Text key over `key_idxs`; `None` when any part is missing.
fn key_of(row: &[Value], key_idxs: &[usize]) -> Option<Vec<String>> {
    key_idxs
        .iter()
        .map(|&idx| row.get(idx).and_then(Value::as_str).map(str::to_owned))
        .collect()
}

/// Column lookup over a cleaned table, failing with a schema error for absent columns.
struct Columns<'a> {
    ds: &'a DataSet,
    table: LogicalTable,
}

impl<'a> Columns<'a> {
    fn resolve(ds: &'a DataSet, table: LogicalTable) -> EtlResult<Self> {
        let cols = Self { ds, table };
        for name in table.field_names() {
            cols.idx(name)?;
        }
        Ok(cols)
    }

    fn get(&self, column: &str) -> Option<usize> {
        self.ds.schema.index_of(column)
    }

    fn idx(&self, column: &str) -> EtlResult<usize> {
        self.get(column).ok_or_else(|| {
            EtlError::schema(self.table.name(), format!("join column '{column}' is absent"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogicalTable;

    fn text(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn assessments(ids: &[&str]) -> DataSet {
        DataSet::new(
            LogicalTable::Assessments.cleaned_schema(),
            ids.iter()
                .map(|id| {
                    vec![text("AAA"), text("2013J"), text(id), text("TMA"), Value::Int64(19), Value::Float64(10.0)]
                })
                .collect(),
        )
    }

    fn submissions(rows: &[(&str, &str)]) -> DataSet {
        DataSet::new(
            LogicalTable::StudentAssessment.cleaned_schema(),
            rows.iter()
                .map(|(student, id)| {
                    vec![text(student), text(id), Value::Int64(18), Value::Bool(false), Value::Float64(78.0)]
                })
                .collect(),
        )
    }

    fn enrollments(students: &[&str]) -> DataSet {
        DataSet::new(
            LogicalTable::StudentInfo.cleaned_schema(),
            students
                .iter()
                .map(|s| {
                    vec![
                        text("AAA"),
                        text("2013J"),
                        text(s),
                        text("M"),
                        text("Scotland"),
                        text("HE Qualification"),
                        text("90-100%"),
                        text("55<="),
                        Value::Int64(0),
                        Value::Int64(240),
                        text("N"),
                        text("Pass"),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn unmatched_submission_has_null_assessment_metadata_and_no_enrollment_key() {
        let detail = join_assessments(
            &submissions(&[("11391", "9999")]),
            &assessments(&["1752"]),
            CardinalityPolicy::Strict,
        )
        .unwrap();
        assert_eq!(detail.len(), 1);
        assert!(detail[0].key.is_none());
        assert_eq!(detail[0].values[0], text("9999"));
        assert_eq!(detail[0].values[4], Value::Null);
    }

    #[test]
    fn duplicate_assessment_ids_fail_strict_join() {
        let err = merge(
            &submissions(&[("11391", "1752")]),
            &assessments(&["1752", "1752", "1753", "1753"]),
            &enrollments(&["11391"]),
            CardinalityPolicy::Strict,
        )
        .unwrap_err();
        match err {
            EtlError::JoinCardinality { table, key, duplicates } => {
                assert_eq!(table, "assessments");
                assert_eq!(key, "(1752)");
                assert_eq!(duplicates, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn many_to_many_policy_keeps_every_match() {
        let out = merge(
            &submissions(&[("11391", "1752")]),
            &assessments(&["1752", "1752"]),
            &enrollments(&["11391"]),
            CardinalityPolicy::ManyToMany,
        )
        .unwrap();
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn duplicate_enrollments_fail_strict_join() {
        let err = merge(
            &submissions(&[]),
            &assessments(&["1752"]),
            &enrollments(&["11391", "11391"]),
            CardinalityPolicy::Strict,
        )
        .unwrap_err();
        assert!(err.to_string().contains("studentInfo"));
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let policy: CardinalityPolicy = serde_json::from_str("\"many_to_many\"").unwrap();
        assert_eq!(policy, CardinalityPolicy::ManyToMany);
    }
}
