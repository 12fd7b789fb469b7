//! Ordinal encoding of the cleaned student table.
//!
//! [`encode`] appends four integer columns, each mapped from a closed vocabulary:
//!
//! | Source column | Codes |
//! |---|---|
//! | `highest_education` | No Formal quals 0 … Post Graduate Qualification 4 |
//! | `age_band` | 0-35 0, 35-55 1, 55<= 2 |
//! | `imd_band` | 0-10% 0 … 90-100% 9 |
//! | `final_result` | Withdrawn 0, Fail 1, Pass 2, Distinction 3 |
//!
//! A value outside its vocabulary encodes as [`Value::Null`] and is reported as an
//! [`EncodingGap`]; it is never an error.

use crate::cleaning::canonical_imd_band;
use crate::error::{EncodingGap, EtlError, EtlResult};
use crate::schema::field::*;
use crate::schema::{encoded_fields, encoded_schema, LogicalTable};
use crate::types::{DataSet, Value};

/// A closed categorical vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    /// Source column.
    pub column: &'static str,
    /// Encoded column.
    pub encoded: &'static str,
    /// Category labels; a label's position is its code.
    pub labels: &'static [&'static str],
}

impl Vocabulary {
    /// Code for `label`, or `None` when the label is outside the vocabulary.
    pub fn code(&self, label: &str) -> Option<i64> {
        let label = if self.column == IMD_BAND {
            canonical_imd_band(label)
        } else {
            label
        };
        self.labels
            .iter()
            .position(|l| *l == label)
            .map(|pos| pos as i64)
    }
}

/// The four vocabularies in encoded-column order.
pub const VOCABULARIES: [Vocabulary; 4] = [
    Vocabulary {
        column: HIGHEST_EDUCATION,
        encoded: HIGHEST_EDUCATION_ORD,
        labels: &[
            "No Formal quals",
            "Lower Than A Level",
            "A Level or Equivalent",
            "HE Qualification",
            "Post Graduate Qualification",
        ],
    },
    Vocabulary {
        column: AGE_BAND,
        encoded: AGE_BAND_ORD,
        labels: &["0-35", "35-55", "55<="],
    },
    Vocabulary {
        column: IMD_BAND,
        encoded: IMD_BAND_ORD,
        labels: &[
            "0-10%", "10-20%", "20-30%", "30-40%", "40-50%", "50-60%", "60-70%", "70-80%",
            "80-90%", "90-100%",
        ],
    },
    Vocabulary {
        column: FINAL_RESULT,
        encoded: FINAL_RESULT_ORD,
        labels: &["Withdrawn", "Fail", "Pass", "Distinction"],
    },
];

/// Result of [`encode`]: the encoded table plus every out-of-vocabulary value seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    /// StudentInfo columns followed by the four ordinal columns.
    pub dataset: DataSet,
    /// Unmapped values per column, in first-seen order.
    pub gaps: Vec<EncodingGap>,
}

/// Encode a cleaned studentInfo table.
///
/// Missing source values encode as missing without a gap; only present-but-unknown labels are
/// reported.
pub fn encode(student_info: &DataSet) -> EtlResult<Encoding> {
    let idx_of = |column: &str| {
        student_info.schema.index_of(column).ok_or_else(|| {
            EtlError::schema(
                LogicalTable::StudentInfo.name(),
                format!("column '{column}' required for encoding is absent"),
            )
        })
    };
    let info_idxs = LogicalTable::StudentInfo
        .field_names()
        .map(|column| idx_of(column))
        .collect::<EtlResult<Vec<usize>>>()?;
    let vocab_idxs = VOCABULARIES
        .iter()
        .map(|v| idx_of(v.column))
        .collect::<EtlResult<Vec<usize>>>()?;

    let width = encoded_fields().count();
    let mut gaps: Vec<EncodingGap> = Vec::new();
    let mut rows = Vec::with_capacity(student_info.row_count());
    for row in &student_info.rows {
        let mut out: Vec<Value> = Vec::with_capacity(width);
        out.extend(info_idxs.iter().map(|&idx| row[idx].clone()));
        for (vocab, &idx) in VOCABULARIES.iter().zip(&vocab_idxs) {
            let code = match row[idx].as_str() {
                Some(label) => {
                    let code = vocab.code(label);
                    if code.is_none() {
                        record_gap(&mut gaps, vocab.column, label);
                    }
                    code
                }
                None => None,
            };
            out.push(code.map_or(Value::Null, Value::Int64));
        }
        rows.push(out);
    }

    for gap in &gaps {
        tracing::warn!(
            column = %gap.column,
            value = %gap.value,
            rows = gap.rows,
            "category outside closed vocabulary; encoded as missing"
        );
    }
    tracing::info!(rows = rows.len(), gaps = gaps.len(), "encoded studentInfo ordinals");

    Ok(Encoding {
        dataset: DataSet::new(encoded_schema(), rows),
        gaps,
    })
}

fn record_gap(gaps: &mut Vec<EncodingGap>, column: &str, value: &str) {
    match gaps
        .iter_mut()
        .find(|g| g.column == column && g.value == value)
    {
        Some(gap) => gap.rows += 1,
        None => gaps.push(EncodingGap {
            column: column.to_owned(),
            value: value.to_owned(),
            rows: 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_codes_follow_label_order() {
        let [education, age, imd, result] = VOCABULARIES;
        assert_eq!(education.code("No Formal quals"), Some(0));
        assert_eq!(education.code("Post Graduate Qualification"), Some(4));
        assert_eq!(age.code("55<="), Some(2));
        assert_eq!(imd.code("90-100%"), Some(9));
        assert_eq!(result.code("Distinction"), Some(3));
        assert_eq!(result.code("Incomplete"), None);
    }

    #[test]
    fn uncorrected_imd_band_still_encodes() {
        let imd = VOCABULARIES[2];
        assert_eq!(imd.code("10-20"), Some(1));
    }

    #[test]
    fn repeated_gaps_are_aggregated() {
        let mut gaps = Vec::new();
        record_gap(&mut gaps, AGE_BAND, "65+");
        record_gap(&mut gaps, AGE_BAND, "65+");
        record_gap(&mut gaps, FINAL_RESULT, "Deferred");
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].rows, 2);
        assert_eq!(gaps[1].value, "Deferred");
    }
}
