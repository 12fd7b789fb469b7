use oulad_etl::join::{merge, CardinalityPolicy};
use oulad_etl::schema::{joined_schema, LogicalTable};
use oulad_etl::types::{DataSet, Value};
use oulad_etl::EtlError;

fn text(s: &str) -> Value {
    Value::Utf8(s.to_string())
}

fn student_info(ids: &[&str]) -> DataSet {
    DataSet::new(
        LogicalTable::StudentInfo.cleaned_schema(),
        ids.iter()
            .map(|id| {
                vec![
                    text("AAA"),
                    text("2013J"),
                    text(id),
                    text("F"),
                    text("Scotland"),
                    text("HE Qualification"),
                    text("20-30%"),
                    text("35-55"),
                    Value::Int64(0),
                    Value::Int64(60),
                    text("N"),
                    text("Pass"),
                ]
            })
            .collect(),
    )
}

fn assessments() -> DataSet {
    DataSet::new(
        LogicalTable::Assessments.cleaned_schema(),
        vec![
            vec![text("AAA"), text("2013J"), text("1752"), text("TMA"), Value::Int64(19), Value::Float64(10.0)],
            vec![text("AAA"), text("2013J"), text("1753"), text("TMA"), Value::Int64(54), Value::Float64(20.0)],
            vec![text("AAA"), text("2013J"), text("1754"), text("CMA"), Value::Int64(117), Value::Float64(0.0)],
        ],
    )
}

fn submission(student: &str, assessment: &str, score: f64) -> Vec<Value> {
    vec![
        text(student),
        text(assessment),
        Value::Int64(18),
        Value::Bool(false),
        Value::Float64(score),
    ]
}

#[test]
fn every_enrollment_appears_once_per_submission_or_once_when_none() {
    let sa = DataSet::new(
        LogicalTable::StudentAssessment.cleaned_schema(),
        vec![
            submission("11391", "1752", 78.0),
            submission("11391", "1753", 85.0),
            submission("11391", "1754", 80.0),
        ],
    );
    let out = merge(&sa, &assessments(), &student_info(&["11391", "28400"]), CardinalityPolicy::Strict).unwrap();

    assert_eq!(out.schema, joined_schema());
    assert_eq!(out.row_count(), 4);

    let ids: Vec<_> = (0..out.row_count()).map(|r| out.value(r, "id_student").cloned()).collect();
    assert_eq!(ids.iter().filter(|v| **v == Some(text("11391"))).count(), 3);
    assert_eq!(ids.iter().filter(|v| **v == Some(text("28400"))).count(), 1);

    assert_eq!(out.value(0, "id_assessment"), Some(&text("1752")));
    assert_eq!(out.value(0, "weight"), Some(&Value::Float64(10.0)));
    assert_eq!(out.value(2, "assessment_type"), Some(&text("CMA")));

    // No submissions: assessment-derived columns are all missing.
    for column in ["id_assessment", "date_submitted", "is_banked", "score", "assessment_type", "date", "weight"] {
        assert_eq!(out.value(3, column), Some(&Value::Null), "{column}");
    }
}

#[test]
fn submission_for_another_presentation_does_not_join() {
    let mut other = assessments();
    other.rows[0][1] = text("2014J");
    let sa = DataSet::new(
        LogicalTable::StudentAssessment.cleaned_schema(),
        vec![submission("11391", "1752", 78.0)],
    );
    let out = merge(&sa, &other, &student_info(&["11391"]), CardinalityPolicy::Strict).unwrap();

    assert_eq!(out.row_count(), 1);
    assert_eq!(out.value(0, "score"), Some(&Value::Null));
}

#[test]
fn duplicate_assessment_ids_are_a_cardinality_error() {
    let mut dup = assessments();
    dup.rows.push(dup.rows[0].clone());
    let sa = DataSet::new(
        LogicalTable::StudentAssessment.cleaned_schema(),
        vec![submission("11391", "1752", 78.0)],
    );
    let err = merge(&sa, &dup, &student_info(&["11391"]), CardinalityPolicy::Strict).unwrap_err();
    assert!(matches!(err, EtlError::JoinCardinality { duplicates: 1, .. }));
}

#[test]
fn columns_missing_from_input_are_a_schema_error() {
    let sa = DataSet::new(LogicalTable::Courses.cleaned_schema(), vec![]);
    let err = merge(&sa, &assessments(), &student_info(&[]), CardinalityPolicy::Strict).unwrap_err();
    assert!(matches!(err, EtlError::Schema { .. }));
}
