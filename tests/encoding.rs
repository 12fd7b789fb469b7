use oulad_etl::cleaning::clean;
use oulad_etl::encoding::{encode, VOCABULARIES};
use oulad_etl::schema::{encoded_schema, LogicalTable};
use oulad_etl::types::{DataSet, Schema, Value};

fn raw_student(id: &str, education: &str, imd: &str, age: &str, result: &str) -> Vec<Value> {
    [
        "AAA", "2013J", id, "M", "Scotland", education, imd, age, "0", "60", "N", result,
    ]
    .iter()
    .map(|s| {
        if s.is_empty() {
            Value::Null
        } else {
            Value::Utf8(s.to_string())
        }
    })
    .collect()
}

fn cleaned(rows: Vec<Vec<Value>>) -> DataSet {
    let raw = DataSet::new(Schema::untyped(LogicalTable::StudentInfo.field_names()), rows);
    clean(LogicalTable::StudentInfo, &raw).unwrap()
}

#[test]
fn imd_band_typo_encodes_as_second_decile() {
    let ds = cleaned(vec![raw_student("1", "HE Qualification", "10-20", "0-35", "Pass")]);
    let enc = encode(&ds).unwrap();

    assert!(enc.gaps.is_empty());
    assert_eq!(enc.dataset.value(0, "imd_band"), Some(&Value::Utf8("10-20%".into())));
    assert_eq!(enc.dataset.value(0, "imd_band_ord"), Some(&Value::Int64(1)));
    assert_eq!(enc.dataset.value(0, "highest_education_ord"), Some(&Value::Int64(3)));
    assert_eq!(enc.dataset.value(0, "age_band_ord"), Some(&Value::Int64(0)));
    assert_eq!(enc.dataset.value(0, "final_result_ord"), Some(&Value::Int64(2)));
}

#[test]
fn unknown_category_is_a_gap_not_an_error() {
    let ds = cleaned(vec![
        raw_student("1", "HE Qualification", "0-10%", "0-35", "Incomplete"),
        raw_student("2", "HE Qualification", "0-10%", "0-35", "Incomplete"),
        raw_student("3", "HE Qualification", "0-10%", "0-35", "Fail"),
    ]);
    let enc = encode(&ds).unwrap();

    assert_eq!(enc.dataset.row_count(), 3);
    assert_eq!(enc.dataset.value(0, "final_result_ord"), Some(&Value::Null));
    assert_eq!(enc.dataset.value(2, "final_result_ord"), Some(&Value::Int64(1)));
    assert_eq!(enc.gaps.len(), 1);
    assert_eq!(enc.gaps[0].column, "final_result");
    assert_eq!(enc.gaps[0].value, "Incomplete");
    assert_eq!(enc.gaps[0].rows, 2);
}

#[test]
fn encoded_table_keeps_student_columns_then_ordinals() {
    let ds = cleaned(vec![raw_student("1", "No Formal quals", "90-100%", "55<=", "Distinction")]);
    let enc = encode(&ds).unwrap();

    assert_eq!(enc.dataset.schema, encoded_schema());
    let names: Vec<&str> = enc.dataset.schema.field_names().collect();
    let tail: Vec<&str> = VOCABULARIES.iter().map(|v| v.encoded).collect();
    assert_eq!(&names[names.len() - 4..], tail.as_slice());
    assert_eq!(
        &enc.dataset.rows[0][names.len() - 4..],
        &[Value::Int64(0), Value::Int64(2), Value::Int64(9), Value::Int64(3)]
    );
}
