use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oulad_etl::cleaning::clean;
use oulad_etl::encoding::encode;
use oulad_etl::join::{merge, CardinalityPolicy};
use oulad_etl::schema::LogicalTable;
use oulad_etl::types::{DataSet, Schema, Value};

const STUDENTS: usize = 20_000;
const ASSESSMENTS: usize = 10;

const EDUCATION: [&str; 5] = [
    "No Formal quals",
    "Lower Than A Level",
    "A Level or Equivalent",
    "HE Qualification",
    "Post Graduate Qualification",
];
const IMD: [&str; 10] = [
    "0-10%", "10-20", "20-30%", "30-40%", "40-50%", "50-60%", "60-70%", "70-80%", "80-90%", "",
];

fn text(s: impl Into<String>) -> Value {
    let s = s.into();
    if s.is_empty() { Value::Null } else { Value::Utf8(s) }
}

fn raw(table: LogicalTable, rows: Vec<Vec<Value>>) -> DataSet {
    DataSet::new(Schema::untyped(table.field_names()), rows)
}

fn raw_student_info() -> DataSet {
    let rows = (0..STUDENTS)
        .map(|i| {
            vec![
                text("AAA"),
                text("2013J"),
                text(i.to_string()),
                text(if i % 3 == 0 { "" } else { "F" }),
                text("Scotland"),
                text(EDUCATION[i % EDUCATION.len()]),
                text(IMD[i % IMD.len()]),
                text("35-55"),
                text("0"),
                text(if i % 7 == 0 { String::new() } else { (60 * (1 + i % 4)).to_string() }),
                text("N"),
                text(if i % 2 == 0 { "Pass" } else { "Fail" }),
            ]
        })
        .collect();
    raw(LogicalTable::StudentInfo, rows)
}

fn raw_assessments() -> DataSet {
    let rows = (0..ASSESSMENTS)
        .map(|a| {
            vec![
                text("AAA"),
                text("2013J"),
                text((1_000 + a).to_string()),
                text("TMA"),
                text((a * 20).to_string()),
                text("10"),
            ]
        })
        .collect();
    raw(LogicalTable::Assessments, rows)
}

fn raw_submissions() -> DataSet {
    let rows = (0..STUDENTS)
        .flat_map(|i| {
            (0..i % ASSESSMENTS).map(move |a| {
                vec![
                    text(i.to_string()),
                    text((1_000 + a).to_string()),
                    text((a * 20 + 2).to_string()),
                    text("0"),
                    text(if (i + a) % 11 == 0 { String::new() } else { ((i + a) % 100).to_string() }),
                ]
            })
        })
        .collect();
    raw(LogicalTable::StudentAssessment, rows)
}

fn bench_pipeline(c: &mut Criterion) {
    let info = raw_student_info();
    let assessments = raw_assessments();
    let submissions = raw_submissions();

    c.bench_function("clean_student_info_20k", |b| {
        b.iter(|| clean(LogicalTable::StudentInfo, black_box(&info)).unwrap())
    });

    c.bench_function("clean_student_assessment", |b| {
        b.iter(|| clean(LogicalTable::StudentAssessment, black_box(&submissions)).unwrap())
    });

    let info = clean(LogicalTable::StudentInfo, &info).unwrap();
    let assessments = clean(LogicalTable::Assessments, &assessments).unwrap();
    let submissions = clean(LogicalTable::StudentAssessment, &submissions).unwrap();

    c.bench_function("merge_20k_enrollments", |b| {
        b.iter(|| {
            merge(
                black_box(&submissions),
                black_box(&assessments),
                black_box(&info),
                CardinalityPolicy::Strict,
            )
            .unwrap()
        })
    });

    c.bench_function("encode_20k_students", |b| b.iter(|| encode(black_box(&info)).unwrap()));
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
