//! Schema registry: the seven logical tables, their canonical field order, and the physical names
//! each raw layout uses for them.
//!
//! Everything downstream of ingestion (cleaning, join, encoding, output) speaks logical names
//! only. A [`RawLayout`] resolves a logical `(table, field)` pair to the column header found in
//! that layout, so the delimited bundle and the workbook share one rule set.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{EtlError, EtlResult};
use crate::types::{DataType, Field, Schema};

/// Canonical logical field names.
pub mod field {
    pub const CODE_MODULE: &str = "code_module";
    pub const CODE_PRESENTATION: &str = "code_presentation";
    pub const MODULE_PRESENTATION_LENGTH: &str = "module_presentation_length";

    pub const ID_STUDENT: &str = "id_student";
    pub const GENDER: &str = "gender";
    pub const REGION: &str = "region";
    pub const HIGHEST_EDUCATION: &str = "highest_education";
    pub const IMD_BAND: &str = "imd_band";
    pub const AGE_BAND: &str = "age_band";
    pub const NUM_OF_PREV_ATTEMPTS: &str = "num_of_prev_attempts";
    pub const STUDIED_CREDITS: &str = "studied_credits";
    pub const DISABILITY: &str = "disability";
    pub const FINAL_RESULT: &str = "final_result";

    pub const ID_ASSESSMENT: &str = "id_assessment";
    pub const ASSESSMENT_TYPE: &str = "assessment_type";
    pub const DATE: &str = "date";
    pub const WEIGHT: &str = "weight";

    pub const DATE_SUBMITTED: &str = "date_submitted";
    pub const IS_BANKED: &str = "is_banked";
    pub const SCORE: &str = "score";

    pub const DATE_REGISTRATION: &str = "date_registration";
    pub const DATE_UNREGISTRATION: &str = "date_unregistration";

    pub const ID_SITE: &str = "id_site";
    pub const ACTIVITY_TYPE: &str = "activity_type";
    pub const WEEK_FROM: &str = "week_from";
    pub const WEEK_TO: &str = "week_to";

    pub const SUM_CLICK: &str = "sum_click";

    pub const HIGHEST_EDUCATION_ORD: &str = "highest_education_ord";
    pub const AGE_BAND_ORD: &str = "age_band_ord";
    pub const IMD_BAND_ORD: &str = "imd_band_ord";
    pub const FINAL_RESULT_ORD: &str = "final_result_ord";
}

use field::*;

/// A canonical field: logical name plus its type after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub data_type: DataType,
}

const fn f(name: &'static str, data_type: DataType) -> FieldSpec {
    FieldSpec { name, data_type }
}

const COURSES: &[FieldSpec] = &[
    f(CODE_MODULE, DataType::Utf8),
    f(CODE_PRESENTATION, DataType::Utf8),
    f(MODULE_PRESENTATION_LENGTH, DataType::Int64),
];

const STUDENT_INFO: &[FieldSpec] = &[
    f(CODE_MODULE, DataType::Utf8),
    f(CODE_PRESENTATION, DataType::Utf8),
    f(ID_STUDENT, DataType::Utf8),
    f(GENDER, DataType::Utf8),
    f(REGION, DataType::Utf8),
    f(HIGHEST_EDUCATION, DataType::Utf8),
    f(IMD_BAND, DataType::Utf8),
    f(AGE_BAND, DataType::Utf8),
    f(NUM_OF_PREV_ATTEMPTS, DataType::Int64),
    f(STUDIED_CREDITS, DataType::Int64),
    f(DISABILITY, DataType::Utf8),
    f(FINAL_RESULT, DataType::Utf8),
];

const ASSESSMENTS: &[FieldSpec] = &[
    f(CODE_MODULE, DataType::Utf8),
    f(CODE_PRESENTATION, DataType::Utf8),
    f(ID_ASSESSMENT, DataType::Utf8),
    f(ASSESSMENT_TYPE, DataType::Utf8),
    f(DATE, DataType::Int64),
    f(WEIGHT, DataType::Float64),
];

const VLE: &[FieldSpec] = &[
    f(ID_SITE, DataType::Utf8),
    f(CODE_MODULE, DataType::Utf8),
    f(CODE_PRESENTATION, DataType::Utf8),
    f(ACTIVITY_TYPE, DataType::Utf8),
    f(WEEK_FROM, DataType::Int64),
    f(WEEK_TO, DataType::Int64),
];

const STUDENT_ASSESSMENT: &[FieldSpec] = &[
    f(ID_STUDENT, DataType::Utf8),
    f(ID_ASSESSMENT, DataType::Utf8),
    f(DATE_SUBMITTED, DataType::Int64),
    f(IS_BANKED, DataType::Bool),
    f(SCORE, DataType::Float64),
];

const STUDENT_REGISTRATION: &[FieldSpec] = &[
    f(CODE_MODULE, DataType::Utf8),
    f(CODE_PRESENTATION, DataType::Utf8),
    f(ID_STUDENT, DataType::Utf8),
    f(DATE_REGISTRATION, DataType::Int64),
    f(DATE_UNREGISTRATION, DataType::Int64),
];

const STUDENT_VLE: &[FieldSpec] = &[
    f(ID_SITE, DataType::Utf8),
    f(ID_STUDENT, DataType::Utf8),
    f(CODE_MODULE, DataType::Utf8),
    f(CODE_PRESENTATION, DataType::Utf8),
    f(DATE, DataType::Int64),
    f(SUM_CLICK, DataType::Int64),
];

/// Assessment-derived columns appended to StudentInfo in the joined record set.
const JOINED_TAIL: &[FieldSpec] = &[
    f(ID_ASSESSMENT, DataType::Utf8),
    f(DATE_SUBMITTED, DataType::Int64),
    f(IS_BANKED, DataType::Bool),
    f(SCORE, DataType::Float64),
    f(ASSESSMENT_TYPE, DataType::Utf8),
    f(DATE, DataType::Int64),
    f(WEIGHT, DataType::Float64),
];

/// Ordinal columns appended to StudentInfo by the encoder.
const ENCODED_TAIL: &[FieldSpec] = &[
    f(HIGHEST_EDUCATION_ORD, DataType::Int64),
    f(AGE_BAND_ORD, DataType::Int64),
    f(IMD_BAND_ORD, DataType::Int64),
    f(FINAL_RESULT_ORD, DataType::Int64),
];

/// One of the seven canonical entities, independent of raw layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalTable {
    Courses,
    StudentInfo,
    Assessments,
    Vle,
    StudentAssessment,
    StudentRegistration,
    StudentVle,
}

impl LogicalTable {
    /// All logical tables in canonical order.
    pub const ALL: [LogicalTable; 7] = [
        LogicalTable::Courses,
        LogicalTable::StudentInfo,
        LogicalTable::Assessments,
        LogicalTable::Vle,
        LogicalTable::StudentAssessment,
        LogicalTable::StudentRegistration,
        LogicalTable::StudentVle,
    ];

    /// Canonical logical name (also the output file stem of the cleaned table).
    pub fn name(self) -> &'static str {
        match self {
            LogicalTable::Courses => "courses",
            LogicalTable::StudentInfo => "studentInfo",
            LogicalTable::Assessments => "assessments",
            LogicalTable::Vle => "vle",
            LogicalTable::StudentAssessment => "studentAssessment",
            LogicalTable::StudentRegistration => "studentRegistration",
            LogicalTable::StudentVle => "studentVle",
        }
    }

    /// Canonical fields in output column order.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            LogicalTable::Courses => COURSES,
            LogicalTable::StudentInfo => STUDENT_INFO,
            LogicalTable::Assessments => ASSESSMENTS,
            LogicalTable::Vle => VLE,
            LogicalTable::StudentAssessment => STUDENT_ASSESSMENT,
            LogicalTable::StudentRegistration => STUDENT_REGISTRATION,
            LogicalTable::StudentVle => STUDENT_VLE,
        }
    }

    /// Iterate canonical field names in order.
    pub fn field_names(self) -> impl Iterator<Item = &'static str> {
        self.fields().iter().map(|spec| spec.name)
    }

    /// Typed schema of the cleaned table.
    pub fn cleaned_schema(self) -> Schema {
        schema_of(self.fields().iter())
    }

    /// Returns the canonical spec for `logical_field`, or a [`EtlError::Schema`].
    pub fn field(self, logical_field: &str) -> EtlResult<&'static FieldSpec> {
        self.fields()
            .iter()
            .find(|spec| spec.name == logical_field)
            .ok_or_else(|| {
                EtlError::schema(
                    self.name(),
                    format!("unknown logical field '{logical_field}'"),
                )
            })
    }
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalTable {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalTable::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| EtlError::schema(s, "unknown logical table"))
    }
}

/// Physical layout of the raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RawLayout {
    /// One delimited file per table, named after the logical table.
    #[serde(rename = "csv")]
    DelimitedBundle,
    /// One workbook with one sheet per table and its own column naming.
    #[serde(rename = "workbook")]
    Workbook,
}

impl RawLayout {
    /// Short label used in logs and output directory names.
    pub fn label(self) -> &'static str {
        match self {
            RawLayout::DelimitedBundle => "csv",
            RawLayout::Workbook => "workbook",
        }
    }

    /// File stem (bundle) or sheet name (workbook) holding `table`.
    pub fn source_name(self, table: LogicalTable) -> &'static str {
        match self {
            RawLayout::DelimitedBundle => table.name(),
            RawLayout::Workbook => match table {
                LogicalTable::Courses => "cursos",
                LogicalTable::StudentInfo => "StudentInfo",
                LogicalTable::Assessments => "Assess Plan",
                LogicalTable::Vle => "Vle_modules",
                LogicalTable::StudentAssessment => "Assess_detail",
                LogicalTable::StudentRegistration => "Registration",
                LogicalTable::StudentVle => "VLE_clickStream",
            },
        }
    }

    /// Resolve a logical field of `table` to the column header used by this layout.
    pub fn resolve(self, table: LogicalTable, logical_field: &str) -> EtlResult<&'static str> {
        let spec = table.field(logical_field)?;
        Ok(match self {
            RawLayout::DelimitedBundle => spec.name,
            RawLayout::Workbook => workbook_column(table, spec.name),
        })
    }

    /// Resolve by table name, for callers holding a string key.
    pub fn resolve_named(self, table_name: &str, logical_field: &str) -> EtlResult<&'static str> {
        self.resolve(table_name.parse()?, logical_field)
    }
}

fn workbook_column(table: LogicalTable, logical: &'static str) -> &'static str {
    match (table, logical) {
        // StudentInfo keeps the plain student id header; every other sheet uses the guid form.
        (LogicalTable::StudentInfo, _) => logical,
        (_, ID_STUDENT) => "guid_student_id",
        (_, ID_ASSESSMENT) => "guid_assess_id",
        (_, ID_SITE) => "guid_site_id",
        (LogicalTable::StudentVle, SUM_CLICK) => "sum_clics",
        (LogicalTable::StudentVle, CODE_MODULE) => "modulo",
        (LogicalTable::StudentVle, CODE_PRESENTATION) => "presentation",
        _ => logical,
    }
}

/// Column order of the joined record set: StudentInfo, then assessment-derived columns.
pub fn joined_fields() -> impl Iterator<Item = &'static FieldSpec> {
    STUDENT_INFO.iter().chain(JOINED_TAIL.iter())
}

/// Typed schema of the joined record set.
pub fn joined_schema() -> Schema {
    schema_of(joined_fields())
}

/// Column order of the encoded student table: StudentInfo, then the four ordinal columns.
pub fn encoded_fields() -> impl Iterator<Item = &'static FieldSpec> {
    STUDENT_INFO.iter().chain(ENCODED_TAIL.iter())
}

/// Typed schema of the encoded student table.
pub fn encoded_schema() -> Schema {
    schema_of(encoded_fields())
}

fn schema_of<'a>(specs: impl Iterator<Item = &'a FieldSpec>) -> Schema {
    Schema::new(
        specs
            .map(|spec| Field::new(spec.name, spec.data_type))
            .collect(),
    )
}
