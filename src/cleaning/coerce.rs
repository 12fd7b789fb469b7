//! Never-raise value coercion.
//!
//! Every function here returns `None` where the input cannot be represented in the target type;
//! the caller turns that into [`Value::Null`] and lets the drop/impute rules decide.

use crate::types::Value;

/// Integer view of a raw value.
///
/// Accepts integers, floats and text holding either. Non-integral numbers are rounded half away
/// from zero; see [`is_fractional`] to detect that case.
pub fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int64(v) => Some(*v),
        Value::Float64(v) => rounded(*v),
        Value::Utf8(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(rounded))
        }
        Value::Bool(_) | Value::Null => None,
    }
}

/// `true` when the value is a finite number with a fractional part.
pub fn is_fractional(value: &Value) -> bool {
    match value {
        Value::Float64(_) | Value::Utf8(_) => to_f64(value).is_some_and(|v| v.fract() != 0.0),
        _ => false,
    }
}

/// Whether `raw` is one of [`MISSING_MARKERS`] once trimmed.
pub fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Text spellings of a missing value, as written by common dataframe tools.
pub const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Finite float view of a raw value.
pub fn to_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Int64(v) => *v as f64,
        Value::Float64(v) => *v,
        Value::Utf8(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(_) | Value::Null => return None,
    };
    v.is_finite().then_some(v)
}

/// Boolean view of a raw value (`1/0`, `true/false`, `yes/no`, ...).
pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int64(0) => Some(false),
        Value::Int64(1) => Some(true),
        Value::Float64(v) if *v == 0.0 => Some(false),
        Value::Float64(v) if *v == 1.0 => Some(true),
        Value::Utf8(s) => parse_bool(s),
        _ => None,
    }
}

/// Text view of a raw value.
///
/// Integral floats render without a fractional part so a workbook id `11391.0` and a delimited
/// id `11391` normalize to the same string.
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Utf8(s) => Some(s.clone()),
        Value::Float64(v) => Some(match integral(*v) {
            Some(i) => i.to_string(),
            None => v.to_string(),
        }),
        Value::Int64(v) => Some(v.to_string()),
        Value::Bool(b) => Some(b.to_string()),
    }
}

/// Trimmed text; blank or a missing marker is missing.
pub fn to_trimmed_text(value: &Value) -> Option<String> {
    to_text(value).and_then(|s| {
        let trimmed = s.trim();
        (!is_missing_marker(trimmed)).then(|| trimmed.to_owned())
    })
}

fn integral(v: f64) -> Option<i64> {
    if v.fract() == 0.0 { rounded(v) } else { None }
}

fn rounded(v: f64) -> Option<i64> {
    let r = v.round();
    (r.is_finite() && r.abs() < i64::MAX as f64).then_some(r as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
