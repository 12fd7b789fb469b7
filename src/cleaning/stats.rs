//! Column statistics used for imputation. Nulls are ignored throughout.

use std::collections::HashMap;

use crate::types::Value;

/// Most frequent text value; ties go to the value seen first.
pub fn mode<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<String> {
    let mut counts: HashMap<&'a str, usize> = HashMap::new();
    let mut order: Vec<&'a str> = Vec::new();
    for value in values {
        if let Some(s) = value.as_str() {
            let count = counts.entry(s).or_insert_with(|| {
                order.push(s);
                0
            });
            *count += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for s in order {
        let count = counts[s];
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((s, count));
        }
    }
    best.map(|(s, _)| s.to_owned())
}

/// Median of the numeric values.
pub fn median<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<f64> {
    let mut nums: Vec<f64> = values.into_iter().filter_map(Value::as_f64).collect();
    if nums.is_empty() {
        return None;
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    Some(if nums.len() % 2 == 0 {
        (nums[mid - 1] + nums[mid]) / 2.0
    } else {
        nums[mid]
    })
}

/// Arithmetic mean of the numeric values.
pub fn mean<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .filter_map(Value::as_f64)
        .fold((0.0_f64, 0_usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
