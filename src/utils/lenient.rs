//! Forgiving conversions for numeric and date form inputs.
//!
//! Browsers post whatever the input field held, so numbers may arrive as JSON
//! numbers, numeric strings, empty strings or not at all.

use chrono::NaiveDate;
use serde_json::Value;

pub fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn integer(value: Option<&Value>) -> Option<i32> {
    let n = number(value)?.trunc();
    (n >= i32::MIN as f64 && n <= i32::MAX as f64).then_some(n as i32)
}

/// Habit counters: absent, invalid or negative input becomes 0.
pub fn count_or_zero(value: Option<&Value>) -> i32 {
    integer(value).filter(|n| *n >= 0).unwrap_or(0)
}

/// Habit quantities: absent, invalid or negative input becomes 0.
pub fn amount_or_zero(value: Option<&Value>) -> f64 {
    number(value).filter(|n| *n >= 0.0).unwrap_or(0.0)
}

pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected a YYYY-MM-DD date")]
pub struct InvalidDate;

/// `YYYY-MM-DD`. `Ok(None)` when absent or blank.
pub fn date(value: Option<&Value>) -> Result<Option<NaiveDate>, InvalidDate> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| InvalidDate),
        Some(_) => Err(InvalidDate),
    }
}

/// A list of strings given either as a JSON array or a comma separated string.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    items.into_iter().filter(|s| !s.is_empty()).collect()
}
