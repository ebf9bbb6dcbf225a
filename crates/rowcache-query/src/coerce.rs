//! Cell and operand coercion shared by filtering and sorting.

use chrono::NaiveDate;
use std::cmp::Ordering;

use rowcache_core::CellValue;

/// Numeric value of a cell or operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Integers compare exactly; anything involving a float compares as `f64`.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }
}

/// Parses text such as `"1,250.5"`; thousands separators are ignored.
pub fn parse_number(text: &str) -> Option<Number> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
        return None;
    }

    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(Number::Int(v));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Number::Float)
}

pub fn cell_number(cell: &CellValue) -> Option<Number> {
    match cell {
        CellValue::Null => None,
        CellValue::Int(v) => Some(Number::Int(*v)),
        CellValue::Float(v) if v.is_finite() => Some(Number::Float(*v)),
        CellValue::Float(_) => None,
        CellValue::Text(s) => parse_number(s),
    }
}

/// Parses the first ten characters as `YYYY-MM-DD`, so timestamps compare by day.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    let prefix = trimmed.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

pub fn cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Text(s) => parse_date(s),
        _ => None,
    }
}
