//! Column name and cell normalization shared by every source.

use chrono::{NaiveDate, NaiveDateTime};

/// Normalize a raw header into a column identifier.
///
/// Lowercases, then keeps only ASCII letters, digits and underscores.
/// `"Order Purchase-Timestamp"` becomes `"orderpurchasetimestamp"`.
pub fn normalize_column_name(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Whether a normalized column holds date-time values.
pub fn is_temporal_column(name: &str) -> bool {
    name.contains("date") || name.contains("timestamp")
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a date-time cell. Date-only values land on midnight.
///
/// Returns `None` for anything unrecognized; callers treat that as null.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Parse an integer cell, accepting integral floats such as `"3.0"`.
pub fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Parse a floating point cell; non-finite values are rejected.
pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}
