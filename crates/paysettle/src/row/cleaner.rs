//! Field normalization for raw CSV rows.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::RawRow;

/// Output format for normalized timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats tried first, in order.
const STRICT_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];
const STRICT_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];

/// Looser shapes accepted when none of the strict formats match.
const LOOSE_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];
const LOOSE_DATE_FORMATS: [&str; 7] = [
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Normalizes every field of `row`.
///
/// Blank fields become `None`. The function is total: anything it cannot
/// normalize is passed through for the validator to reject.
pub fn clean(row: &RawRow) -> RawRow {
    RawRow {
        customer_id: non_blank(&row.customer_id).map(|v| v.to_uppercase()),
        customer_email: non_blank(&row.customer_email).and_then(clean_email),
        reference_no: non_blank(&row.reference_no).map(str::to_string),
        date_time: non_blank(&row.date_time).map(clean_timestamp),
        currency: non_blank(&row.currency).map(|v| v.to_uppercase()),
        amount: non_blank(&row.amount).and_then(clean_amount),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn clean_email(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ';')
        .flat_map(char::to_lowercase)
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn clean_amount(value: &str) -> Option<String> {
    let stripped: String = value
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    parse_amount(&stripped).map(|_| stripped)
}

fn clean_timestamp(value: &str) -> String {
    match parse_timestamp(value) {
        Some(parsed) => parsed.format(TIMESTAMP_FORMAT).to_string(),
        None => value.to_string(),
    }
}

/// Parses a cleaned amount string.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Parses a payment timestamp in any of the accepted shapes.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    strict_timestamp(value).or_else(|| loose_timestamp(value))
}

fn strict_timestamp(value: &str) -> Option<NaiveDateTime> {
    STRICT_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| date_only(value, &STRICT_DATE_FORMATS))
}

fn loose_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_utc());
    }
    LOOSE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| date_only(value, &LOOSE_DATE_FORMATS))
}

fn date_only(value: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
