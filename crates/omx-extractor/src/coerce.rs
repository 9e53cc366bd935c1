//! Coercion of raw JSON values to declared field types
//!
//! Each coercion yields `Ok(Some(value))`, `Ok(None)` for an explicit
//! absence (null, empty, or a sentinel such as "N/A"), or `Err(reason)` for
//! a value that is present but unusable. Only the last is flagged.

use crate::types::{FieldValue, ParsedField};
use chrono::{Datelike, NaiveDate};
use omx_domain::FieldType;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-+]?(?:\d+(?:\.\d*)?|\.\d+))\s*(.*)$").expect("valid number regex")
});
static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)(?:st|nd|rd|th)\b").expect("valid ordinal regex"));
/// "Jan." and "Sept" spellings of an abbreviated month
static MONTH_ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec)(?:t\b)?\.")
        .expect("valid month regex")
});
static SEPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(sep)t\b").expect("valid month regex"));

/// Values meaning "the model found nothing"
const NULL_SENTINELS: &[&str] = &[
    "", "null", "none", "n/a", "na", "not found", "not available", "unknown", "-", "--",
];

/// Accepted date layouts, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%y",
];

type Coerced = Result<Option<FieldValue>, String>;

/// Coerce one raw JSON value to `field_type`
pub fn coerce(field_type: FieldType, value: &Value) -> ParsedField {
    let raw = match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    };

    match coerce_value(field_type, value) {
        Ok(Some(value)) => ParsedField {
            raw,
            value,
            coercion_failed: false,
        },
        Ok(None) => ParsedField {
            raw,
            value: FieldValue::NotFound,
            coercion_failed: false,
        },
        Err(reason) => {
            debug!(%field_type, %reason, "Value rejected");
            ParsedField {
                raw,
                value: FieldValue::NotFound,
                coercion_failed: true,
            }
        }
    }
}

fn coerce_value(field_type: FieldType, value: &Value) -> Coerced {
    match field_type {
        FieldType::Text => coerce_text(value),
        FieldType::Decimal => coerce_decimal(value),
        FieldType::Date => coerce_date(value),
    }
}

fn is_null_sentinel(s: &str) -> bool {
    let lowered = s.trim().to_lowercase();
    NULL_SENTINELS.contains(&lowered.as_str())
}

fn coerce_text(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if is_null_sentinel(s) => Ok(None),
        Value::String(s) => Ok(Some(FieldValue::Text(s.trim().to_string()))),
        Value::Number(n) => Ok(Some(FieldValue::Text(n.to_string()))),
        Value::Bool(b) => Ok(Some(FieldValue::Text(if *b { "Yes" } else { "No" }.to_string()))),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) if !is_null_sentinel(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                Ok(None)
            } else {
                Ok(Some(FieldValue::Text(parts.join("; "))))
            }
        }
        Value::Object(_) => Err("expected text, got an object".to_string()),
    }
}

fn coerce_decimal(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x.is_finite() => Ok(Some(FieldValue::Decimal(x))),
            _ => Err(format!("number out of range: {}", n)),
        },
        Value::String(s) if is_null_sentinel(s) => Ok(None),
        Value::String(s) => parse_decimal(s).map(|x| Some(FieldValue::Decimal(x))),
        other => Err(format!("expected a number, got {}", other)),
    }
}

/// Parse a human-written amount such as "$1,250,000.00", "1.8M" or "2,500 SF"
pub fn parse_decimal(input: &str) -> Result<f64, String> {
    let mut s = input.trim().to_lowercase();
    for prefix in ["approximately", "approx.", "approx", "about", "~", "usd"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start().to_string();
        }
    }
    s.retain(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '%'));

    let caps = LEADING_NUMBER
        .captures(s.trim())
        .ok_or_else(|| format!("not a number: '{}'", input))?;
    let number: f64 = caps[1]
        .parse()
        .map_err(|_| format!("not a number: '{}'", input))?;

    let suffix = caps[2].trim().trim_end_matches('.');
    let first_word = suffix.split_whitespace().next().unwrap_or("");
    let multiplier = match first_word {
        "k" | "thousand" => 1e3,
        "m" | "mm" | "mil" | "million" | "millions" => 1e6,
        "b" | "bn" | "billion" | "billions" => 1e9,
        _ if suffix
            .chars()
            .all(|c| c.is_alphabetic() || c.is_whitespace() || matches!(c, '.' | '/' | '-')) =>
        {
            1.0
        }
        _ => return Err(format!("unexpected text after number: '{}'", input)),
    };

    Ok(number * multiplier)
}

fn coerce_date(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if is_null_sentinel(s) => Ok(None),
        Value::String(s) => parse_date(s).map(|d| Some(FieldValue::Date(d))),
        Value::Number(n) => n
            .as_i64()
            .and_then(year_start)
            .map(|d| Some(FieldValue::Date(d)))
            .ok_or_else(|| format!("not a year: {}", n)),
        other => Err(format!("expected a date, got {}", other)),
    }
}

fn year_start(year: i64) -> Option<NaiveDate> {
    if !(1000..=9999).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (1000..=9999).contains(&date.year()).then_some(date)
}

/// Parse a date in any of the accepted layouts
pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    let trimmed = input.trim().trim_end_matches('.');
    let s = ORDINAL_SUFFIX.replace_all(trimmed, "$1");
    let s = MONTH_ABBREVIATION.replace_all(&s, "$1");
    let s = SEPT.replace_all(&s, "$1");
    let s = s.as_ref();

    // ISO date-time: keep the date part
    if s.len() > 10 && s.is_char_boundary(10) && matches!(s.as_bytes()[10], b'T' | b' ') {
        if let Some(date) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d")
            .ok()
            .and_then(plausible)
        {
            return Ok(date);
        }
    }

    if let Some(date) = DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(s, format)
            .ok()
            .and_then(plausible)
    }) {
        return Ok(date);
    }

    // "July 2034" becomes the first of the month
    let first_of_month = format!("1 {}", s);
    if let Some(date) = ["%d %B %Y", "%d %b %Y"].iter().find_map(|format| {
        NaiveDate::parse_from_str(&first_of_month, format)
            .ok()
            .and_then(plausible)
    }) {
        return Ok(date);
    }

    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Some(date) = s.parse().ok().and_then(year_start) {
            return Ok(date);
        }
    }

    Err(format!("unrecognized date: '{}'", input))
}
