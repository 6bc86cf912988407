use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Largest magnitude below which every integral f64 is an exact integer.
pub const EXACT_FLOAT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// A single non-null cell. Null cells are represented as `Option::<Value>::None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// String form used for selections, free-text search and category counts.
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < EXACT_FLOAT_LIMIT {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// First day of the calendar month this value falls in, if it can be read as a date.
    pub fn to_month(&self) -> Option<NaiveDate> {
        let date = match self {
            Value::Date(d) => *d,
            Value::DateTime(dt) => dt.date(),
            Value::String(s) => {
                let trimmed = s.trim();
                parse_naive_datetime(trimmed)
                    .map(|dt| dt.date())
                    .or_else(|_| parse_naive_date(trimmed))
                    .ok()?
            }
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => return None,
        };
        date.with_day(1)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::String(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Converts a text field into a cell; empty fields are null.
pub fn text_cell(value: &str) -> Option<Value> {
    if value.is_empty() {
        None
    } else {
        Some(Value::String(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_display_drops_integral_float_fraction() {
        assert_eq!(Value::Float(3.0).as_display(), "3");
        assert_eq!(Value::Float(2.5).as_display(), "2.5");
        assert_eq!(Value::Integer(-7).as_display(), "-7");
        assert_eq!(Value::Boolean(true).as_display(), "true");
    }

    #[test]
    fn as_display_keeps_large_floats_exact() {
        assert_eq!(Value::Float(1e20).as_display(), "100000000000000000000");
        assert_eq!(Value::Float(-1e20).as_display(), "-100000000000000000000");
        assert_eq!(Value::Float(9_007_199_254_740_991.0).as_display(), "9007199254740991");
        assert_eq!(Value::Float(f64::INFINITY).as_display(), "inf");
    }

    #[test]
    fn parse_naive_date_prefers_day_first_slashes() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("06.05.2024").unwrap(), expected);
        assert!(parse_naive_date("not a date").is_err());
    }

    #[test]
    fn to_month_truncates_dates_and_parses_strings() {
        let may = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap());
        assert_eq!(date.to_month(), Some(may));

        let text = Value::String(" 2024-05-30 08:15:00 ".to_string());
        assert_eq!(text.to_month(), Some(may));

        assert_eq!(Value::String("soon".to_string()).to_month(), None);
        assert_eq!(Value::Integer(45000).to_month(), None);
    }

    #[test]
    fn text_cell_treats_empty_as_null() {
        assert_eq!(text_cell(""), None);
        assert_eq!(text_cell(" "), Some(Value::String(" ".to_string())));
    }
}
