use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Value};

use crate::duration::{format_hhmm, parse_duration, parse_duration_or_zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Boolean,
    Date,
    Duration,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Duration => "duration",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bound argument or option value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Duration(Duration),
}

impl ArgValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ArgValue::String(_) => ValueType::String,
            ArgValue::Integer(_) => ValueType::Integer,
            ArgValue::Boolean(_) => ValueType::Boolean,
            ArgValue::Date(_) => ValueType::Date,
            ArgValue::Duration(_) => ValueType::Duration,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::String(value) => json!(value),
            ArgValue::Integer(value) => json!(value),
            ArgValue::Boolean(value) => json!(value),
            ArgValue::Date(value) => json!(value.to_rfc3339()),
            ArgValue::Duration(value) => json!(value.num_seconds()),
        }
    }

    /// Strict conversion used by handler accessors: `None` when the value
    /// cannot be represented as `target`.
    pub fn convert(&self, target: ValueType) -> Option<ArgValue> {
        if self.value_type() == target {
            return Some(self.clone());
        }
        match (self, target) {
            (_, ValueType::String) => Some(ArgValue::String(self.to_string())),
            (ArgValue::String(text), ValueType::Integer) => {
                text.trim().parse::<i64>().ok().map(ArgValue::Integer)
            }
            (ArgValue::String(text), ValueType::Boolean) => {
                match text.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => Some(ArgValue::Boolean(true)),
                    "false" | "0" | "no" => Some(ArgValue::Boolean(false)),
                    _ => None,
                }
            }
            (ArgValue::String(text), ValueType::Date) => parse_date(text).map(ArgValue::Date),
            (ArgValue::String(text), ValueType::Duration) => {
                parse_duration(text).map(ArgValue::Duration)
            }
            (ArgValue::Boolean(flag), ValueType::Integer) => {
                Some(ArgValue::Integer(i64::from(*flag)))
            }
            (ArgValue::Integer(value), ValueType::Boolean) => Some(ArgValue::Boolean(*value != 0)),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::String(value) => f.write_str(value),
            ArgValue::Integer(value) => write!(f, "{}", value),
            ArgValue::Boolean(value) => write!(f, "{}", value),
            ArgValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            ArgValue::Duration(value) => f.write_str(&format_hhmm(*value)),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Boolean(value)
    }
}

/// Outcome of the lenient coercion applied while binding tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: ArgValue,
    /// Set when the raw text could not be parsed and a fallback was used.
    pub lossy: bool,
}

/// Lenient coercion: integers fall back to 0, booleans to false, dates to
/// `now`, durations to zero.
pub fn coerce(raw: &str, value_type: ValueType, now: DateTime<Utc>) -> Coerced {
    match value_type {
        ValueType::String => Coerced {
            value: ArgValue::String(raw.to_string()),
            lossy: false,
        },
        ValueType::Integer => match raw.trim().parse::<i64>() {
            Ok(value) => Coerced {
                value: ArgValue::Integer(value),
                lossy: false,
            },
            Err(_) => Coerced {
                value: ArgValue::Integer(0),
                lossy: true,
            },
        },
        ValueType::Boolean => {
            let lowered = raw.trim().to_lowercase();
            Coerced {
                value: ArgValue::Boolean(lowered == "true" || lowered == "1"),
                lossy: false,
            }
        }
        ValueType::Date => match parse_date(raw) {
            Some(date) => Coerced {
                value: ArgValue::Date(date),
                lossy: false,
            },
            None => Coerced {
                value: ArgValue::Date(now),
                lossy: true,
            },
        },
        ValueType::Duration => Coerced {
            value: ArgValue::Duration(parse_duration_or_zero(raw)),
            lossy: parse_duration(raw).is_none(),
        },
    }
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y"];

/// Best-effort calendar parse. Naive values are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0).map(|value| value.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn integer_falls_back_to_zero() {
        let coerced = coerce("abc", ValueType::Integer, now());
        assert_eq!(coerced.value, ArgValue::Integer(0));
        assert!(coerced.lossy);
        assert_eq!(coerce("42", ValueType::Integer, now()).value, ArgValue::Integer(42));
    }

    #[test]
    fn boolean_accepts_true_and_one() {
        assert_eq!(coerce("TRUE", ValueType::Boolean, now()).value, ArgValue::Boolean(true));
        assert_eq!(coerce("1", ValueType::Boolean, now()).value, ArgValue::Boolean(true));
        assert_eq!(coerce("yes", ValueType::Boolean, now()).value, ArgValue::Boolean(false));
    }

    #[test]
    fn date_falls_back_to_now() {
        let coerced = coerce("someday", ValueType::Date, now());
        assert_eq!(coerced.value, ArgValue::Date(now()));
        assert!(coerced.lossy);
    }

    #[test]
    fn parse_date_accepts_common_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2026-04-02"), Some(expected));
        assert_eq!(parse_date("2026/04/02"), Some(expected));
        assert_eq!(parse_date("02.04.2026"), Some(expected));
        assert_eq!(
            parse_date("2026-04-02T09:30:00Z"),
            Some(Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap())
        );
        assert_eq!(parse_date("next week"), None);
    }

    #[test]
    fn convert_is_strict() {
        let text = ArgValue::from("12");
        assert_eq!(text.convert(ValueType::Integer), Some(ArgValue::Integer(12)));
        assert_eq!(ArgValue::from("x").convert(ValueType::Integer), None);
        assert_eq!(ArgValue::from("x").convert(ValueType::Date), None);
        assert_eq!(
            ArgValue::Integer(3).convert(ValueType::String),
            Some(ArgValue::from("3"))
        );
    }
}
