use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Values that can appear in a result row.
///
/// One enum across drivers so callers never branch on driver-native types:
/// ```rust
/// use sql_dispatch::prelude::*;
///
/// let values = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

/// Typed views over a row value.
///
/// The simple-query protocol delivers every column as text, so the numeric,
/// boolean, and timestamp views also coerce from `Text`. A value that does not
/// fit the requested view yields `None`.
impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Accepts the 0/1 and `t`/`f` encodings drivers report booleans as.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int(0) => Some(false),
            Self::Int(1) => Some(true),
            Self::Text(text) => match text.trim() {
                "t" | "true" | "1" => Some(true),
                "f" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text values parse as `YYYY-MM-DD HH:MM:SS` with an optional fractional
    /// part.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(value) => Some(*value),
            Self::Text(text) => {
                NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()
            }
            _ => None,
        }
    }
}

/// Which of the two pools a statement is routed to.
///
/// Each role owns an independent pool with its own port and capacity;
/// the pools never share sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
pub enum PoolRole {
    /// Write-capable pool (DML, DDL, and anything else unclassified)
    Write,
    /// Read-only pool (`SELECT` / `SHOW`)
    Read,
}

impl std::fmt::Display for PoolRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolRole::Write => write!(f, "write"),
            PoolRole::Read => write!(f, "read"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn numeric_views_coerce_from_text() {
        assert_eq!(SqlValue::Int(42).as_int(), Some(42));
        assert_eq!(SqlValue::Text("42".into()).as_int(), Some(42));
        assert_eq!(SqlValue::Text(" 42 ".into()).as_int(), Some(42));
        assert_eq!(SqlValue::Text("forty-two".into()).as_int(), None);
        assert_eq!(SqlValue::Text("2.5".into()).as_float(), Some(2.5));
        assert_eq!(SqlValue::Int(3).as_float(), Some(3.0));
        assert_eq!(SqlValue::Null.as_int(), None);
    }

    #[test]
    fn bool_view_accepts_driver_encodings() {
        assert_eq!(SqlValue::Bool(true).as_bool(), Some(true));
        assert_eq!(SqlValue::Int(0).as_bool(), Some(false));
        assert_eq!(SqlValue::Int(1).as_bool(), Some(true));
        assert_eq!(SqlValue::Int(7).as_bool(), None);
        assert_eq!(SqlValue::Text("t".into()).as_bool(), Some(true));
        assert_eq!(SqlValue::Text("false".into()).as_bool(), Some(false));
        assert_eq!(SqlValue::Text("yes".into()).as_bool(), None);
    }

    #[test]
    fn timestamp_view_parses_with_and_without_fraction() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap();
        assert_eq!(
            SqlValue::Text("2024-05-01 12:30:00".into()).as_timestamp(),
            Some(expected)
        );
        let fractional = SqlValue::Text("2024-05-01 12:30:00.250".into())
            .as_timestamp()
            .unwrap();
        assert_eq!(fractional.date(), expected.date());
        assert_eq!(fractional.time().format("%H:%M:%S").to_string(), "12:30:00");
        assert_eq!(SqlValue::Text("noon-ish".into()).as_timestamp(), None);
        assert_eq!(SqlValue::Null.as_timestamp(), None);
    }

    #[test]
    fn text_view_does_not_stringify_other_variants() {
        assert_eq!(SqlValue::Text("alice".into()).as_text(), Some("alice"));
        assert_eq!(SqlValue::Int(1).as_text(), None);
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Int(0).is_null());
    }
}
