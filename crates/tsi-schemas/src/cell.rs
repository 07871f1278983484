//! Loosely typed table cell.
//!
//! Rows have a dynamic schema, so a cell is one of a small closed set of
//! shapes. Deserialization is untagged with a fixed try order: `null`,
//! booleans, RFC 3339 timestamps, other strings, then numbers. A JSON
//! string is never silently promoted to a number.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Text(String),
    Number(Decimal),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric reading. Numeric text is accepted; anything else is `None`.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(d) => Some(*d),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer reading; fractional numbers are truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_decimal().and_then(|d| d.trunc().to_i64())
    }

    /// Boolean reading. Accepts `true/false`, `"true"/"false"`, `"ON"/"OFF"`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" | "ON" | "YES" | "1" => Some(true),
                "FALSE" | "OFF" | "NO" | "0" | "" => Some(false),
                _ => None,
            },
            CellValue::Number(d) => Some(!d.is_zero()),
            _ => None,
        }
    }

    /// Display text for any shape (`Null` reads as empty).
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Timestamp(ts) => ts.to_rfc3339(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(d) => d.normalize().to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Number(d)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(Decimal::from(n))
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(ts: DateTime<Utc>) -> Self {
        CellValue::Timestamp(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_variants_are_tried_in_order() {
        let v: Vec<CellValue> =
            serde_json::from_str(r#"[null, true, "2024-05-01T12:00:00Z", "150.25", 42, 1.5]"#)
                .unwrap();
        assert!(v[0].is_null());
        assert_eq!(v[1], CellValue::Bool(true));
        assert!(matches!(v[2], CellValue::Timestamp(_)));
        assert_eq!(v[3], CellValue::Text("150.25".to_string()));
        assert_eq!(v[4], CellValue::Number(Decimal::from(42)));
        assert_eq!(v[5].as_decimal(), Some(Decimal::new(15, 1)));
    }

    #[test]
    fn lenient_readers() {
        assert_eq!(CellValue::from("12").as_i64(), Some(12));
        assert_eq!(CellValue::from("ON").as_bool(), Some(true));
        assert_eq!(CellValue::from("maybe").as_bool(), None);
        assert_eq!(CellValue::Null.as_text(), "");
        assert_eq!(CellValue::from(Decimal::new(15000, 2)).as_text(), "150");
    }
}
