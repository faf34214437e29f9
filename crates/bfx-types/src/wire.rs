//! Positional array decoding
//!
//! Channel data arrives as untyped JSON arrays whose meaning depends on the
//! element index. Each record type declares its layout as a set of index
//! constants plus a minimum length, and reads its fields through [`Row`].
//!
//! Decoding is permissive about trailing optional fields: a missing or `null`
//! element decodes to the field's default (zero, empty string, `false`), while
//! an element of the wrong JSON type is an error.

use crate::error::DecodeError;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Read-only view over one positional array
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    kind: &'static str,
    items: &'a [Value],
}

impl<'a> Row<'a> {
    /// Wrap `value`, which must be an array of at least `min_len` elements
    pub fn new(kind: &'static str, value: &'a Value, min_len: usize) -> Result<Self, DecodeError> {
        let items = value
            .as_array()
            .ok_or_else(|| DecodeError::shape(format!("{kind}: expected an array")))?;
        Self::from_slice(kind, items, min_len)
    }

    /// Wrap an already-extracted slice
    pub fn from_slice(
        kind: &'static str,
        items: &'a [Value],
        min_len: usize,
    ) -> Result<Self, DecodeError> {
        if items.len() < min_len {
            return Err(DecodeError::TooShort {
                kind,
                expected: min_len,
                actual: items.len(),
            });
        }
        Ok(Self { kind, items })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the array has no elements
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record kind used in error messages
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Raw element, `None` when absent or `null`
    pub fn value(&self, index: usize) -> Option<&'a Value> {
        self.items.get(index).filter(|v| !v.is_null())
    }

    fn invalid(&self, index: usize, expected: &'static str) -> DecodeError {
        DecodeError::InvalidField {
            kind: self.kind,
            index,
            expected,
        }
    }

    /// Decimal field, zero when absent
    pub fn decimal(&self, index: usize) -> Result<Decimal, DecodeError> {
        Ok(self.opt_decimal(index)?.unwrap_or_default())
    }

    /// Optional decimal field
    pub fn opt_decimal(&self, index: usize) -> Result<Option<Decimal>, DecodeError> {
        match self.value(index) {
            None => Ok(None),
            Some(v) => parse_decimal(v)
                .map(Some)
                .ok_or_else(|| self.invalid(index, "decimal")),
        }
    }

    /// Integer field, zero when absent
    pub fn int(&self, index: usize) -> Result<i64, DecodeError> {
        Ok(self.opt_int(index)?.unwrap_or_default())
    }

    /// Optional integer field
    pub fn opt_int(&self, index: usize) -> Result<Option<i64>, DecodeError> {
        match self.value(index) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| self.invalid(index, "integer")),
            Some(Value::String(s)) => s
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.invalid(index, "integer")),
            Some(_) => Err(self.invalid(index, "integer")),
        }
    }

    /// String field, empty when absent
    pub fn string(&self, index: usize) -> Result<String, DecodeError> {
        Ok(self.opt_string(index)?.unwrap_or_default())
    }

    /// Optional string field
    pub fn opt_string(&self, index: usize) -> Result<Option<String>, DecodeError> {
        match self.value(index) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(index, "string")),
        }
    }

    /// Boolean flag; the exchange encodes these as `0`/`1`
    pub fn flag(&self, index: usize) -> Result<bool, DecodeError> {
        match self.value(index) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Some(_) => Err(self.invalid(index, "flag")),
        }
    }

    /// Nested array field
    pub fn nested(
        &self,
        index: usize,
        kind: &'static str,
        min_len: usize,
    ) -> Result<Row<'a>, DecodeError> {
        match self.items.get(index) {
            Some(v) => Row::new(kind, v, min_len),
            None => Err(DecodeError::TooShort {
                kind: self.kind,
                expected: index + 1,
                actual: self.items.len(),
            }),
        }
    }

    /// Raw JSON of an element, `Value::Null` when absent
    pub fn json(&self, index: usize) -> Value {
        self.items.get(index).cloned().unwrap_or(Value::Null)
    }
}

/// Parse a JSON number or numeric string into a [`Decimal`]
///
/// Numbers are parsed from their textual form so no precision is lost;
/// scientific notation (`1e-8`) falls back to [`Decimal::from_scientific`].
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    match Decimal::from_str(&text) {
        Ok(d) => Some(d),
        Err(_) => Decimal::from_scientific(&text).ok().map(|d| d.normalize()),
    }
}

/// A record decoded from a positional array
pub trait FromRow: Sized {
    /// Record name used in error messages
    const KIND: &'static str;
    /// Minimum number of elements the exchange sends
    const MIN_LEN: usize;

    /// Build the record from a length-checked row
    fn from_row(row: &Row<'_>) -> Result<Self, DecodeError>;

    /// Decode a single positional array
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let row = Row::new(Self::KIND, value, Self::MIN_LEN)?;
        Self::from_row(&row)
    }

    /// Decode an array of positional arrays (a snapshot)
    fn decode_all(value: &Value) -> Result<Vec<Self>, DecodeError> {
        value
            .as_array()
            .ok_or_else(|| DecodeError::shape(format!("{}: expected a snapshot array", Self::KIND)))?
            .iter()
            .map(Self::decode)
            .collect()
    }
}

/// Returns true if `value` is an array whose first element is itself an array
pub fn is_snapshot(value: &Value) -> bool {
    value
        .as_array()
        .map(|items| items.first().map_or(true, Value::is_array))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_row_too_short() {
        let value = json!([1, 2]);
        let err = Row::new("ticker", &value, 10).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TooShort {
                kind: "ticker",
                expected: 10,
                actual: 2
            }
        );
    }

    #[test]
    fn test_row_rejects_object() {
        let value = json!({"event": "info"});
        assert!(matches!(
            Row::new("trade", &value, 1),
            Err(DecodeError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_null_and_missing_default() {
        let value = json!([null, 5]);
        let row = Row::new("test", &value, 2).unwrap();
        assert_eq!(row.decimal(0).unwrap(), Decimal::ZERO);
        assert_eq!(row.opt_decimal(0).unwrap(), None);
        assert_eq!(row.int(7).unwrap(), 0);
        assert_eq!(row.string(9).unwrap(), "");
        assert!(!row.flag(4).unwrap());
    }

    #[test]
    fn test_wrong_type_is_error() {
        let value = json!(["abc", {"x": 1}]);
        let row = Row::new("test", &value, 2).unwrap();
        assert!(matches!(
            row.decimal(0),
            Err(DecodeError::InvalidField { index: 0, .. })
        ));
        assert!(matches!(
            row.string(1),
            Err(DecodeError::InvalidField { index: 1, .. })
        ));
    }

    #[test]
    fn test_decimal_precision_preserved() {
        let value = json!([7254.7, "0.00460208", 100]);
        let row = Row::new("test", &value, 3).unwrap();
        assert_eq!(row.decimal(0).unwrap().to_string(), "7254.7");
        assert_eq!(row.decimal(1).unwrap(), dec!(0.00460208));
        assert_eq!(row.decimal(2).unwrap().to_string(), "100");
    }

    #[test]
    fn test_scientific_notation() {
        let value: Value = serde_json::from_str("[1e-8, -2.5E-3]").unwrap();
        let row = Row::new("test", &value, 2).unwrap();
        assert_eq!(row.decimal(0).unwrap(), dec!(0.00000001));
        assert_eq!(row.decimal(1).unwrap().to_string(), "-0.0025");
    }

    #[test]
    fn test_flags() {
        let value = json!([1, 0, true]);
        let row = Row::new("test", &value, 3).unwrap();
        assert!(row.flag(0).unwrap());
        assert!(!row.flag(1).unwrap());
        assert!(row.flag(2).unwrap());
    }

    #[test]
    fn test_is_snapshot() {
        assert!(is_snapshot(&json!([[1, 2, 3], [4, 5, 6]])));
        assert!(is_snapshot(&json!([])));
        assert!(!is_snapshot(&json!([1, 2, 3])));
        assert!(!is_snapshot(&json!("hb")));
    }
}
