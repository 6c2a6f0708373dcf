//! Normalized record keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A normalized primary key.
///
/// Every key handed to a [`crate::Connection`] has gone through
/// [`Key::parse`], so backends compare and order keys as `Key` values and
/// never as raw JSON. Integer keys sort before text keys.
///
/// The empty text key is the sentinel for "no key".
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// A key that was numeric (or numeric text).
    Int(i64),
    /// Any other key.
    Text(String),
}

impl Key {
    /// Returns the empty sentinel key.
    #[must_use]
    pub fn empty() -> Self {
        Key::Text(String::new())
    }

    /// Returns true for the empty sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Key::Text(text) if text.is_empty())
    }

    /// Normalizes a raw key value.
    ///
    /// - absent, `null` and blank strings become the empty sentinel
    /// - strings holding a number become [`Key::Int`] (integer part)
    /// - any other string is kept unchanged
    /// - JSON numbers become [`Key::Int`] (integer part)
    ///
    /// An integer part outside the `i64` range is kept as [`Key::Text`]
    /// holding its digits, so distinct large keys stay distinct.
    #[must_use]
    pub fn parse(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => Key::empty(),
            Some(Value::String(text)) => Self::parse_text(text),
            Some(Value::Number(number)) => {
                if let Some(int) = number.as_i64() {
                    Key::Int(int)
                } else if let Some(unsigned) = number.as_u64() {
                    Key::Text(unsigned.to_string())
                } else {
                    number
                        .as_f64()
                        .map(integer_part)
                        .unwrap_or_else(|| Key::Text(number.to_string()))
                }
            }
            Some(Value::Bool(flag)) => Key::Text(flag.to_string()),
            Some(other) => Key::Text(other.to_string()),
        }
    }

    /// Normalizes a textual key.
    #[must_use]
    pub fn parse_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Key::empty();
        }

        let numeric = trimmed
            .parse::<f64>()
            .map(|float| float.is_finite())
            .unwrap_or(false);
        if !numeric {
            return Key::Text(text.to_string());
        }

        match leading_digits(trimmed) {
            Some(digits) => digits
                .parse::<i64>()
                .map(Key::Int)
                .unwrap_or_else(|_| Key::Text(canonical_digits(digits))),
            None => trimmed
                .parse::<f64>()
                .map(integer_part)
                .unwrap_or_else(|_| Key::Text(text.to_string())),
        }
    }

    /// Returns the textual form used in index tables and document names.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Key::Int(int) => int.to_string(),
            Key::Text(text) => text.clone(),
        }
    }

    /// Converts the key back into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(int) => Value::from(*int),
            Key::Text(text) => Value::String(text.clone()),
        }
    }
}

/// Returns the leading `[+-]digits` run of a numeric string.
fn leading_digits(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    Some(&text[..end])
}

/// Drops a `+` sign and leading zeros from an out-of-range digit run.
fn canonical_digits(digits: &str) -> String {
    let (sign, magnitude) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits.trim_start_matches('+')),
    };
    let magnitude = magnitude.trim_start_matches('0');
    if magnitude.is_empty() {
        return "0".to_string();
    }
    format!("{sign}{magnitude}")
}

/// Truncates a float, keeping out-of-range values as digit text.
fn integer_part(float: f64) -> Key {
    let truncated = float.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Key::Int(truncated as i64)
    } else {
        Key::Text(format!("{truncated:.0}"))
    }
}

impl Default for Key {
    fn default() -> Self {
        Key::empty()
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::parse_text(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::parse_text(&value)
    }
}

impl From<&Value> for Key {
    fn from(value: &Value) -> Self {
        Key::parse(Some(value))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(int) => write!(f, "Key({int})"),
            Key::Text(text) => write!(f, "Key({text:?})"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(int) => write!(f, "{int}"),
            Key::Text(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn absent_and_blank_are_empty() {
        assert!(Key::parse(None).is_empty());
        assert!(Key::parse(Some(&Value::Null)).is_empty());
        assert!(Key::parse(Some(&json!(""))).is_empty());
        assert!(Key::parse(Some(&json!("   "))).is_empty());
    }

    #[test]
    fn numeric_strings_become_integers() {
        assert_eq!(Key::from("123"), Key::Int(123));
        assert_eq!(Key::from(" 42 "), Key::Int(42));
        assert_eq!(Key::from("-7"), Key::Int(-7));
        assert_eq!(Key::from("1.9"), Key::Int(1));
        assert_eq!(Key::from("1e3"), Key::Int(1));
    }

    #[test]
    fn other_strings_pass_through() {
        assert_eq!(Key::from("u1"), Key::Text("u1".into()));
        assert_eq!(Key::from("12abc"), Key::Text("12abc".into()));
        assert_eq!(Key::from("NaN"), Key::Text("NaN".into()));
        assert_eq!(Key::from("generated_x1"), Key::Text("generated_x1".into()));
    }

    #[test]
    fn json_numbers_become_integers() {
        assert_eq!(Key::parse(Some(&json!(5))), Key::Int(5));
        assert_eq!(Key::parse(Some(&json!(5.8))), Key::Int(5));
    }

    #[test]
    fn integers_beyond_i64_stay_distinct() {
        let first = Key::from("99999999999999999999");
        let second = Key::from("88888888888888888888");
        assert_eq!(first, Key::Text("99999999999999999999".into()));
        assert_ne!(first, second);

        assert_eq!(Key::from("+0099999999999999999999"), first);
        assert_eq!(
            Key::from("-99999999999999999999.5"),
            Key::Text("-99999999999999999999".into())
        );
        assert_eq!(
            Key::parse(Some(&json!(18_000_000_000_000_000_000_u64))),
            Key::Text("18000000000000000000".into())
        );
        assert_eq!(Key::parse(Some(&json!(1e20))), Key::Text("100000000000000000000".into()));
        assert_eq!(Key::from("9223372036854775807"), Key::Int(i64::MAX));
    }

    #[test]
    fn integers_sort_before_text() {
        let mut keys = vec![Key::from("b"), Key::Int(10), Key::from("a"), Key::Int(2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![Key::Int(2), Key::Int(10), Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn serializes_untagged() {
        let keys = vec![Key::Int(3), Key::from("x")];
        let text = serde_json::to_string(&keys).unwrap();
        assert_eq!(text, r#"[3,"x"]"#);
        let back: Vec<Key> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, keys);
    }

    proptest! {
        #[test]
        fn integer_text_normalizes_to_same_key(n in any::<i64>()) {
            prop_assert_eq!(Key::from(n.to_string()), Key::Int(n));
            prop_assert_eq!(Key::parse(Some(&json!(n))), Key::Int(n));
        }

        #[test]
        fn parse_is_idempotent(text in "[a-z0-9_ ]{0,12}") {
            let once = Key::parse_text(&text);
            let twice = Key::parse(Some(&once.to_value()));
            prop_assert_eq!(once, twice);
        }
    }
}
