//! Schema-free records.
//!
//! Records and users are plain JSON objects at this layer: attribute sets are
//! not known ahead of time, so values are kept as [`serde_json::Value`] and
//! removal is a map-key removal.

use serde_json::{Map, Number, Value};

/// A persisted record or a user, keyed by attribute name.
pub type Record = Map<String, Value>;

/// Returns whether two identity values refer to the same principal.
///
/// Uses loose equality, the way ids coming from URL parameters, form data and
/// JSON documents are usually compared:
///
/// - A missing field and `null` are equal to each other and to nothing else,
///   so two records that both lack an id match.
/// - Numbers compare by value, and a string matches a number when it parses to
///   the same number (`"5"`, `" 5 "`, `"0x5"`, and `""` for `0`).
/// - Booleans compare as `0` and `1`.
/// - Arrays compare through their comma-joined text (`[5]` matches `5`).
///   Objects never match.
///
/// [`FilterConfig::require_identity`](crate::FilterConfig::require_identity)
/// turns off the missing-id match.
#[allow(clippy::float_cmp)]
pub fn identities_match(left: Option<&Value>, right: Option<&Value>) -> bool {
    let left = left.filter(|v| !v.is_null());
    let right = right.filter(|v| !v.is_null());

    let (Some(left), Some(right)) = (left, right) else {
        return left.is_none() && right.is_none();
    };

    match (left, right) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Bool(b), other) | (other, Value::Bool(b)) => {
            let as_number = Value::Number(Number::from(u8::from(*b)));
            identities_match(Some(&as_number), Some(other))
        }
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.as_f64() == Some(string_to_number(s))
        }
        (Value::Array(items), other @ (Value::Number(_) | Value::String(_)))
        | (other @ (Value::Number(_) | Value::String(_)), Value::Array(items)) => {
            let joined = Value::String(join_array(items));
            identities_match(Some(&joined), Some(other))
        }
        _ => false,
    }
}

/// Compares two JSON numbers by value, so `1` and `1.0` are equal.
#[allow(clippy::float_cmp)]
pub(crate) fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Converts a string to a number the way loose equality does.
///
/// Blank strings are `0`. `0x`, `0o` and `0b` prefixes select a radix. Anything
/// that is not a plain decimal literal or `Infinity` is `NaN`, which equals
/// nothing.
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        let digits = trimmed
            .strip_prefix(prefix)
            .or_else(|| trimmed.strip_prefix(&prefix.to_ascii_uppercase()));
        if let Some(digits) = digits {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    // Rust also accepts "inf" and "nan", which are not numeric literals here.
    let is_decimal = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !is_decimal {
        return f64::NAN;
    }

    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Renders an array as comma-joined text. `null` elements render empty.
fn join_array(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(nested) => join_array(nested),
            Value::Object(_) => "[object Object]".to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_numbers_match() {
        assert!(identities_match(Some(&json!(5)), Some(&json!(5))));
        assert!(identities_match(Some(&json!(5)), Some(&json!(5.0))));
        assert!(!identities_match(Some(&json!(5)), Some(&json!(6))));
    }

    #[test]
    fn test_numeric_string_matches_number() {
        assert!(identities_match(Some(&json!("5")), Some(&json!(5))));
        assert!(identities_match(Some(&json!(5)), Some(&json!(" 5 "))));
        assert!(identities_match(Some(&json!("1e1")), Some(&json!(10))));
        assert!(!identities_match(Some(&json!("five")), Some(&json!(5))));
        assert!(!identities_match(Some(&json!("5px")), Some(&json!(5))));
    }

    #[test]
    fn test_blank_string_equals_zero() {
        assert!(identities_match(Some(&json!("")), Some(&json!(0))));
        assert!(identities_match(Some(&json!(0)), Some(&json!("  "))));
        assert!(!identities_match(Some(&json!("")), Some(&json!(1))));
    }

    #[test]
    fn test_radix_prefixed_strings() {
        assert!(identities_match(Some(&json!("0x10")), Some(&json!(16))));
        assert!(identities_match(Some(&json!("0B101")), Some(&json!(5))));
        assert!(identities_match(Some(&json!(8)), Some(&json!("0o10"))));
        assert!(!identities_match(Some(&json!("0xZZ")), Some(&json!(0))));
    }

    #[test]
    fn test_inf_and_nan_spellings_are_not_numbers() {
        assert!(!identities_match(Some(&json!("nan")), Some(&json!("NaN"))));
        assert!(!identities_match(Some(&json!("inf")), Some(&json!(0))));
        assert!(!identities_match(Some(&json!("NaN")), Some(&json!(0))));
    }

    #[test]
    fn test_booleans_compare_as_numbers() {
        assert!(identities_match(Some(&json!(true)), Some(&json!(1))));
        assert!(identities_match(Some(&json!(false)), Some(&json!(0))));
        assert!(identities_match(Some(&json!("1")), Some(&json!(true))));
        assert!(identities_match(Some(&json!(true)), Some(&json!(true))));
        assert!(!identities_match(Some(&json!(true)), Some(&json!(2))));
        assert!(!identities_match(Some(&json!(false)), Some(&Value::Null)));
    }

    #[test]
    fn test_arrays_compare_through_text() {
        assert!(identities_match(Some(&json!([5])), Some(&json!(5))));
        assert!(identities_match(Some(&json!("1,2")), Some(&json!([1, 2]))));
        assert!(!identities_match(Some(&json!([1])), Some(&json!([1]))));
        assert!(!identities_match(Some(&json!({"id": 1})), Some(&json!({"id": 1}))));
    }

    #[test]
    fn test_strings_compare_exactly() {
        assert!(identities_match(Some(&json!("u-1")), Some(&json!("u-1"))));
        assert!(!identities_match(Some(&json!("u-1")), Some(&json!("U-1"))));
    }

    #[test]
    fn test_missing_and_null_identities_match_each_other() {
        assert!(identities_match(None, None));
        assert!(identities_match(Some(&Value::Null), None));
        assert!(identities_match(None, Some(&Value::Null)));
        assert!(identities_match(Some(&Value::Null), Some(&Value::Null)));
    }

    #[test]
    fn test_missing_identity_never_matches_a_value() {
        assert!(!identities_match(Some(&json!(1)), None));
        assert!(!identities_match(None, Some(&json!(0))));
        assert!(!identities_match(Some(&Value::Null), Some(&json!(""))));
    }
}
