//! Canonical identifier form.
//!
//! Storefront clients are not consistent about identifier types: the same specification value id may arrive as the
//! JSON number `7`, the string `"7"`, or the string `" 07 "`. Every identifier that is used for matching passes through
//! [`canonical_identifier`] exactly once, on both sides of any comparison, so equality is plain string equality.
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// Returns the canonical form of an identifier.
///
/// * Surrounding whitespace is removed.
/// * Purely numeric identifiers lose leading zeros (`"007"` → `"7"`).
/// * Decimal representations of integers collapse to the integer (`"7.0"` → `"7"`), and trailing zeros are dropped
///   from other decimals (`"2.50"` → `"2.5"`).
/// * Anything else (hex object ids, slugs, ...) is kept verbatim.
pub fn canonical_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next();
    let is_numeric = !int_part.is_empty() &&
        int_part.bytes().all(|b| b.is_ascii_digit()) &&
        frac_part.map(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit())).unwrap_or(true);
    if !is_numeric {
        return trimmed.to_string();
    }
    let int_part = match int_part.trim_start_matches('0') {
        "" => "0",
        s => s,
    };
    let frac_part = frac_part.map(|f| f.trim_end_matches('0')).filter(|f| !f.is_empty());
    let is_zero = int_part == "0" && frac_part.is_none();
    let sign = if negative && !is_zero { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}{int_part}.{frac}"),
        None => format!("{sign}{int_part}"),
    }
}

/// Canonical identifier from a JSON string or number. Any other JSON type yields `None`.
pub fn identifier_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(canonical_identifier(s)),
        Value::Number(n) => Some(canonical_identifier(&n.to_string())),
        _ => None,
    }
}

/// Serde adapter accepting either a string or a number, producing the canonical identifier.
pub fn deserialize_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    let value = Value::deserialize(deserializer)?;
    identifier_from_value(&value)
        .ok_or_else(|| de::Error::custom(format!("expected a string or numeric identifier, found {value}")))
}
