//! Parsing of the duration values the server emits.
//!
//! Durations show up as integer seconds (`3600`), numeric strings (`"3600"`) or
//! unit strings (`"1h"`, `"768h0m0s"`, `"1.5s"`).

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

/// Parses a duration given as seconds or as a unit string.
///
/// Bare numbers are seconds. Unit strings accept `h`, `m`, `s`, `ms`, `us`,
/// `µs` and `ns`, with optional fractional parts. Returns `None` for anything
/// else, including negative values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let mut total_nanos = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return None;
        }
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "h" => 3.6e12,
            "m" => 6e10,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            "ns" => 1.0,
            _ => return None,
        };
        rest = &rest[unit_end..];
        total_nanos += value * scale;
    }

    if total_nanos.is_finite() && total_nanos >= 0.0 && total_nanos < u64::MAX as f64 {
        Some(Duration::from_nanos(total_nanos.round() as u64))
    } else {
        None
    }
}

/// Interprets a JSON value as a duration: a non-negative number of seconds or
/// a string accepted by [`parse_duration`].
pub(crate) fn duration_from_value(value: &Value) -> Option<Duration> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .or_else(|| n.as_f64().and_then(|f| Duration::try_from_secs_f64(f).ok())),
        Value::String(s) => parse_duration(s),
        _ => None,
    }
}

/// Serde adapter for fields that carry a duration in either representation.
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(Duration::ZERO),
        Some(v) => duration_from_value(&v)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! parse_cases {
        ($($name:ident: $input:expr => $expected:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(parse_duration($input), $expected);
                }
            )*
        };
    }

    parse_cases! {
        test_parse_plain_seconds: "3600" => Some(Duration::from_secs(3600)),
        test_parse_zero_seconds: "0s" => Some(Duration::ZERO),
        test_parse_hours_minutes_seconds: "768h0m0s" => Some(Duration::from_secs(768 * 3600)),
        test_parse_mixed_units: "1h30m" => Some(Duration::from_secs(5400)),
        test_parse_fractional: "1.5s" => Some(Duration::from_millis(1500)),
        test_parse_millis: "250ms" => Some(Duration::from_millis(250)),
        test_parse_rejects_empty: "" => None,
        test_parse_rejects_unknown_unit: "5d" => None,
        test_parse_rejects_negative: "-5s" => None,
        test_parse_rejects_garbage: "soon" => None,
    }

    #[test]
    fn test_duration_from_json_value() {
        assert_eq!(
            duration_from_value(&serde_json::json!(45)),
            Some(Duration::from_secs(45))
        );
        assert_eq!(
            duration_from_value(&serde_json::json!("45")),
            Some(Duration::from_secs(45))
        );
        assert_eq!(duration_from_value(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_duration_from_out_of_range_number() {
        let huge: Value = serde_json::from_str("123456789012345678901234567890").unwrap();
        assert_eq!(duration_from_value(&huge), None);
        assert_eq!(duration_from_value(&serde_json::json!(-1.5)), None);
        assert_eq!(duration_from_value(&serde_json::json!(f64::MAX)), None);
        assert_eq!(
            duration_from_value(&serde_json::json!(2.5)),
            Some(Duration::from_millis(2500))
        );
    }
}
