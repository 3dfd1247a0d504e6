//! Count-string normalization and data-point counting.

use serde_json::Value;

/// Parse display counts such as `"1.2K"`, `"3M"` or `"12,345"`.
///
/// Suffixes are case-insensitive and commas are ignored. Anything that does
/// not parse yields 0.
pub fn parse_count(raw: &str) -> u64 {
    let cleaned = raw.replace(',', "").trim().to_ascii_uppercase();

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix('K') {
        (n, 1_000.0)
    } else if let Some(n) = cleaned.strip_suffix('M') {
        (n, 1_000_000.0)
    } else {
        return cleaned.parse::<u64>().unwrap_or(0);
    };

    match number.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => (n * multiplier).round() as u64,
        _ => 0,
    }
}

/// Count every element of every map and sequence in `value`.
///
/// A map contributes its number of keys, a sequence its length, and both are
/// descended into. Uses an explicit stack so deeply nested input cannot
/// exhaust the call stack.
pub fn count_data_points(value: &Value) -> usize {
    let mut count = 0;
    let mut stack = vec![value];
    while let Some(current) = stack.pop() {
        match current {
            Value::Object(map) => {
                count += map.len();
                stack.extend(map.values());
            }
            Value::Array(items) => {
                count += items.len();
                stack.extend(items.iter());
            }
            _ => {}
        }
    }
    count
}
