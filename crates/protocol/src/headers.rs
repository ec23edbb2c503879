use std::collections::BTreeSet;

use reqwest::header::HeaderValue;

/// Parses a `Tus-Extension` value into a set of extension names.
///
/// Names are trimmed; empty entries are dropped.
pub fn parse_extensions(value: Option<&HeaderValue>) -> BTreeSet<String> {
    let Some(raw) = value.and_then(|v| v.to_str().ok()) else {
        return BTreeSet::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses an integer header such as `Upload-Offset`.
///
/// A missing or unparsable header reads as 0, matching how servers that
/// omit the header are treated.
pub fn parse_offset(value: Option<&HeaderValue>) -> u64 {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}
