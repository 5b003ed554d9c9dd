// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tolerant JSON extraction from free-form model output.

use serde::de::DeserializeOwned;

use crate::error::KestrelError;

/// Parses the first JSON object (`{...}`) embedded in `response`.
///
/// Handles markdown code fences and prose around the object.
pub fn parse_object<T: DeserializeOwned>(response: &str) -> Result<T, KestrelError> {
    parse_delimited(response, '{', '}')
}

/// Parses the first JSON array (`[...]`) embedded in `response`.
pub fn parse_array<T: DeserializeOwned>(response: &str) -> Result<Vec<T>, KestrelError> {
    parse_delimited(response, '[', ']')
}

fn parse_delimited<T: DeserializeOwned>(
    response: &str,
    open: char,
    close: char,
) -> Result<T, KestrelError> {
    let trimmed = response.trim();
    let start = trimmed
        .find(open)
        .ok_or_else(|| KestrelError::MalformedOutput(format!("no `{open}` in model output")))?;
    let end = trimmed
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or_else(|| KestrelError::MalformedOutput(format!("no `{close}` in model output")))?;

    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| KestrelError::MalformedOutput(format!("invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        overall: f64,
    }

    #[test]
    fn parses_fenced_object() {
        let raw = "Here you go:\n```json\n{\"overall\": 0.9}\n```";
        assert_eq!(parse_object::<Score>(raw).unwrap(), Score { overall: 0.9 });
    }

    #[test]
    fn parses_array_with_prose() {
        let raw = "Plan: [1, 2, 3] done";
        assert_eq!(parse_array::<u32>(raw).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_object_is_malformed() {
        let err = parse_object::<Score>("no json here").unwrap_err();
        assert!(matches!(err, KestrelError::MalformedOutput(_)));
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = parse_object::<Score>("{\"overall\": }").unwrap_err();
        assert!(matches!(err, KestrelError::MalformedOutput(_)));
    }
}
