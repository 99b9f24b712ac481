//! Request/response payloads and input validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Inbound body for both rephrase endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RephraseRequest {
    pub text: String,
}

/// The four style rewrites. All keys are always present; a style the upstream
/// omitted degrades to an empty string, never to null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleResult {
    pub professional: String,
    pub casual: String,
    pub polite: String,
    pub social_media: String,
}

impl StyleResult {
    /// Coerce arbitrary upstream JSON into the fixed shape. Missing or
    /// non-string keys become `""`; present values are trimmed. Never fails.
    pub fn from_value(value: &Value) -> Self {
        fn field(value: &Value, key: &str) -> String {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string()
        }

        Self {
            professional: field(value, "professional"),
            casual: field(value, "casual"),
            polite: field(value, "polite"),
            social_media: field(value, "social_media"),
        }
    }
}

/// Client-input problems. The only error family whose detail is echoed back
/// to the caller (HTTP 422).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Text cannot be empty")]
    Empty,
    #[error("Text is too long. Maximum {0} characters allowed.")]
    TooLong(usize),
    #[error("Text contains inappropriate content")]
    Blocked,
}

/// Case-insensitive substring denylist. The default list is a placeholder;
/// swap in real terms (or a smarter predicate) by constructing the filter
/// yourself and handing it to `AppState`.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    blocked: Vec<String>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(["spam", "malware", "hack"])
    }
}

impl ContentFilter {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: terms
                .into_iter()
                .map(|t| t.into().to_lowercase())
                .collect(),
        }
    }

    pub fn is_blocked(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.blocked.iter().any(|term| lowered.contains(term))
    }
}

impl RephraseRequest {
    /// Validate and normalize the input text. Returns the trimmed text on
    /// success. Length is counted in code points.
    pub fn validate(
        &self,
        max_text_length: usize,
        filter: &ContentFilter,
    ) -> Result<String, ValidationError> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        if trimmed.chars().count() > max_text_length {
            return Err(ValidationError::TooLong(max_text_length));
        }
        if filter.is_blocked(trimmed) {
            return Err(ValidationError::Blocked);
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(text: &str) -> RephraseRequest {
        RephraseRequest {
            text: text.to_string(),
        }
    }

    #[test]
    fn coercion_fills_missing_keys_with_empty_strings() {
        let result = StyleResult::from_value(&json!({"professional": "X"}));
        assert_eq!(result.professional, "X");
        assert_eq!(result.casual, "");
        assert_eq!(result.polite, "");
        assert_eq!(result.social_media, "");
    }

    #[test]
    fn coercion_trims_and_ignores_non_strings() {
        let result = StyleResult::from_value(&json!({
            "professional": "  padded  ",
            "casual": 42,
            "polite": null,
            "social_media": "ok",
            "extra": "dropped",
        }));
        assert_eq!(result.professional, "padded");
        assert_eq!(result.casual, "");
        assert_eq!(result.polite, "");
        assert_eq!(result.social_media, "ok");
    }

    #[test]
    fn coercion_never_fails_on_non_object_payloads() {
        let result = StyleResult::from_value(&json!(["not", "an", "object"]));
        assert_eq!(result, StyleResult::from_value(&json!({})));
    }

    #[test]
    fn validate_rejects_empty_and_whitespace() {
        let filter = ContentFilter::default();
        assert_eq!(request("").validate(5000, &filter), Err(ValidationError::Empty));
        assert_eq!(
            request("   \n\t ").validate(5000, &filter),
            Err(ValidationError::Empty)
        );
    }

    #[test]
    fn validate_rejects_over_length_after_trim() {
        let filter = ContentFilter::default();
        let text = format!("  {}  ", "a".repeat(11));
        assert_eq!(
            request(&text).validate(10, &filter),
            Err(ValidationError::TooLong(10))
        );
        let text = format!("  {}  ", "a".repeat(10));
        assert_eq!(request(&text).validate(10, &filter), Ok("a".repeat(10)));
    }

    #[test]
    fn validate_applies_denylist_case_insensitively() {
        let filter = ContentFilter::default();
        assert_eq!(
            request("please HACK the planet").validate(5000, &filter),
            Err(ValidationError::Blocked)
        );
        let custom = ContentFilter::new(["verboten"]);
        assert_eq!(
            request("please hack the planet").validate(5000, &custom),
            Ok("please hack the planet".to_string())
        );
    }

    #[test]
    fn validate_returns_trimmed_text() {
        let filter = ContentFilter::default();
        assert_eq!(
            request("  hello there  ").validate(5000, &filter),
            Ok("hello there".to_string())
        );
    }
}
