//! Deterministic classification of tool failures as transient or fatal.

use regex::Regex;

use crate::core::policy::PolicyError;

/// A compiled retryable-error pattern and the reason it is considered transient.
#[derive(Debug, Clone)]
pub struct RetryPattern {
    regex: Regex,
    reason: String,
}

impl RetryPattern {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Matches captured output against a fixed set of retryable patterns.
///
/// Patterns are unanchored regular expressions searched anywhere in the text.
/// Classification is pure: the same text always yields the same answer.
#[derive(Debug, Clone, Default)]
pub struct RetryClassifier {
    patterns: Vec<RetryPattern>,
}

impl RetryClassifier {
    /// Compile `(pattern, reason)` pairs, preserving their order.
    pub fn new<P, R>(patterns: impl IntoIterator<Item = (P, R)>) -> Result<Self, PolicyError>
    where
        P: AsRef<str>,
        R: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|(pattern, reason)| -> Result<RetryPattern, PolicyError> {
                let pattern = pattern.as_ref();
                let regex = Regex::new(pattern).map_err(|source| PolicyError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
                Ok(RetryPattern {
                    regex,
                    reason: reason.into(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_retryable(&self, output: &str) -> bool {
        self.matching_reason(output).is_some()
    }

    /// Reason attached to the first pattern matching `output`, if any.
    pub fn matching_reason(&self, output: &str) -> Option<&str> {
        if output.is_empty() {
            return None;
        }
        self.patterns
            .iter()
            .find(|pattern| pattern.regex.is_match(output))
            .map(|pattern| pattern.reason.as_str())
    }

    pub fn patterns(&self) -> &[RetryPattern] {
        &self.patterns
    }
}
