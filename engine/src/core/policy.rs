//! Retry policy shared by every command execution in a run.

use std::time::Duration;

use thiserror::Error;

use crate::core::classifier::RetryClassifier;

/// Invalid retry policy settings. Always a configuration bug, never a runtime
/// condition.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("max_attempts must be > 0")]
    ZeroAttempts,
    #[error("backoff schedule must be non-empty")]
    EmptyBackoff,
    #[error("invalid retryable pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Transient failure signatures of the provisioning tool, as `(pattern, reason)`.
///
/// Used whenever configuration does not supply its own table.
pub fn default_retryable_errors() -> Vec<(&'static str, &'static str)> {
    vec![
        ("read: connection reset by peer", "connection reset"),
        ("transport is closing", "provider transport closed"),
        ("unable to verify signature", "plugin download interrupted"),
        ("unable to verify checksum", "plugin download interrupted"),
        ("no provider exists with the given name", "provider registry unreachable"),
        ("registry service is unreachable", "provider registry unreachable"),
        ("Error installing provider", "provider registry unreachable"),
        ("Failed to query available provider packages", "provider registry unreachable"),
        ("could not query provider registry for", "provider registry unreachable"),
        ("timeout while waiting for plugin to start", "plugin handshake timeout"),
        ("timed out waiting for server handshake", "plugin handshake timeout"),
        ("Client\\.Timeout exceeded while awaiting headers", "client timeout"),
        ("TLS handshake timeout", "client timeout"),
        ("Provider produced inconsistent result after apply", "eventual consistency"),
        ("Error acquiring the state lock", "state lock contention"),
        ("(?i)lock held", "state lock contention"),
        ("ConditionalCheckFailedException", "state lock contention"),
        ("(?i)rate exceeded|Throttling", "rate limited"),
    ]
}

/// Process-wide retry configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_schedule: Vec<Duration>,
    classifier: RetryClassifier,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff_schedule: Vec<Duration>,
        classifier: RetryClassifier,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if backoff_schedule.is_empty() {
            return Err(PolicyError::EmptyBackoff);
        }
        Ok(Self {
            max_attempts,
            backoff_schedule,
            classifier,
        })
    }

    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff_schedule: vec![Duration::ZERO],
            classifier: RetryClassifier::default(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn classifier(&self) -> &RetryClassifier {
        &self.classifier
    }

    /// Wait before the `retry`-th retry (1-based).
    ///
    /// The schedule is clamped: retries past its end reuse the last entry.
    pub fn backoff_for_retry(&self, retry: u32) -> Duration {
        let index = (retry.max(1) - 1) as usize;
        self.backoff_schedule
            .get(index)
            .or_else(|| self.backoff_schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = RetryPolicy::new(0, secs(&[1]), RetryClassifier::default()).unwrap_err();
        assert!(matches!(err, PolicyError::ZeroAttempts));
    }

    #[test]
    fn rejects_empty_schedule() {
        let err = RetryPolicy::new(3, Vec::new(), RetryClassifier::default()).unwrap_err();
        assert!(matches!(err, PolicyError::EmptyBackoff));
    }

    #[test]
    fn backoff_follows_schedule_then_clamps() {
        let policy = RetryPolicy::new(6, secs(&[1, 2, 5]), RetryClassifier::default())
            .expect("policy");
        assert_eq!(policy.backoff_for_retry(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for_retry(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_for_retry(3), Duration::from_secs(5));
        assert_eq!(policy.backoff_for_retry(4), Duration::from_secs(5));
        assert_eq!(policy.backoff_for_retry(40), Duration::from_secs(5));
    }

    #[test]
    fn default_table_compiles() {
        let classifier = RetryClassifier::new(default_retryable_errors()).expect("compile");
        assert_eq!(
            classifier.patterns().len(),
            default_retryable_errors().len()
        );
    }
}
