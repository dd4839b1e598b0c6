//! Harness configuration stored in `harness.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::RetryClassifier;
use crate::core::policy::{RetryPolicy, default_retryable_errors};

/// Harness configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults, so an
/// absent file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    pub tool: ToolConfig,
    pub retry: RetryConfig,
    pub run: RunConfig,
}

/// How the provisioning tool is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable name or path.
    pub binary: String,
    /// Extra arguments appended to every command.
    pub args: Vec<String>,
    /// Extra environment variables for every command.
    pub env: BTreeMap<String, String>,
    /// Pass `-no-color` so plan text is stable for substring assertions.
    pub no_color: bool,
    /// Value of `-lock` for `plan`.
    pub plan_lock: bool,
    /// Kill a single command after this many seconds.
    pub command_timeout_secs: u64,
    /// Keep at most this many bytes of merged output per attempt.
    pub output_limit_bytes: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("TF_IN_AUTOMATION".to_string(), "1".to_string());
        Self {
            binary: "terraform".to_string(),
            args: Vec::new(),
            env,
            no_color: true,
            plan_lock: false,
            command_timeout_secs: 30 * 60,
            output_limit_bytes: 10_000_000,
        }
    }
}

impl ToolConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Retry behavior for transient tool failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per command, including the first.
    pub max_attempts: u32,
    /// Seconds to wait before each retry; the last entry repeats.
    pub backoff_secs: Vec<u64>,
    /// `pattern = reason` table. Replaces the built-in table when non-empty.
    pub retryable_errors: BTreeMap<String, String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_secs: vec![5],
            retryable_errors: BTreeMap::new(),
        }
    }
}

impl RetryConfig {
    /// Compile this configuration into an immutable [`RetryPolicy`].
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let classifier = if self.retryable_errors.is_empty() {
            RetryClassifier::new(default_retryable_errors())
        } else {
            RetryClassifier::new(
                self.retryable_errors
                    .iter()
                    .map(|(pattern, reason)| (pattern.as_str(), reason.clone())),
            )
        }
        .context("compile retry.retryable_errors")?;
        let backoff = self
            .backoff_secs
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect();
        RetryPolicy::new(self.max_attempts, backoff, classifier).context("build retry policy")
    }
}

/// Suite scheduling defaults; command-line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads running cases concurrently.
    pub jobs: usize,
    /// Whole-run deadline in seconds. `0` disables it.
    pub deadline_secs: u64,
    /// Lines of captured output shown for a failed step.
    pub output_tail_lines: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            deadline_secs: 0,
            output_tail_lines: 20,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tool.binary.trim().is_empty() {
            return Err(anyhow!("tool.binary must be non-empty"));
        }
        if self.tool.command_timeout_secs == 0 {
            return Err(anyhow!("tool.command_timeout_secs must be > 0"));
        }
        if self.tool.output_limit_bytes == 0 {
            return Err(anyhow!("tool.output_limit_bytes must be > 0"));
        }
        if self.tool.env.keys().any(|key| key.trim().is_empty()) {
            return Err(anyhow!("tool.env keys must be non-empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        if self.retry.backoff_secs.is_empty() {
            return Err(anyhow!("retry.backoff_secs must be a non-empty array"));
        }
        if self.run.jobs == 0 {
            return Err(anyhow!("run.jobs must be > 0"));
        }
        self.retry.to_policy()?;
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("harness.toml");
        fs::write(
            &path,
            r#"
[tool]
binary = "tofu"

[retry]
max_attempts = 2
backoff_secs = [1, 3]
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.tool.binary, "tofu");
        assert!(cfg.tool.no_color);
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.run, RunConfig::default());

        let policy = cfg.retry.to_policy().expect("policy");
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.backoff_for_retry(5), Duration::from_secs(3));
    }

    #[test]
    fn custom_retryable_errors_replace_defaults() {
        let mut cfg = RetryConfig::default();
        cfg.retryable_errors
            .insert("quota".to_string(), "quota".to_string());
        let policy = cfg.to_policy().expect("policy");
        assert!(policy.classifier().is_retryable("quota exceeded"));
        assert!(!policy.classifier().is_retryable("Error: lock held"));
    }

    #[test]
    fn rejects_invalid_values() {
        let mut cfg = HarnessConfig::default();
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = HarnessConfig::default();
        cfg.retry.backoff_secs.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = HarnessConfig::default();
        cfg.tool.binary = " ".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = HarnessConfig::default();
        cfg.retry
            .retryable_errors
            .insert("[".to_string(), "broken".to_string());
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("retryable"));
    }
}
