//! Harness configuration merging.
//!
//! Applies command-line overrides to the configuration loaded from `harness.toml`.

use anyhow::Result;
use engine::io::config::HarnessConfig;

/// Values given on the command line; `None` keeps the file's setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub jobs: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub tool_binary: Option<String>,
}

/// Apply overrides to the base config and re-validate the result.
pub fn apply_overrides(mut base: HarnessConfig, overrides: &RunOverrides) -> Result<HarnessConfig> {
    if let Some(jobs) = overrides.jobs {
        base.run.jobs = jobs;
    }
    if let Some(deadline_secs) = overrides.deadline_secs {
        base.run.deadline_secs = deadline_secs;
    }
    if let Some(max_attempts) = overrides.max_attempts {
        base.retry.max_attempts = max_attempts;
    }
    if let Some(binary) = &overrides.tool_binary {
        base.tool.binary = binary.clone();
    }
    base.validate()?;
    Ok(base)
}
