//! Provisioning tool abstraction.
//!
//! The [`Tool`] trait is the single seam between the retry/lifecycle logic and
//! real process execution. Tests use scripted tools that return predetermined
//! outputs without spawning processes.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::budget::Deadline;
use crate::core::output::normalize_output;
use crate::core::types::{AttemptStatus, ToolCommand};
use crate::io::config::ToolConfig;
use crate::io::process::run_command_merged;

/// Output of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Normalized, merged stdout+stderr.
    pub output: String,
    pub status: AttemptStatus,
    /// The process was killed by the command timeout or the run deadline.
    pub timed_out: bool,
}

/// Abstraction over the external provisioning tool.
pub trait Tool {
    /// Run `command` with `target_directory` as the working directory.
    ///
    /// Implementations must not outlive `deadline`. An `Err` means the tool
    /// could not be invoked at all; a failing exit status is an `Ok`.
    fn run(
        &self,
        command: ToolCommand,
        target_directory: &Path,
        deadline: Deadline,
    ) -> Result<ToolOutput>;
}

/// Tool that spawns the `terraform` CLI (or a compatible binary).
#[derive(Debug, Clone)]
pub struct TerraformTool {
    config: ToolConfig,
}

impl TerraformTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    /// Arguments for `command`, excluding the binary.
    pub fn command_args(&self, command: ToolCommand) -> Vec<String> {
        let mut args = vec![command.as_str().to_string()];
        match command {
            ToolCommand::Init => {
                args.push("-input=false".to_string());
            }
            ToolCommand::Plan => {
                args.push("-input=false".to_string());
                args.push(format!("-lock={}", self.config.plan_lock));
            }
            ToolCommand::Validate => {}
        }
        if self.config.no_color {
            args.push("-no-color".to_string());
        }
        args.extend(self.config.args.iter().cloned());
        args
    }
}

impl Tool for TerraformTool {
    #[instrument(skip_all, fields(command = %command, dir = %target_directory.display()))]
    fn run(
        &self,
        command: ToolCommand,
        target_directory: &Path,
        deadline: Deadline,
    ) -> Result<ToolOutput> {
        let args = self.command_args(command);
        debug!(binary = %self.config.binary, ?args, "invoking tool");

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&args).current_dir(target_directory);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let timeout = deadline.clamp(self.config.command_timeout());
        let captured = run_command_merged(cmd, timeout, self.config.output_limit_bytes)
            .with_context(|| format!("run {} {}", self.config.binary, command))?;

        let mut output = normalize_output(&captured.output);
        output.push_str(&captured.truncated_notice(command.as_str()));
        if captured.timed_out {
            warn!(timeout_secs = timeout.as_secs(), "tool command timed out");
            output.push_str(&format!(
                "\n[{command} timed out after {}s]\n",
                timeout.as_secs()
            ));
        }

        let status = if captured.status.success() && !captured.timed_out {
            AttemptStatus::success()
        } else {
            AttemptStatus::failure(captured.status.code())
        };
        Ok(ToolOutput {
            output,
            status,
            timed_out: captured.timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_disables_input_and_color() {
        let tool = TerraformTool::new(ToolConfig::default());
        assert_eq!(
            tool.command_args(ToolCommand::Init),
            vec!["init", "-input=false", "-no-color"]
        );
    }

    #[test]
    fn plan_carries_lock_flag() {
        let config = ToolConfig {
            plan_lock: true,
            ..ToolConfig::default()
        };
        let tool = TerraformTool::new(config);
        assert_eq!(
            tool.command_args(ToolCommand::Plan),
            vec!["plan", "-input=false", "-lock=true", "-no-color"]
        );
    }

    #[test]
    fn validate_appends_extra_args() {
        let config = ToolConfig {
            no_color: false,
            args: vec!["-json".to_string()],
            ..ToolConfig::default()
        };
        let tool = TerraformTool::new(config);
        assert_eq!(
            tool.command_args(ToolCommand::Validate),
            vec!["validate", "-json"]
        );
    }
}
