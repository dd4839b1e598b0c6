//! Shared deterministic types for the execution engine.
//!
//! These types define stable contracts between the executor, the lifecycle
//! driver and the suite. They do not depend on external state or I/O.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which step ends a case's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleMode {
    /// `init` then `plan`; the plan text is checked against expected identifiers.
    Plan,
    /// `init` then `validate`; only the exit status matters.
    Validate,
}

impl LifecycleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleMode::Plan => "plan",
            LifecycleMode::Validate => "validate",
        }
    }
}

/// A single lifecycle command issued to the provisioning tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCommand {
    Init,
    Plan,
    Validate,
}

impl ToolCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCommand::Init => "init",
            ToolCommand::Plan => "plan",
            ToolCommand::Validate => "validate",
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation target.
///
/// `target_directory` is opaque to the engine: it is handed to the tool as a
/// working directory and never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: String,
    pub target_directory: PathBuf,
    pub lifecycle_mode: LifecycleMode,
    /// Substrings that must all appear in the plan output. Empty for
    /// [`LifecycleMode::Validate`].
    pub expected_identifiers: Vec<String>,
}

/// Exit status of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptStatus {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl AttemptStatus {
    pub fn success() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn failure(code: Option<i32>) -> Self {
        Self {
            success: false,
            code,
        }
    }
}

/// One invocation of one lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionAttempt {
    pub command: ToolCommand,
    /// Starts at 1.
    pub attempt_number: u32,
    /// Normalized stdout+stderr in arrival order.
    pub captured_output: String,
    pub status: AttemptStatus,
}

/// Terminal status of a case's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Success,
    InitializationFailed,
    PlanFailed,
    ValidateFailed,
    /// The run deadline expired while this case was in flight.
    Cancelled,
}

/// Attempts spent on one lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub command: ToolCommand,
    pub attempts_made: u32,
    pub success: bool,
}

/// Details of the step that ended a lifecycle early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub command: ToolCommand,
    pub attempts_made: u32,
    /// Output of the terminal attempt, or the invocation error message when the
    /// tool could not be started.
    pub output: String,
}

/// Result of driving one case through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleResult {
    pub status: LifecycleStatus,
    /// Captured plan output; present only when the plan step succeeded.
    pub plan_text: Option<String>,
    pub failure: Option<StepFailure>,
    /// Steps in execution order, including the failing one.
    pub steps: Vec<StepSummary>,
}
