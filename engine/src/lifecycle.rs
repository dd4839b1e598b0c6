//! Fixed lifecycle for one case: `init`, then `plan` or `validate`.

use tracing::{debug, info, instrument};

use crate::core::types::{
    LifecycleMode, LifecycleResult, LifecycleStatus, StepFailure, StepSummary, TestCase,
    ToolCommand,
};
use crate::executor::{CommandExecutor, ExecutionError, Sleeper};
use crate::io::tool::Tool;

/// Sequences lifecycle steps for a case using a shared [`CommandExecutor`].
pub struct LifecycleDriver<'a, T, S> {
    executor: CommandExecutor<'a, T, S>,
}

impl<'a, T: Tool, S: Sleeper> LifecycleDriver<'a, T, S> {
    pub fn new(executor: CommandExecutor<'a, T, S>) -> Self {
        Self { executor }
    }

    /// Drive `case` through its lifecycle.
    ///
    /// Steps run strictly in order against the case's target directory. A
    /// failed `init` ends the case before `plan`/`validate` is attempted.
    #[instrument(skip_all, fields(case_id = %case.id, mode = ?case.lifecycle_mode))]
    pub fn run(&self, case: &TestCase) -> LifecycleResult {
        let mut steps = Vec::with_capacity(2);

        if let Err(err) = self.step(ToolCommand::Init, case, &mut steps) {
            return terminated(LifecycleStatus::InitializationFailed, err, steps);
        }

        match case.lifecycle_mode {
            LifecycleMode::Plan => match self.step(ToolCommand::Plan, case, &mut steps) {
                Ok(plan_text) => {
                    debug!(plan_bytes = plan_text.len(), "plan captured");
                    LifecycleResult {
                        status: LifecycleStatus::Success,
                        plan_text: Some(plan_text),
                        failure: None,
                        steps,
                    }
                }
                Err(err) => terminated(LifecycleStatus::PlanFailed, err, steps),
            },
            LifecycleMode::Validate => match self.step(ToolCommand::Validate, case, &mut steps) {
                Ok(_) => LifecycleResult {
                    status: LifecycleStatus::Success,
                    plan_text: None,
                    failure: None,
                    steps,
                },
                Err(err) => terminated(LifecycleStatus::ValidateFailed, err, steps),
            },
        }
    }

    fn step(
        &self,
        command: ToolCommand,
        case: &TestCase,
        steps: &mut Vec<StepSummary>,
    ) -> Result<String, ExecutionError> {
        match self.executor.execute(command, &case.target_directory) {
            Ok(attempt) => {
                steps.push(StepSummary {
                    command,
                    attempts_made: attempt.attempt_number,
                    success: true,
                });
                Ok(attempt.captured_output)
            }
            Err(err) => {
                info!(%command, error = %err, "lifecycle step failed");
                steps.push(StepSummary {
                    command,
                    attempts_made: err.attempts_made(),
                    success: false,
                });
                Err(err)
            }
        }
    }
}

/// Build the result for a lifecycle that stopped at a failing step.
///
/// Cancellation overrides the step-specific status.
fn terminated(
    status: LifecycleStatus,
    err: ExecutionError,
    steps: Vec<StepSummary>,
) -> LifecycleResult {
    let status = match &err {
        ExecutionError::Cancelled { .. } => LifecycleStatus::Cancelled,
        _ => status,
    };
    LifecycleResult {
        status,
        plan_text: None,
        failure: Some(StepFailure {
            command: err.command(),
            attempts_made: err.attempts_made(),
            output: err.output().to_string(),
        }),
        steps,
    }
}
