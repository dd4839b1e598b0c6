//! Retry-aware execution of a single lifecycle command.
//!
//! [`CommandExecutor`] runs one command through a [`Tool`], classifies failed
//! attempts with the policy's [`RetryClassifier`](crate::core::classifier::RetryClassifier)
//! and retries transient ones after the scheduled backoff. Waiting goes through
//! [`Sleeper`] so retry timing can be observed in tests.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::Deadline;
use crate::core::policy::RetryPolicy;
use crate::core::types::{ExecutionAttempt, ToolCommand};
use crate::io::tool::Tool;

/// Terminal failure of a command after the retry policy was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The last attempt failed and was either not retryable or retries ran out.
    #[error("{command} failed in {} after {attempts_made} attempt(s)", .target_directory.display())]
    Failed {
        command: ToolCommand,
        target_directory: PathBuf,
        attempts_made: u32,
        last_output: String,
    },
    /// The run deadline expired before the command could finish.
    #[error("{command} cancelled in {} after {attempts_made} attempt(s)", .target_directory.display())]
    Cancelled {
        command: ToolCommand,
        target_directory: PathBuf,
        attempts_made: u32,
        partial_output: String,
    },
    /// The tool could not be started at all. Never retried.
    #[error("could not invoke {command} in {}: {message}", .target_directory.display())]
    Invocation {
        command: ToolCommand,
        target_directory: PathBuf,
        attempts_made: u32,
        message: String,
    },
}

impl ExecutionError {
    pub fn command(&self) -> ToolCommand {
        match self {
            ExecutionError::Failed { command, .. }
            | ExecutionError::Cancelled { command, .. }
            | ExecutionError::Invocation { command, .. } => *command,
        }
    }

    pub fn attempts_made(&self) -> u32 {
        match self {
            ExecutionError::Failed { attempts_made, .. }
            | ExecutionError::Cancelled { attempts_made, .. }
            | ExecutionError::Invocation { attempts_made, .. } => *attempts_made,
        }
    }

    /// Output of the terminal attempt, or the invocation error message.
    pub fn output(&self) -> &str {
        match self {
            ExecutionError::Failed { last_output, .. } => last_output,
            ExecutionError::Cancelled { partial_output, .. } => partial_output,
            ExecutionError::Invocation { message, .. } => message,
        }
    }
}

/// Blocking wait between retries.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Executes lifecycle commands under a fixed retry policy.
///
/// Holds no mutable state, so one executor can serve concurrent cases as long
/// as the tool and sleeper are shareable.
pub struct CommandExecutor<'a, T, S> {
    tool: &'a T,
    policy: &'a RetryPolicy,
    sleeper: &'a S,
    deadline: Deadline,
}

impl<'a, T: Tool, S: Sleeper> CommandExecutor<'a, T, S> {
    pub fn new(tool: &'a T, policy: &'a RetryPolicy, sleeper: &'a S) -> Self {
        Self {
            tool,
            policy,
            sleeper,
            deadline: Deadline::none(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `command` against `target_directory`, retrying transient failures.
    ///
    /// Returns the successful attempt, or the terminal failure. The number of
    /// attempts never exceeds the policy's `max_attempts`.
    #[instrument(skip_all, fields(command = %command, dir = %target_directory.display()))]
    pub fn execute(
        &self,
        command: ToolCommand,
        target_directory: &Path,
    ) -> Result<ExecutionAttempt, ExecutionError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt_number = 1;
        let mut last_output = String::new();

        loop {
            if self.deadline.is_expired() {
                warn!(attempt_number, "deadline expired before attempt");
                return Err(ExecutionError::Cancelled {
                    command,
                    target_directory: target_directory.to_path_buf(),
                    attempts_made: attempt_number - 1,
                    partial_output: last_output,
                });
            }

            debug!(attempt_number, max_attempts, "starting attempt");
            let output = self
                .tool
                .run(command, target_directory, self.deadline)
                .map_err(|err| ExecutionError::Invocation {
                    command,
                    target_directory: target_directory.to_path_buf(),
                    attempts_made: attempt_number,
                    message: format!("{err:#}"),
                })?;
            let timed_out = output.timed_out;
            let attempt = ExecutionAttempt {
                command,
                attempt_number,
                captured_output: output.output,
                status: output.status,
            };

            if attempt.status.success {
                debug!(attempt_number, "attempt succeeded");
                return Ok(attempt);
            }

            if timed_out && self.deadline.is_expired() {
                warn!(attempt_number, "deadline expired during attempt");
                return Err(ExecutionError::Cancelled {
                    command,
                    target_directory: target_directory.to_path_buf(),
                    attempts_made: attempt_number,
                    partial_output: attempt.captured_output,
                });
            }

            let reason = self
                .policy
                .classifier()
                .matching_reason(&attempt.captured_output);
            let Some(reason) = reason else {
                info!(attempt_number, exit_code = ?attempt.status.code, "non-retryable failure");
                return Err(self.failed(command, target_directory, attempt));
            };
            if attempt_number >= max_attempts {
                warn!(attempt_number, reason, "retries exhausted");
                return Err(self.failed(command, target_directory, attempt));
            }

            let delay = self.policy.backoff_for_retry(attempt_number);
            if !self.deadline.allows(delay) {
                warn!(attempt_number, ?delay, "backoff would pass the deadline");
                return Err(ExecutionError::Cancelled {
                    command,
                    target_directory: target_directory.to_path_buf(),
                    attempts_made: attempt_number,
                    partial_output: attempt.captured_output,
                });
            }

            warn!(
                attempt_number,
                reason,
                delay_ms = delay.as_millis() as u64,
                "retryable failure, backing off"
            );
            self.sleeper.sleep(delay);
            last_output = attempt.captured_output;
            attempt_number += 1;
        }
    }

    fn failed(
        &self,
        command: ToolCommand,
        target_directory: &Path,
        attempt: ExecutionAttempt,
    ) -> ExecutionError {
        ExecutionError::Failed {
            command,
            target_directory: target_directory.to_path_buf(),
            attempts_made: attempt.attempt_number,
            last_output: attempt.captured_output,
        }
    }
}
