use engine::core::assertion::{AssertionReport, assert_identifiers};
use engine::core::output::output_tail;
use engine::core::types::{
    LifecycleMode, LifecycleResult, LifecycleStatus, StepFailure, StepSummary, TestCase,
    ToolCommand,
};
use serde::Serialize;

/// Final classification of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    Failed { reason: FailureReason },
    /// `during` is `None` when the deadline expired before the case started.
    Cancelled { during: Option<ToolCommand> },
}

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    InitializationFailed {
        attempts_made: u32,
        output_tail: String,
    },
    PlanFailed {
        attempts_made: u32,
        output_tail: String,
    },
    ValidateFailed {
        attempts_made: u32,
        output_tail: String,
    },
    AssertionMismatch {
        missing: Vec<String>,
    },
}

/// Everything the report needs about a finished case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseVerdict {
    #[serde(flatten)]
    pub outcome: CaseOutcome,
    pub steps: Vec<StepSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertions: Option<AssertionReport>,
}

impl CaseVerdict {
    pub fn not_started() -> Self {
        Self {
            outcome: CaseOutcome::Cancelled { during: None },
            steps: Vec::new(),
            assertions: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == CaseOutcome::Passed
    }
}

/// Classify a lifecycle result, running identifier assertions for successful plans.
pub fn evaluate(case: &TestCase, result: LifecycleResult, tail_lines: usize) -> CaseVerdict {
    let LifecycleResult {
        status,
        plan_text,
        failure,
        steps,
    } = result;

    let failed = |failure: Option<StepFailure>| -> (u32, String) {
        failure
            .map(|failure| (failure.attempts_made, output_tail(&failure.output, tail_lines)))
            .unwrap_or_default()
    };

    let (outcome, assertions) = match status {
        LifecycleStatus::Success => match case.lifecycle_mode {
            LifecycleMode::Plan => {
                let report =
                    assert_identifiers(plan_text.as_deref().unwrap_or(""), &case.expected_identifiers);
                let outcome = if report.passed() {
                    CaseOutcome::Passed
                } else {
                    CaseOutcome::Failed {
                        reason: FailureReason::AssertionMismatch {
                            missing: report.missing(),
                        },
                    }
                };
                (outcome, Some(report))
            }
            LifecycleMode::Validate => (CaseOutcome::Passed, None),
        },
        LifecycleStatus::InitializationFailed => {
            let (attempts_made, output_tail) = failed(failure);
            let reason = FailureReason::InitializationFailed {
                attempts_made,
                output_tail,
            };
            (CaseOutcome::Failed { reason }, None)
        }
        LifecycleStatus::PlanFailed => {
            let (attempts_made, output_tail) = failed(failure);
            let reason = FailureReason::PlanFailed {
                attempts_made,
                output_tail,
            };
            (CaseOutcome::Failed { reason }, None)
        }
        LifecycleStatus::ValidateFailed => {
            let (attempts_made, output_tail) = failed(failure);
            let reason = FailureReason::ValidateFailed {
                attempts_made,
                output_tail,
            };
            (CaseOutcome::Failed { reason }, None)
        }
        LifecycleStatus::Cancelled => {
            let during = failure.map(|failure| failure.command);
            (CaseOutcome::Cancelled { during }, None)
        }
    };

    CaseVerdict {
        outcome,
        steps,
        assertions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::test_support::{plan_case, validate_case};

    fn step(command: ToolCommand, attempts_made: u32, success: bool) -> StepSummary {
        StepSummary {
            command,
            attempts_made,
            success,
        }
    }

    fn plan_success(plan_text: &str) -> LifecycleResult {
        LifecycleResult {
            status: LifecycleStatus::Success,
            plan_text: Some(plan_text.to_string()),
            failure: None,
            steps: vec![
                step(ToolCommand::Init, 1, true),
                step(ToolCommand::Plan, 1, true),
            ],
        }
    }

    #[test]
    fn passes_when_all_identifiers_present() {
        let case = plan_case("dev", "env/dev", &["module.networking", "module.compute"]);
        let verdict = evaluate(
            &case,
            plan_success("# module.networking.aws_vpc.main\n# module.compute.aws_instance.app\n"),
            20,
        );
        assert_eq!(verdict.outcome, CaseOutcome::Passed);
        assert!(verdict.assertions.expect("assertions").passed());
    }

    #[test]
    fn fails_with_missing_identifiers() {
        let case = plan_case("dev", "env/dev", &["module.networking", "module.compute"]);
        let verdict = evaluate(&case, plan_success("# module.networking.aws_vpc.main\n"), 20);
        assert_eq!(
            verdict.outcome,
            CaseOutcome::Failed {
                reason: FailureReason::AssertionMismatch {
                    missing: vec!["module.compute".to_string()],
                },
            }
        );
    }

    #[test]
    fn step_failure_keeps_attempts_and_tail() {
        let case = plan_case("bootstrap", "bootstrap", &["aws_s3_bucket.terraform_state"]);
        let result = LifecycleResult {
            status: LifecycleStatus::InitializationFailed,
            plan_text: None,
            failure: Some(StepFailure {
                command: ToolCommand::Init,
                attempts_made: 4,
                output: "line 1\nline 2\nError: lock held".to_string(),
            }),
            steps: vec![step(ToolCommand::Init, 4, false)],
        };
        let verdict = evaluate(&case, result, 2);
        assert_eq!(
            verdict.outcome,
            CaseOutcome::Failed {
                reason: FailureReason::InitializationFailed {
                    attempts_made: 4,
                    output_tail: "line 2\nError: lock held".to_string(),
                },
            }
        );
        assert!(verdict.assertions.is_none());
    }

    #[test]
    fn validate_success_passes_without_assertions() {
        let case = validate_case("state", "modules/state");
        let result = LifecycleResult {
            status: LifecycleStatus::Success,
            plan_text: None,
            failure: None,
            steps: vec![
                step(ToolCommand::Init, 1, true),
                step(ToolCommand::Validate, 1, true),
            ],
        };
        let verdict = evaluate(&case, result, 20);
        assert!(verdict.passed());
        assert!(verdict.assertions.is_none());
    }

    #[test]
    fn cancellation_records_interrupted_step() {
        let case = validate_case("state", "modules/state");
        let result = LifecycleResult {
            status: LifecycleStatus::Cancelled,
            plan_text: None,
            failure: Some(StepFailure {
                command: ToolCommand::Validate,
                attempts_made: 1,
                output: String::new(),
            }),
            steps: vec![
                step(ToolCommand::Init, 1, true),
                step(ToolCommand::Validate, 1, false),
            ],
        };
        let verdict = evaluate(&case, result, 20);
        assert_eq!(
            verdict.outcome,
            CaseOutcome::Cancelled {
                during: Some(ToolCommand::Validate)
            }
        );
        assert_eq!(verdict.steps.len(), 2);
    }
}
