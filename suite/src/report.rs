use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engine::core::types::LifecycleMode;
use serde::Serialize;

use crate::exit_codes;
use crate::outcome::{CaseOutcome, CaseVerdict, FailureReason};
use crate::run::CaseRun;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub id: String,
    pub target_directory: String,
    pub mode: LifecycleMode,
    pub duration_secs: f64,
    #[serde(flatten)]
    pub verdict: CaseVerdict,
}

/// Machine-readable record of one suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn new(started_at: DateTime<Utc>, finished_at: DateTime<Utc>, runs: Vec<CaseRun>) -> Self {
        let mut summary = ReportSummary {
            total: runs.len(),
            ..ReportSummary::default()
        };
        let cases = runs
            .into_iter()
            .map(|run| {
                match run.verdict.outcome {
                    CaseOutcome::Passed => summary.passed += 1,
                    CaseOutcome::Failed { .. } => summary.failed += 1,
                    CaseOutcome::Cancelled { .. } => summary.cancelled += 1,
                }
                CaseReport {
                    id: run.case.id,
                    target_directory: run.case.target_directory.display().to_string(),
                    mode: run.case.lifecycle_mode,
                    duration_secs: run.duration.as_secs_f64(),
                    verdict: run.verdict,
                }
            })
            .collect();
        Self {
            started_at,
            finished_at,
            summary,
            cases,
        }
    }

    /// Failures outrank cancellations.
    pub fn exit_code(&self) -> i32 {
        if self.summary.failed > 0 {
            exit_codes::FAILED
        } else if self.summary.cancelled > 0 {
            exit_codes::CANCELLED
        } else {
            exit_codes::OK
        }
    }
}

/// Human-readable rendering, one block per case plus a summary line.
pub fn render_text(report: &SuiteReport) -> String {
    let mut out = String::new();
    for case in &report.cases {
        let steps = case
            .verdict
            .steps
            .iter()
            .map(|step| format!("{}x{}", step.command, step.attempts_made))
            .collect::<Vec<_>>()
            .join(",");
        let _ = write!(
            out,
            "case: id={} mode={} dir={} duration_secs={:.2}",
            case.id,
            case.mode.as_str(),
            case.target_directory,
            case.duration_secs
        );
        if !steps.is_empty() {
            let _ = write!(out, " steps={steps}");
        }
        match &case.verdict.outcome {
            CaseOutcome::Passed => {
                let _ = writeln!(out, " result=pass");
            }
            CaseOutcome::Cancelled { during } => {
                let at = during.map_or("not_started", |command| command.as_str());
                let _ = writeln!(out, " result=cancelled at={at}");
            }
            CaseOutcome::Failed { reason } => {
                let _ = writeln!(out, " result=fail");
                render_failure(&mut out, reason);
            }
        }
    }
    let summary = &report.summary;
    let _ = writeln!(
        out,
        "summary: total={} passed={} failed={} cancelled={}",
        summary.total, summary.passed, summary.failed, summary.cancelled
    );
    out
}

fn render_failure(out: &mut String, reason: &FailureReason) {
    let (step, attempts_made, output_tail) = match reason {
        FailureReason::AssertionMismatch { missing } => {
            for identifier in missing {
                let _ = writeln!(out, "  missing: {identifier}");
            }
            return;
        }
        FailureReason::InitializationFailed {
            attempts_made,
            output_tail,
        } => ("init", attempts_made, output_tail),
        FailureReason::PlanFailed {
            attempts_made,
            output_tail,
        } => ("plan", attempts_made, output_tail),
        FailureReason::ValidateFailed {
            attempts_made,
            output_tail,
        } => ("validate", attempts_made, output_tail),
    };
    let _ = writeln!(out, "  {step} failed after {attempts_made} attempt(s)");
    for line in output_tail.lines() {
        let _ = writeln!(out, "  | {line}");
    }
}

/// Write the report as pretty JSON, creating parent directories.
pub fn write_report(path: &Path, report: &SuiteReport) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use engine::core::assertion::assert_identifiers;
    use engine::core::types::{StepSummary, ToolCommand};
    use engine::test_support::{plan_case, validate_case};

    fn run(case: engine::core::types::TestCase, outcome: CaseOutcome) -> CaseRun {
        CaseRun {
            case,
            verdict: CaseVerdict {
                outcome,
                steps: vec![StepSummary {
                    command: ToolCommand::Init,
                    attempts_made: 2,
                    success: true,
                }],
                assertions: None,
            },
            duration: Duration::from_millis(1500),
        }
    }

    fn sample_report() -> SuiteReport {
        let now = Utc::now();
        SuiteReport::new(
            now,
            now,
            vec![
                run(validate_case("state", "modules/state"), CaseOutcome::Passed),
                run(
                    plan_case("dev", "environments/dev", &["module.compute"]),
                    CaseOutcome::Failed {
                        reason: FailureReason::AssertionMismatch {
                            missing: vec!["module.compute".to_string()],
                        },
                    },
                ),
                run(
                    validate_case("compute", "modules/compute"),
                    CaseOutcome::Failed {
                        reason: FailureReason::ValidateFailed {
                            attempts_made: 1,
                            output_tail: "Error: Unsupported argument\n  on main.tf line 3".to_string(),
                        },
                    },
                ),
                run(
                    validate_case("networking", "modules/networking"),
                    CaseOutcome::Cancelled { during: None },
                ),
            ],
        )
    }

    #[test]
    fn summary_counts_and_exit_code() {
        let report = sample_report();
        assert_eq!(
            report.summary,
            ReportSummary {
                total: 4,
                passed: 1,
                failed: 2,
                cancelled: 1,
            }
        );
        assert_eq!(report.exit_code(), exit_codes::FAILED);
    }

    #[test]
    fn cancelled_only_exit_code() {
        let now = Utc::now();
        let report = SuiteReport::new(
            now,
            now,
            vec![
                run(validate_case("state", "modules/state"), CaseOutcome::Passed),
                run(
                    validate_case("compute", "modules/compute"),
                    CaseOutcome::Cancelled {
                        during: Some(ToolCommand::Validate),
                    },
                ),
            ],
        );
        assert_eq!(report.exit_code(), exit_codes::CANCELLED);

        let passing = SuiteReport::new(
            now,
            now,
            vec![run(validate_case("state", "modules/state"), CaseOutcome::Passed)],
        );
        assert_eq!(passing.exit_code(), exit_codes::OK);
    }

    #[test]
    fn text_names_missing_identifiers_and_output_tail() {
        let text = render_text(&sample_report());
        assert!(text.contains("case: id=state mode=validate dir=modules/state"));
        assert!(text.contains("steps=initx2 result=pass"));
        assert!(text.contains("  missing: module.compute\n"));
        assert!(text.contains("  validate failed after 1 attempt(s)\n"));
        assert!(text.contains("  |   on main.tf line 3\n"));
        assert!(text.contains("result=cancelled at=not_started"));
        assert!(text.ends_with("summary: total=4 passed=1 failed=2 cancelled=1\n"));
    }

    #[test]
    fn json_report_round_trips_through_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("reports").join("suite.json");
        let mut report = sample_report();
        report.cases[0].verdict.assertions = Some(assert_identifiers("x", &["x"]));
        write_report(&path, &report).expect("write");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value["summary"]["failed"], 2);
        assert_eq!(value["cases"][0]["outcome"], "passed");
        assert_eq!(value["cases"][0]["mode"], "validate");
        assert_eq!(value["cases"][1]["outcome"], "failed");
        assert_eq!(value["cases"][1]["reason"]["kind"], "assertion_mismatch");
        assert_eq!(value["cases"][1]["reason"]["missing"][0], "module.compute");
        assert_eq!(value["cases"][3]["during"], serde_json::Value::Null);
        assert!(value["started_at"].is_string());
    }
}
