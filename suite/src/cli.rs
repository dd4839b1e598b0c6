//! CLI command implementations.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use engine::core::budget::Deadline;
use engine::executor::ThreadSleeper;
use engine::io::config::{HarnessConfig, load_config};
use engine::io::tool::TerraformTool;
use tracing::{debug, info};

use crate::config::{RunOverrides, apply_overrides};
use crate::exit_codes;
use crate::registry::{filter_cases, load_registry};
use crate::report::{SuiteReport, render_text, write_report};
use crate::run::{RunOptions, run_cases};

/// Paths shared by every command.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub config: PathBuf,
    pub cases: PathBuf,
}

/// Arguments of `suite run`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub filter: Option<String>,
    pub overrides: RunOverrides,
    pub report: Option<PathBuf>,
}

/// Print every registered case, one per line.
pub fn list_cases(inputs: &Inputs) -> Result<i32> {
    let cases = load_registry(&inputs.cases)?;
    for case in cases {
        println!(
            "{}\t{}\t{}",
            case.id,
            case.lifecycle_mode.as_str(),
            case.target_directory.display()
        );
    }
    Ok(exit_codes::OK)
}

/// Validate config and registry without running anything.
pub fn check(inputs: &Inputs) -> Result<i32> {
    let config = load_config(&inputs.config).context("load harness config")?;
    let cases = load_registry(&inputs.cases)?;
    let missing: Vec<_> = cases
        .iter()
        .filter(|case| !case.target_directory.is_dir())
        .collect();
    for case in &missing {
        eprintln!(
            "warning: case {} directory {} does not exist",
            case.id,
            case.target_directory.display()
        );
    }
    println!(
        "check: cases={} tool={} max_attempts={} jobs={}",
        cases.len(),
        config.tool.binary,
        config.retry.max_attempts,
        config.run.jobs
    );
    let policy = config.retry.to_policy()?;
    for pattern in policy.classifier().patterns() {
        println!("check: retryable {:?} reason={:?}", pattern.pattern(), pattern.reason());
    }
    Ok(exit_codes::OK)
}

/// Run selected cases and report results; returns the suite exit code.
pub fn run(inputs: &Inputs, args: &RunArgs) -> Result<i32> {
    let config = load_config(&inputs.config).context("load harness config")?;
    let config = apply_overrides(config, &args.overrides).context("apply run overrides")?;
    let cases = load_registry(&inputs.cases)?;
    let cases = filter_cases(cases, args.filter.as_deref())?;
    debug!(cases = cases.len(), "registry loaded");

    let policy = config.retry.to_policy()?;
    let options = run_options(&config);
    let tool = TerraformTool::new(config.tool.clone());

    info!(cases = cases.len(), jobs = options.jobs, "starting suite");
    let started_at = Utc::now();
    let runs = run_cases(&cases, &tool, &policy, &ThreadSleeper, &options);
    let report = SuiteReport::new(started_at, Utc::now(), runs);

    print!("{}", render_text(&report));
    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!(path = %path.display(), "report written");
    }
    Ok(report.exit_code())
}

fn run_options(config: &HarnessConfig) -> RunOptions {
    let deadline = match config.run.deadline_secs {
        0 => Deadline::none(),
        secs => Deadline::after(Duration::from_secs(secs)),
    };
    RunOptions {
        jobs: config.run.jobs,
        deadline,
        output_tail_lines: config.run.output_tail_lines,
    }
}
