//! Infrastructure validation suite.
//!
//! Drives every registered module directory through `init` and `plan` or
//! `validate`, retrying transient failures, and checks plan output for the
//! expected resource and module identifiers.

mod cli;
mod config;
mod exit_codes;
mod outcome;
mod registry;
mod report;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::{Inputs, RunArgs};
use crate::config::RunOverrides;

#[derive(Parser)]
#[command(
    name = "suite",
    version,
    about = "Retrying init/plan/validate suite for infrastructure modules"
)]
struct Cli {
    /// Harness configuration; defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "harness.toml")]
    config: PathBuf,
    /// Case registry.
    #[arg(long, global = true, default_value = "cases/infrastructure.toml")]
    cases: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print registered cases.
    List,
    /// Validate config and registry without invoking the tool.
    Check,
    /// Run cases and report results.
    Run {
        /// Only run cases whose id contains this substring.
        #[arg(long)]
        filter: Option<String>,
        /// Cases run concurrently.
        #[arg(long)]
        jobs: Option<usize>,
        /// Whole-run deadline in seconds (`0` disables it).
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Attempts per lifecycle step, including the first.
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Provisioning tool binary.
        #[arg(long)]
        tool: Option<String>,
        /// Also write a JSON report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() {
    engine::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let inputs = Inputs {
        config: cli.config,
        cases: cli.cases,
    };
    match cli.command {
        Command::List => cli::list_cases(&inputs),
        Command::Check => cli::check(&inputs),
        Command::Run {
            filter,
            jobs,
            deadline_secs,
            max_attempts,
            tool,
            report,
        } => {
            let args = RunArgs {
                filter,
                overrides: RunOverrides {
                    jobs,
                    deadline_secs,
                    max_attempts,
                    tool_binary: tool,
                },
                report,
            };
            cli::run(&inputs, &args)
        }
    }
}
