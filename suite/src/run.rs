//! Suite execution: schedules cases across worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use engine::core::budget::Deadline;
use engine::core::policy::RetryPolicy;
use engine::core::types::TestCase;
use engine::executor::{CommandExecutor, Sleeper};
use engine::io::tool::Tool;
use engine::lifecycle::LifecycleDriver;
use tracing::{info, instrument, warn};

use crate::outcome::{CaseOutcome, CaseVerdict, evaluate};

/// Scheduling options for one suite run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Worker threads; clamped to `1..=cases.len()`.
    pub jobs: usize,
    /// Shared by every case; cases not started before it expires are cancelled.
    pub deadline: Deadline,
    pub output_tail_lines: usize,
}

/// One case's verdict plus wall-clock time spent on it.
#[derive(Debug, Clone)]
pub struct CaseRun {
    pub case: TestCase,
    pub verdict: CaseVerdict,
    pub duration: Duration,
}

/// Run every case and return results in input order.
///
/// Each case runs its lifecycle sequentially on one worker; workers pull the
/// next unstarted case from a shared index. Cases never share a target
/// directory concurrently unless the registry lists the same directory twice.
#[instrument(skip_all, fields(cases = cases.len(), jobs = options.jobs))]
pub fn run_cases<T, S>(
    cases: &[TestCase],
    tool: &T,
    policy: &RetryPolicy,
    sleeper: &S,
    options: &RunOptions,
) -> Vec<CaseRun>
where
    T: Tool + Sync,
    S: Sleeper + Sync,
{
    let workers = options.jobs.clamp(1, cases.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(case) = cases.get(index) else {
                        break;
                    };
                    let run = run_case(case, tool, policy, sleeper, options);
                    if tx.send((index, run)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut runs: Vec<(usize, CaseRun)> = rx.into_iter().collect();
    runs.sort_by_key(|(index, _)| *index);
    runs.into_iter().map(|(_, run)| run).collect()
}

fn run_case<T: Tool, S: Sleeper>(
    case: &TestCase,
    tool: &T,
    policy: &RetryPolicy,
    sleeper: &S,
    options: &RunOptions,
) -> CaseRun {
    let started = Instant::now();
    if options.deadline.is_expired() {
        warn!(case_id = %case.id, "deadline expired before case started");
        return CaseRun {
            case: case.clone(),
            verdict: CaseVerdict::not_started(),
            duration: Duration::ZERO,
        };
    }

    let executor = CommandExecutor::new(tool, policy, sleeper).with_deadline(options.deadline);
    let result = LifecycleDriver::new(executor).run(case);
    let verdict = evaluate(case, result, options.output_tail_lines);
    let duration = started.elapsed();

    match &verdict.outcome {
        CaseOutcome::Passed => info!(case_id = %case.id, ?duration, "case passed"),
        CaseOutcome::Failed { reason } => {
            info!(case_id = %case.id, ?duration, ?reason, "case failed");
        }
        CaseOutcome::Cancelled { during } => {
            warn!(case_id = %case.id, ?during, "case cancelled");
        }
    }

    CaseRun {
        case: case.clone(),
        verdict,
        duration,
    }
}
