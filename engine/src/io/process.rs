//! Helpers for running child processes with timeouts and bounded, merged output.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long to keep collecting output once the child has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// stdout and stderr interleaved line by line in arrival order.
    pub output: Vec<u8>,
    pub truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn truncated_notice(&self, label: &str) -> String {
        if self.truncated > 0 {
            format!("\n[{label} output truncated {} bytes]\n", self.truncated)
        } else {
            String::new()
        }
    }
}

/// Run a command with a timeout, merging stdout and stderr without risking pipe deadlocks.
///
/// Both streams are read concurrently while the child runs and forwarded line by
/// line to a single collector, so the merged text keeps the order in which lines
/// arrived. `output_limit_bytes` bounds what is kept in memory; bytes beyond it
/// are discarded while the pipes are still drained. On timeout the child is
/// killed and `timed_out` is set.
///
/// Once the child has exited, output is collected for at most [`DRAIN_GRACE`].
/// Processes it spawned may still hold the pipes; their later output is dropped.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes = output_limit_bytes))]
pub fn run_command_merged(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (tx, rx) = mpsc::channel();
    let stderr_tx = tx.clone();
    // Readers are detached: processes the child started may keep the pipes open
    // long after the child itself has exited or been killed.
    thread::spawn(move || forward_lines(stdout, tx, "stdout"));
    thread::spawn(move || forward_lines(stderr, stderr_tx, "stderr"));

    let collected = Arc::new(Mutex::new(Collected::default()));
    let (done_tx, done_rx) = mpsc::channel();
    {
        let collected = Arc::clone(&collected);
        thread::spawn(move || {
            collect_limited(rx, &collected, output_limit_bytes);
            let _ = done_tx.send(());
        });
    }

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    match done_rx.recv_timeout(DRAIN_GRACE) {
        Ok(()) => {}
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                grace_ms = DRAIN_GRACE.as_millis() as u64,
                "output pipes still open after exit, detaching readers"
            );
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(anyhow!("output collector thread panicked"));
        }
    }
    let Collected { output, truncated } =
        std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner));

    if truncated > 0 {
        warn!(truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        output,
        truncated,
        timed_out,
    })
}

/// Send each line (including its newline) to the collector until EOF.
fn forward_lines<R: Read>(reader: R, tx: Sender<Vec<u8>>, stream: &'static str) {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                // The collector only hangs up after both readers are done.
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(stream, err = %err, "read child output");
                break;
            }
        }
    }
}

#[derive(Debug, Default)]
struct Collected {
    output: Vec<u8>,
    truncated: usize,
}

fn collect_limited(rx: Receiver<Vec<u8>>, collected: &Mutex<Collected>, limit: usize) {
    for line in rx {
        let mut collected = collected.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = limit.saturating_sub(collected.output.len());
        let keep = line.len().min(remaining);
        collected.output.extend_from_slice(&line[..keep]);
        collected.truncated += line.len() - keep;
    }
}
