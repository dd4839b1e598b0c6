//! Test-only helpers: scripted tools, recording sleepers and case builders.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::budget::Deadline;
use crate::core::types::{AttemptStatus, LifecycleMode, TestCase, ToolCommand};
use crate::executor::Sleeper;
use crate::io::tool::{Tool, ToolOutput};

/// A successful tool invocation with `output`.
pub fn success(output: &str) -> ToolOutput {
    ToolOutput {
        output: output.to_string(),
        status: AttemptStatus::success(),
        timed_out: false,
    }
}

/// A failed tool invocation with exit `code` and `output`.
pub fn failure(code: i32, output: &str) -> ToolOutput {
    ToolOutput {
        output: output.to_string(),
        status: AttemptStatus::failure(Some(code)),
        timed_out: false,
    }
}

/// Create a plan case expecting `expected` identifiers.
pub fn plan_case(id: &str, dir: &str, expected: &[&str]) -> TestCase {
    TestCase {
        id: id.to_string(),
        target_directory: PathBuf::from(dir),
        lifecycle_mode: LifecycleMode::Plan,
        expected_identifiers: expected.iter().map(|identifier| identifier.to_string()).collect(),
    }
}

/// Create a validate-only case.
pub fn validate_case(id: &str, dir: &str) -> TestCase {
    TestCase {
        id: id.to_string(),
        target_directory: PathBuf::from(dir),
        lifecycle_mode: LifecycleMode::Validate,
        expected_identifiers: Vec::new(),
    }
}

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub command: ToolCommand,
    pub target_directory: PathBuf,
}

enum Script {
    Queue(VecDeque<ToolOutput>),
    Repeat(ToolOutput),
    ByDirectory(BTreeMap<PathBuf, VecDeque<ToolOutput>>),
}

/// Tool returning scripted outputs instead of spawning processes.
///
/// Running out of script is reported as an invocation error.
pub struct ScriptedTool {
    script: Mutex<Script>,
    calls: Mutex<Vec<ToolCall>>,
    delay: Duration,
}

impl ScriptedTool {
    /// Return `outputs` in order, regardless of command or directory.
    pub fn new(outputs: Vec<ToolOutput>) -> Self {
        Self::with_script(Script::Queue(outputs.into()))
    }

    /// Return `output` for every invocation.
    pub fn repeating(output: ToolOutput) -> Self {
        Self::with_script(Script::Repeat(output))
    }

    /// Keep a separate queue per target directory (for concurrent cases).
    pub fn by_directory(scripts: Vec<(&str, Vec<ToolOutput>)>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|(dir, outputs)| (PathBuf::from(dir), outputs.into()))
            .collect();
        Self::with_script(Script::ByDirectory(scripts))
    }

    /// Simulate process run time; the wait is cut short by the run deadline.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.calls().into_iter().map(|call| call.command).collect()
    }

    fn next_output(&self, target_directory: &Path) -> Option<ToolOutput> {
        let mut script = self.script.lock().expect("script lock");
        match &mut *script {
            Script::Queue(queue) => queue.pop_front(),
            Script::Repeat(output) => Some(output.clone()),
            Script::ByDirectory(scripts) => scripts
                .get_mut(target_directory)
                .and_then(|queue| queue.pop_front()),
        }
    }
}

impl Tool for ScriptedTool {
    fn run(
        &self,
        command: ToolCommand,
        target_directory: &Path,
        deadline: Deadline,
    ) -> Result<ToolOutput> {
        self.calls.lock().expect("calls lock").push(ToolCall {
            command,
            target_directory: target_directory.to_path_buf(),
        });

        if !self.delay.is_zero() {
            thread::sleep(deadline.clamp(self.delay));
            if deadline.is_expired() {
                return Ok(ToolOutput {
                    output: format!("[{command} timed out]"),
                    status: AttemptStatus::failure(None),
                    timed_out: true,
                });
            }
        }

        self.next_output(target_directory).ok_or_else(|| {
            anyhow!(
                "script exhausted for {command} in {}",
                target_directory.display()
            )
        })
    }
}

/// Sleeper that records requested waits without blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps lock").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps lock").push(duration);
    }
}

/// Scratch directory holding an executable stand-in for the provisioning tool.
#[cfg(unix)]
pub struct FakeToolDir {
    _dir: tempfile::TempDir,
    binary: PathBuf,
}

#[cfg(unix)]
impl FakeToolDir {
    /// Write `body` as a `sh` script named `terraform`.
    ///
    /// The script receives the lifecycle command as `$1` and runs in the
    /// case's target directory.
    pub fn new(body: &str) -> Result<Self> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let binary = dir.path().join("terraform");
        std::fs::write(&binary, format!("#!/bin/sh\n{body}\n"))?;
        let mut permissions = std::fs::metadata(&binary)?.permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&binary, permissions)?;
        Ok(Self { _dir: dir, binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}
