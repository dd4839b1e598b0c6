//! CLI tests for the `suite` binary.
//!
//! Each test lays out a scratch repository with `harness.toml`, a case
//! registry and module directories, then points the suite at a shell
//! stand-in for the provisioning tool that answers per directory name.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use engine::test_support::FakeToolDir;
use tempfile::TempDir;

const FAKE_TOOL: &str = r#"name=$(basename "$(pwd)")
case "$1" in
  init)
    if [ "$name" = "locked" ] && [ ! -f .attempted ]; then
      touch .attempted
      echo "Error: Error acquiring the state lock" 1>&2
      exit 1
    fi
    echo "Terraform has been successfully initialized!"
    ;;
  plan)
    echo "  # module.networking.aws_vpc.main will be created"
    if [ "$name" != "partial" ]; then
      echo "  # module.compute.aws_instance.app will be created"
    fi
    ;;
  validate)
    if [ "$name" = "broken" ]; then
      echo "Error: Unsupported argument" 1>&2
      exit 1
    fi
    echo "Success! The configuration is valid."
    ;;
esac"#;

struct Scratch {
    root: TempDir,
    _fake: FakeToolDir,
}

impl Scratch {
    fn new(registry: &str, modules: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let fake = FakeToolDir::new(FAKE_TOOL).expect("fake tool");
        fs::write(
            root.path().join("harness.toml"),
            format!(
                "[tool]\nbinary = '{}'\ncommand_timeout_secs = 30\n\n[retry]\nmax_attempts = 3\nbackoff_secs = [0]\n",
                fake.binary().display()
            ),
        )
        .expect("write harness.toml");
        fs::create_dir_all(root.path().join("cases")).expect("cases dir");
        fs::write(root.path().join("cases/infrastructure.toml"), registry).expect("registry");
        for module in modules {
            fs::create_dir_all(root.path().join("modules").join(module)).expect("module dir");
        }
        Self { root, _fake: fake }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn suite(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_suite"))
            .current_dir(self.path())
            .args(args)
            .output()
            .expect("run suite")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const PASSING_REGISTRY: &str = r#"
[[cases]]
id = "dev"
dir = "../modules/good"
mode = "plan"
expect = ["module.networking", "module.compute"]

[[cases]]
id = "state-module"
dir = "../modules/state"
mode = "validate"
"#;

#[test]
fn passing_suite_exits_ok_and_writes_report() {
    let scratch = Scratch::new(PASSING_REGISTRY, &["good", "state"]);

    let output = scratch.suite(&["run", "--jobs", "2", "--report", "out/report.json"]);

    assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
    let text = stdout(&output);
    assert!(text.contains("case: id=dev mode=plan"));
    assert!(text.contains("summary: total=2 passed=2 failed=0 cancelled=0"));

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(scratch.path().join("out/report.json")).expect("read report"),
    )
    .expect("parse report");
    assert_eq!(report["summary"]["passed"], 2);
    assert_eq!(report["cases"][0]["id"], "dev");
    assert_eq!(report["cases"][1]["id"], "state-module");
}

#[test]
fn missing_identifier_fails_suite() {
    let registry = r#"
[[cases]]
id = "staging"
dir = "../modules/partial"
mode = "plan"
expect = ["module.networking", "module.compute"]
"#;
    let scratch = Scratch::new(registry, &["partial"]);

    let output = scratch.suite(&["run"]);

    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("result=fail"));
    assert!(text.contains("  missing: module.compute\n"));
    assert!(!text.contains("missing: module.networking"));
}

#[test]
fn validate_failure_shows_output_tail() {
    let registry = r#"
[[cases]]
id = "compute-module"
dir = "../modules/broken"
mode = "validate"
"#;
    let scratch = Scratch::new(registry, &["broken"]);

    let output = scratch.suite(&["run"]);

    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("validate failed after 1 attempt(s)"));
    assert!(text.contains("  | Error: Unsupported argument"));
}

#[test]
fn lock_contention_is_retried() {
    let registry = r#"
[[cases]]
id = "bootstrap"
dir = "../modules/locked"
mode = "validate"
"#;
    let scratch = Scratch::new(registry, &["locked"]);

    let output = scratch.suite(&["run"]);

    assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
    assert!(stdout(&output).contains("steps=initx2,validatex1 result=pass"));
}

#[test]
fn filter_limits_selected_cases() {
    let scratch = Scratch::new(PASSING_REGISTRY, &["good", "state"]);

    let output = scratch.suite(&["run", "--filter", "state"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(!text.contains("id=dev "));
    assert!(text.contains("summary: total=1 passed=1"));
}

#[test]
fn invalid_registry_exits_with_invalid_code() {
    let registry = r#"
[[cases]]
id = "dev"
dir = "../modules/good"
mode = "plan"
"#;
    let scratch = Scratch::new(registry, &["good"]);

    let output = scratch.suite(&["run"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least one expected identifier"));
}

#[test]
fn list_prints_registered_cases() {
    let scratch = Scratch::new(PASSING_REGISTRY, &["good", "state"]);

    let output = scratch.suite(&["list"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    let ids: Vec<&str> = text
        .lines()
        .filter_map(|line| line.split('\t').next())
        .collect();
    assert_eq!(ids, vec!["dev", "state-module"]);
}

#[test]
fn check_accepts_valid_inputs() {
    let scratch = Scratch::new(PASSING_REGISTRY, &["good", "state"]);

    let output = scratch.suite(&["check"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("check: cases=2"));
    assert!(text.contains(
        "check: retryable \"Error acquiring the state lock\" reason=\"state lock contention\""
    ));
}
