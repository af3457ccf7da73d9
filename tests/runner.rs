//! Command runner integration tests.
//!
//! These spawn `sh` and `sleep` and only run on Unix.

#![cfg(unix)]

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use vqscore::{CommandRunner, ScoreError, TIMEOUT_EXIT_CODE};

fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.args(["-c", script]);
    command
}

// ── Normal completion ──────────────────────────────────────────────

#[test]
fn captures_stdout_and_stderr() {
    let output = CommandRunner::new()
        .run(&mut shell("echo hello; echo warning >&2"))
        .expect("Failed to run sh");

    assert!(output.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    assert_eq!(output.stderr_text(), "warning");
}

#[test]
fn non_zero_exit_is_reported_not_raised() {
    let output = CommandRunner::new()
        .run(&mut shell("exit 3"))
        .expect("Failed to run sh");
    assert_eq!(output.exit_code, 3);
    assert!(!output.timed_out);
}

#[test]
fn run_checked_raises_command_failed() {
    let error = CommandRunner::new()
        .run_checked(&mut shell("echo broken pipe >&2; exit 2"))
        .unwrap_err();
    match error {
        ScoreError::CommandFailed {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, 2);
            assert_eq!(stderr, "broken pipe");
        }
        other => panic!("Expected CommandFailed, got {other:?}"),
    }
}

#[test]
fn large_output_does_not_block() {
    let output = CommandRunner::new()
        .with_timeout(Some(Duration::from_secs(10)))
        .run(&mut shell("head -c 1000000 /dev/zero"))
        .expect("Failed to run sh");
    assert!(output.success());
    assert_eq!(output.stdout.len(), 1_000_000);
}

#[test]
fn missing_binary_is_spawn_error() {
    let error = CommandRunner::new()
        .run(&mut Command::new("/nonexistent/tool"))
        .unwrap_err();
    assert!(matches!(error, ScoreError::Spawn { ref program, .. } if program == "/nonexistent/tool"));
}

// ── Timeouts ───────────────────────────────────────────────────────

#[test]
fn timeout_returns_sentinel() {
    let started = Instant::now();
    let mut command = Command::new("sleep");
    command.arg("10");

    let output = CommandRunner::new()
        .with_timeout(Some(Duration::from_secs(1)))
        .run(&mut command)
        .expect("Failed to run sleep");

    assert!(output.timed_out);
    assert_eq!(output.exit_code, TIMEOUT_EXIT_CODE);
    assert!(output.stdout.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "Runner should return shortly after the deadline",
    );
}

#[test]
fn run_checked_raises_timeout() {
    let mut command = Command::new("sleep");
    command.arg("10");
    let error = CommandRunner::new()
        .with_timeout(Some(Duration::from_secs(1)))
        .run_checked(&mut command)
        .unwrap_err();
    assert!(matches!(error, ScoreError::Timeout { timeout, .. } if timeout == Duration::from_secs(1)));
}

#[test]
fn sub_second_timeout_is_reported_exactly() {
    let mut command = Command::new("sleep");
    command.arg("10");
    let error = CommandRunner::new()
        .with_timeout(Some(Duration::from_millis(300)))
        .run_checked(&mut command)
        .unwrap_err();
    assert!(matches!(error, ScoreError::Timeout { timeout, .. } if timeout == Duration::from_millis(300)));
    assert!(error.to_string().contains("300ms"), "Unexpected message: {error}");
}

#[cfg(target_os = "linux")]
fn is_live(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            let state = stat
                .rfind(')')
                .and_then(|end| stat[end + 1..].split_whitespace().next());
            !matches!(state, Some("Z") | Some("X"))
        }
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[test]
fn timeout_kills_descendants() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let pid_file = directory.path().join("child.pid");
    let script = format!("sleep 10 & echo $! > '{}'; wait", pid_file.display());

    let output = CommandRunner::new()
        .with_timeout(Some(Duration::from_secs(1)))
        .run(&mut shell(&script))
        .expect("Failed to run sh");
    assert!(output.timed_out);

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .expect("Failed to read pid file")
        .trim()
        .parse()
        .expect("Invalid pid");

    let deadline = Instant::now() + Duration::from_secs(2);
    while is_live(pid) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(!is_live(pid), "Grandchild {pid} survived the timeout");
}
