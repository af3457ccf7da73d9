//! External command execution with timeouts.
//!
//! [`CommandRunner`] launches a tool, captures its standard output and
//! standard error, and enforces an optional deadline. A child that outlives
//! its deadline is killed together with its descendant processes, and the
//! runner reports the timeout through [`CommandOutput::timed_out`] and the
//! [`TIMEOUT_EXIT_CODE`] sentinel instead of an error.
//!
//! # Example
//!
//! ```no_run
//! use std::process::Command;
//! use std::time::Duration;
//!
//! use vqscore::CommandRunner;
//!
//! let runner = CommandRunner::new().with_timeout(Some(Duration::from_secs(5)));
//! let mut command = Command::new("ffprobe");
//! command.arg("-version");
//! let output = runner.run(&mut command)?;
//! if output.timed_out {
//!     eprintln!("ffprobe hung");
//! }
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ScoreError;

/// Exit code reported for a child that was killed at its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = -9;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of running an external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code of the child. Signal terminations map to `-signal` on Unix;
    /// a timeout yields [`TIMEOUT_EXIT_CODE`].
    pub exit_code: i32,
    /// Captured standard output. Empty after a timeout.
    pub stdout: Vec<u8>,
    /// Captured standard error. Empty after a timeout.
    pub stderr: Vec<u8>,
    /// Whether the child was killed because its deadline passed.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Returns `true` if the child exited normally with status 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Standard error as lossy UTF-8, trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    fn timed_out() -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: Vec::new(),
            stderr: Vec::new(),
            timed_out: true,
        }
    }
}

/// Runs external tools with an optional timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Option<Duration>,
    kill_tree: bool,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    /// A runner with no timeout that kills descendant processes on expiry
    /// once a timeout is configured.
    pub fn new() -> Self {
        Self {
            timeout: None,
            kill_tree: true,
        }
    }

    /// Set the deadline applied to each command. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether descendants of a timed-out child are killed as well.
    #[must_use]
    pub fn with_kill_tree(mut self, kill_tree: bool) -> Self {
        self.kill_tree = kill_tree;
        self
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `command` to completion or until the deadline.
    ///
    /// Standard output and standard error are always captured; standard
    /// input is closed.
    ///
    /// # Errors
    ///
    /// Only [`ScoreError::Spawn`]. A non-zero exit or a timeout is reported
    /// through the returned [`CommandOutput`].
    pub fn run(&self, command: &mut Command) -> Result<CommandOutput, ScoreError> {
        log::debug!("run_cmd: {}", render_command(command));

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| ScoreError::Spawn {
            program: command.get_program().to_string_lossy().into_owned(),
            source,
        })?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match self.timeout {
            None => child.wait()?,
            Some(timeout) => match wait_with_deadline(&mut child, Instant::now() + timeout)? {
                Some(status) => status,
                None => {
                    log::warn!(
                        "Command exceeded {:.1}s, killing: {}",
                        timeout.as_secs_f64(),
                        render_command(command)
                    );
                    self.kill(&mut child);
                    // Readers are detached: a surviving grandchild may still
                    // hold the pipes open.
                    drop(stdout_reader);
                    drop(stderr_reader);
                    return Ok(CommandOutput::timed_out());
                }
            },
        };

        Ok(CommandOutput {
            exit_code: exit_code(status),
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
            timed_out: false,
        })
    }

    /// Run `command` and turn a non-zero exit or a timeout into an error.
    ///
    /// # Errors
    ///
    /// [`ScoreError::Spawn`], [`ScoreError::Timeout`] or
    /// [`ScoreError::CommandFailed`].
    pub fn run_checked(&self, command: &mut Command) -> Result<CommandOutput, ScoreError> {
        let output = self.run(command)?;
        if output.timed_out {
            return Err(ScoreError::Timeout {
                command: render_command(command),
                timeout: self.timeout.unwrap_or_default(),
            });
        }
        if output.exit_code != 0 {
            return Err(ScoreError::CommandFailed {
                command: render_command(command),
                exit_code: output.exit_code,
                stderr: output.stderr_text(),
            });
        }
        Ok(output)
    }

    fn kill(&self, child: &mut Child) {
        // Enumerate before the root dies so its children are still linked
        // to it.
        let descendants = if self.kill_tree {
            descendant_pids(child.id())
        } else {
            Vec::new()
        };

        // The process may already have exited; ignore "no such process".
        if let Err(error) = child.kill() {
            log::debug!("kill {} failed: {error}", child.id());
        }
        for pid in &descendants {
            kill_pid(*pid);
        }
        if let Err(error) = child.wait() {
            log::debug!("reaping {} failed: {error}", child.id());
        }
    }
}

/// Render a command for logs and error messages.
pub fn render_command(command: &Command) -> String {
    let mut rendered = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    source.map(|mut source| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Err(error) = source.read_to_end(&mut buffer) {
                log::debug!("reading child output failed: {error}");
            }
            buffer
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Poll the child until it exits or the deadline passes.
///
/// Returns `None` on timeout.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
) -> Result<Option<ExitStatus>, ScoreError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// All live descendants of `root`, found by walking parent links in `/proc`.
#[cfg(target_os = "linux")]
pub(crate) fn descendant_pids(root: u32) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut parents: Vec<(u32, u32)> = Vec::new();
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some(ppid) = parse_parent_pid(&stat) {
            parents.push((pid, ppid));
        }
    }

    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for &(pid, ppid) in &parents {
            if ppid == parent && !found.contains(&pid) {
                found.push(pid);
                frontier.push(pid);
            }
        }
    }
    found
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn descendant_pids(_root: u32) -> Vec<u32> {
    Vec::new()
}

/// Parent PID from the contents of `/proc/<pid>/stat`.
///
/// The command name is parenthesised and may itself contain spaces or
/// parentheses, so fields are read after the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_parent_pid(stat: &str) -> Option<u32> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    let result = Command::new("kill")
        .args(["-s", "KILL", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(error) = result {
        log::debug!("kill -s KILL {pid} failed: {error}");
    }
}

#[cfg(not(unix))]
fn kill_pid(pid: u32) {
    log::debug!("cannot signal descendant {pid} on this platform");
}
