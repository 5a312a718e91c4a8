//! Blocking execution of external commands with output capture and an
//! optional wall-clock timeout.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CommandFailure;

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long pipe readers get to finish after a timeout kill
const READER_GRACE: Duration = Duration::from_millis(500);

/// Everything a finished command produced
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Rendered command line, for logs and error reports
    pub command: String,
    /// Exit code (None when killed by a signal)
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CapturedOutput {
    /// stdout followed by stderr, the way match tools are usually scraped
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Converts a non-zero exit into a [`CommandFailure`]
    pub fn into_result(self) -> Result<CapturedOutput, CommandFailure> {
        if self.success {
            Ok(self)
        } else {
            let reason = match self.exit_code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            };
            Err(self.into_failure(reason))
        }
    }

    pub fn into_failure(self, reason: impl Into<String>) -> CommandFailure {
        CommandFailure {
            command: self.command,
            reason: reason.into(),
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Why a command produced no [`CapturedOutput`]
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {after:?}")]
    TimedOut {
        command: String,
        after: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub fn into_failure(self) -> CommandFailure {
        match self {
            RunError::Spawn { command, source } => {
                CommandFailure::new(command, format!("failed to start: {source}"))
            }
            RunError::TimedOut {
                command,
                after,
                stdout,
                stderr,
            } => CommandFailure {
                command,
                reason: format!("timed out after {after:?}"),
                stdout,
                stderr,
            },
            RunError::Wait { command, source } => {
                CommandFailure::new(command, format!("failed waiting: {source}"))
            }
        }
    }
}

/// Renders a command as a single shell-like line
pub fn render(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Output of one pipe, collected on a background thread
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl PipeCapture {
    /// Whatever has been read once the reader finished or `wait` elapsed.
    ///
    /// Descendants that inherited the pipe can keep it open after the
    /// child exits, so the reader is never joined.
    fn collect(self, wait: Option<Duration>) -> String {
        let _ = match wait {
            Some(wait) => self.done.recv_timeout(wait).ok(),
            None => self.done.recv().ok(),
        };
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> PipeCapture {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buf);
    thread::spawn(move || {
        if let Some(mut pipe) = pipe {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                }
            }
        }
        let _ = tx.send(());
    });
    PipeCapture { buf, done }
}

/// Puts the child in a process group of its own so the whole tree can be
/// killed on timeout
#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain syscall on a process group created by `isolate`.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn wait_until(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Runs `cmd` to completion, capturing stdout and stderr.
///
/// With a timeout the child's whole process group is killed once it
/// elapses and [`RunError::TimedOut`] carries whatever output was produced so far.
/// A non-zero exit is *not* an error here; callers decide what counts as
/// success.
pub fn run_captured(cmd: &mut Command, timeout: Option<Duration>) -> Result<CapturedOutput, RunError> {
    let command = render(cmd);
    tracing::debug!(%command, ?timeout, "running command");

    let start = Instant::now();
    isolate(cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Spawn {
            command: command.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = timeout.map(|t| start + t);
    let status = wait_until(&mut child, deadline).map_err(|source| {
        kill_tree(&mut child);
        let _ = child.wait();
        RunError::Wait {
            command: command.clone(),
            source,
        }
    })?;

    let status = match status {
        Some(status) => status,
        None => {
            kill_tree(&mut child);
            let _ = child.wait();
            let after = start.elapsed();
            tracing::warn!(%command, ?after, "command timed out, process group killed");
            return Err(RunError::TimedOut {
                command,
                after,
                stdout: stdout.collect(Some(READER_GRACE)),
                stderr: stderr.collect(Some(READER_GRACE)),
            });
        }
    };

    // A descendant still holding the pipes gets until the deadline.
    let wait = deadline.map(|d| d.saturating_duration_since(Instant::now()).max(READER_GRACE));
    Ok(CapturedOutput {
        command,
        exit_code: status.code(),
        success: status.success(),
        stdout: stdout.collect(wait),
        stderr: stderr.collect(wait),
        elapsed: start.elapsed(),
    })
}

/// Runs `cmd` and treats a non-zero exit, a spawn error or a timeout alike
/// as a [`CommandFailure`]
pub fn run_checked(cmd: &mut Command, timeout: Option<Duration>) -> Result<CapturedOutput, CommandFailure> {
    run_captured(cmd, timeout)
        .map_err(RunError::into_failure)?
        .into_result()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod process_tests;
