//! External process execution with a bounded wait.

use super::strategy::StrategyFailure;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured result of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run `program` to completion, killing it once `timeout` elapses.
///
/// Output is drained on reader threads so a chatty child cannot block on a
/// full pipe while we poll.
pub fn run_with_timeout<I, S>(
    tool: &str,
    program: &Path,
    args: I,
    timeout: Duration,
) -> Result<ProcessOutput, StrategyFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| StrategyFailure::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_with_deadline(tool, &mut child, timeout)?;

    Ok(ProcessOutput {
        status,
        stdout: join_output(stdout),
        stderr: join_output(stderr),
    })
}

/// Launch an interactive program and watch it for `grace`.
///
/// Returns `Ok(None)` when the program is still running after the grace
/// period, or `Ok(Some(status))` when it already exited successfully.
pub fn launch_detached<I, S>(
    tool: &str,
    program: &Path,
    args: I,
    grace: Duration,
) -> Result<Option<ExitStatus>, StrategyFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| StrategyFailure::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    let start = Instant::now();
    while start.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(Some(status)),
            Ok(Some(status)) => {
                return Err(StrategyFailure::ProcessFailed {
                    tool: tool.to_string(),
                    code: status.code(),
                    detail: "exited immediately after launch".to_string(),
                })
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(StrategyFailure::Spawn {
                    tool: tool.to_string(),
                    source,
                })
            }
        }
    }

    tracing::debug!(tool = %tool, pid = child.id(), "Process still running after launch");
    Ok(None)
}

fn wait_with_deadline(
    tool: &str,
    child: &mut Child,
    timeout: Duration,
) -> Result<ExitStatus, StrategyFailure> {
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            tracing::warn!(tool = %tool, timeout_secs = timeout.as_secs(), "Process timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(StrategyFailure::Timeout {
                tool: tool.to_string(),
                timeout,
            });
        }

        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(StrategyFailure::Spawn {
                    tool: tool.to_string(),
                    source,
                });
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_output() {
        let output = run_with_timeout(
            "sh",
            Path::new("sh"),
            ["-c", "echo out; echo err 1>&2; exit 3"],
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(!output.success());
        assert_eq!(output.code(), Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_run_times_out() {
        let err = run_with_timeout(
            "sleep",
            Path::new("sleep"),
            ["5"],
            Duration::from_millis(300),
        )
        .unwrap_err();
        assert!(matches!(err, StrategyFailure::Timeout { .. }));
    }

    #[test]
    fn test_run_missing_program() {
        let err = run_with_timeout(
            "missing",
            Path::new("/nonexistent/tb2pbi-missing-tool"),
            Vec::<String>::new(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, StrategyFailure::Spawn { .. }));
    }

    #[test]
    fn test_launch_detached_immediate_failure() {
        let err = launch_detached(
            "sh",
            Path::new("sh"),
            ["-c", "exit 4"],
            Duration::from_secs(2),
        )
        .unwrap_err();
        assert!(matches!(err, StrategyFailure::ProcessFailed { code: Some(4), .. }));
    }

    #[test]
    fn test_launch_detached_still_running() {
        let status = launch_detached(
            "sleep",
            Path::new("sleep"),
            ["1"],
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(status.is_none());
    }
}
