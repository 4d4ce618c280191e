use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::cancel::CancelScope;
use crate::config::types::Check;

/// Why a check's process stopped — distinguishes a deliberate timeout from an
/// externally requested cancellation (fail-fast from a sibling, or a
/// caller-supplied root scope), per spec.md §4.3/§9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Exited,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub stdout: String,
    pub stderr: String,
    pub combined: String,
    pub exit_code: i32,
    pub reason: StopReason,
    pub duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("check \"{check_id}\" (line {line}): failed to spawn: {cause}")]
    Spawn {
        check_id: String,
        line: usize,
        #[source]
        cause: std::io::Error,
    },
}

const MAX_OUTPUT_LINES: usize = 10_000;

/// Runs a single check's `run` command as its own process group, so a
/// timeout or cancellation can kill the whole subprocess tree rather than
/// just the immediate child — grounded on
/// `other_examples/.../sanjay920-agentsh__src-process.rs.rs`'s
/// `setsid`/`pre_exec`/`killpg` pairing, which `tokf::runner`'s synchronous
/// `Command::output()` has no equivalent for.
pub struct Executor;

impl Executor {
    /// Execute `check.run` under `cwd`, racing its configured timeout against
    /// `scope`'s cancellation.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Spawn` if the process could not be started at
    /// all (missing shell, permission denied, etc).
    pub async fn run(
        check: &Check,
        scope: &CancelScope,
        cwd: Option<&Path>,
    ) -> Result<ExecutionRecord, ExecutionError> {
        let start = Instant::now();

        let mut command = Command::new("sh");
        command.arg("-c").arg(&check.run);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        // SAFETY: pre_exec runs in the forked child before exec; setsid() is
        // async-signal-safe and this closure does nothing else.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|cause| ExecutionError::Spawn {
            check_id: check.id.clone(),
            line: check.line,
            cause,
        })?;

        let pid = child.id();

        let stdout_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let stderr_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let combined_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let stdout_handle = child
            .stdout
            .take()
            .map(|stdout| spawn_reader(stdout, Arc::clone(&stdout_lines), Arc::clone(&combined_lines)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| spawn_reader(stderr, Arc::clone(&stderr_lines), Arc::clone(&combined_lines)));

        let (reason, exit_code) = tokio::select! {
            wait_result = child.wait() => {
                match wait_result {
                    Ok(status) => (StopReason::Exited, exit_code_of(&status)),
                    Err(_) => (StopReason::Exited, -1),
                }
            }
            () = tokio::time::sleep(check.timeout) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                let _ = child.wait().await;
                // Distinguished exit code for timeout — spec.md §4.3.
                (StopReason::TimedOut, 3)
            }
            () = scope.cancelled() => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                let _ = child.wait().await;
                (StopReason::Cancelled, 130)
            }
        };

        // The process has exited (or been killed), which closes its pipe
        // ends, but the reader tasks may not have drained the last chunk yet
        // — await them before reading the buffers they fill, or a
        // fast-exiting process can race its own output capture. Grounded on
        // `examples/other_examples/3ac645c3_sanjay920-agentsh__src-process.rs.rs`'s
        // `let _ = stdout_task.await; let _ = stderr_task.await;` pairing.
        if let Some(handle) = stdout_handle {
            let _ = handle.await;
        }
        if let Some(handle) = stderr_handle {
            let _ = handle.await;
        }

        let stdout = stdout_lines.lock().await.join("\n");
        let stderr = stderr_lines.lock().await.join("\n");
        let combined = combined_lines.lock().await.join("\n");

        Ok(ExecutionRecord {
            stdout,
            stderr,
            combined,
            exit_code,
            reason,
            duration: start.elapsed(),
        })
    }
}

fn spawn_reader<R>(
    reader: R,
    into: Arc<Mutex<Vec<String>>>,
    combined: Arc<Mutex<Vec<String>>>,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut own = into.lock().await;
            if own.len() < MAX_OUTPUT_LINES {
                own.push(line.clone());
            }
            drop(own);
            let mut combo = combined.lock().await;
            if combo.len() < MAX_OUTPUT_LINES {
                combo.push(line);
            }
        }
    });
}

fn kill_process_group(pid: u32) {
    #[allow(clippy::cast_possible_wrap)]
    let pgid = Pid::from_raw(-(pid as i32));
    let _ = kill(pgid, Signal::SIGKILL);
}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.code().unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::types::Severity;

    fn check(run: &str, timeout: Duration) -> Check {
        Check {
            id: "t".to_string(),
            run: run.to_string(),
            file: None,
            grok: Vec::new(),
            assert: None,
            severity: Severity::Error,
            suggestion: None,
            fix: None,
            requires: Vec::new(),
            timeout,
            line: 1,
        }
    }

    #[tokio::test]
    async fn successful_command_exits_cleanly() {
        let scope = CancelScope::root();
        let c = check("echo hello", Duration::from_secs(5));
        let record = Executor::run(&c, &scope, None).await.unwrap();
        assert_eq!(record.reason, StopReason::Exited);
        assert_eq!(record.exit_code, 0);
        assert_eq!(record.stdout, "hello");
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code() {
        let scope = CancelScope::root();
        let c = check("exit 7", Duration::from_secs(5));
        let record = Executor::run(&c, &scope, None).await.unwrap();
        assert_eq!(record.reason, StopReason::Exited);
        assert_eq!(record.exit_code, 7);
    }

    #[tokio::test]
    async fn timeout_kills_long_running_command() {
        let scope = CancelScope::root();
        let c = check("sleep 5", Duration::from_millis(100));
        let record = Executor::run(&c, &scope, None).await.unwrap();
        assert_eq!(record.reason, StopReason::TimedOut);
    }

    #[tokio::test]
    async fn external_cancellation_stops_the_process() {
        let scope = CancelScope::root();
        let child_scope = scope.clone();
        let c = check("sleep 5", Duration::from_secs(30));
        let handle = tokio::spawn(async move { Executor::run(&c, &child_scope, None).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        scope.cancel();
        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.reason, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_separately() {
        let scope = CancelScope::root();
        let c = check("echo out; echo err 1>&2", Duration::from_secs(5));
        let record = Executor::run(&c, &scope, None).await.unwrap();
        assert_eq!(record.stdout, "out");
        assert_eq!(record.stderr, "err");
    }
}
