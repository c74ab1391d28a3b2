//! Running a child process with a timeout and bounded output.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long pipe workers may keep running past the call's timeout.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

/// Run a command with a timeout, feeding `stdin` and capturing stdout/stderr.
///
/// Stdin is written and both output pipes are drained on their own threads, so
/// a child that answers before reading all of its input cannot deadlock us.
/// `output_limit_bytes` bounds what is kept of each stream; the rest is read and
/// discarded.
///
/// The call returns within `timeout` plus a short grace period even when a
/// grandchild keeps the pipes open after the child exits or is killed. In
/// that case the output is abandoned and the call reports `timed_out`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let started = Instant::now();
    let stdin_rx = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            Some(spawn_worker(move || -> Result<()> {
                child_stdin.write_all(&input).context("write stdin")
            }))
        }
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_rx = spawn_worker(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_rx = spawn_worker(move || read_stream_limited(stderr, output_limit_bytes));

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

    let drain_deadline = started + timeout + DRAIN_GRACE;

    if let Some(rx) = stdin_rx {
        // A child that exits without draining stdin breaks the pipe; its exit
        // status is what matters, so the write error is only logged.
        match recv_until(&rx, drain_deadline).context("stdin writer")? {
            Some(Ok(())) => {}
            Some(Err(err)) => debug!(err = %err, "stdin not fully written"),
            None => debug!("stdin writer still blocked, abandoning it"),
        }
    }

    let stdout = recv_until(&stdout_rx, drain_deadline).context("stdout reader")?;
    let stderr = recv_until(&stderr_rx, drain_deadline).context("stderr reader")?;
    let ((stdout, stdout_truncated), (stderr, stderr_truncated)) = match (stdout, stderr) {
        (Some(out), Some(err)) => (out.context("read stdout")?, err.context("read stderr")?),
        _ => {
            warn!("output pipes still open after the command ended, abandoning output");
            timed_out = true;
            ((Vec::new(), 0), (Vec::new(), 0))
        }
    };

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Run `work` on its own thread and hand back its result over a channel.
fn spawn_worker<T, F>(work: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone only when the caller gave up on this worker.
        let _ = tx.send(work());
    });
    rx
}

/// Wait for a worker until `deadline`; `None` means it is still running.
fn recv_until<T>(rx: &Receiver<T>, deadline: Instant) -> Result<Option<T>> {
    let wait = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(wait) {
        Ok(value) => Ok(Some(value)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("worker thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_stream_limited_truncates() {
        let data = vec![b'x'; 100];
        let (kept, truncated) = read_stream_limited(&data[..], 40).expect("read");
        assert_eq!(kept.len(), 40);
        assert_eq!(truncated, 60);
    }

    /// Input larger than a pipe buffer round-trips through `cat` without deadlocking.
    #[cfg(unix)]
    #[test]
    fn large_stdin_does_not_deadlock() {
        let input = vec![b'a'; 512 * 1024];
        let output = run_command_with_timeout(
            Command::new("cat"),
            Some(&input),
            Duration::from_secs(10),
            1024 * 1024,
        )
        .expect("run cat");

        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(output.stdout.len(), input.len());
    }

    #[cfg(unix)]
    #[test]
    fn exited_command_returns_its_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2; exit 3"]);
        let output =
            run_command_with_timeout(cmd, None, Duration::from_secs(10), 1024).expect("run sh");

        assert_eq!(output.status.code(), Some(3));
        assert!(!output.timed_out);
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
    }

    /// A background grandchild holding stdout open must not outlive the timeout.
    #[cfg(unix)]
    #[test]
    fn grandchild_holding_pipes_does_not_block_past_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30 & sleep 30"]);
        let started = Instant::now();
        let output = run_command_with_timeout(cmd, Some(b"prompt"), Duration::from_millis(300), 1024)
            .expect("run sh");

        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(15));
    }

    /// Same when the child itself exits at once and only the grandchild lingers.
    #[cfg(unix)]
    #[test]
    fn lingering_grandchild_after_exit_is_abandoned() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30 & echo started"]);
        let started = Instant::now();
        let output =
            run_command_with_timeout(cmd, None, Duration::from_millis(300), 1024).expect("run sh");

        assert!(output.status.success());
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(15));
    }
}
