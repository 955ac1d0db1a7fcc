//! Child-process execution with a timeout and bounded output capture.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long pipe readers may lag behind the child once it has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

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

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last few lines of stderr, for error messages.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Stdin is fed and both pipes are drained on helper threads while the child
/// runs. `output_limit_bytes` bounds how much of each stream is kept in memory;
/// the remainder is drained and counted. On timeout the child is killed.
///
/// The whole call is bounded by `timeout` plus a short drain grace: helpers
/// still blocked on a pipe after that (held open by a grandchild, say) are
/// abandoned and the output counts as timed out.
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

    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            // Dropping the handle at the end of the thread closes the pipe.
            Some(thread::spawn(move || child_stdin.write_all(&input)))
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

    let started = Instant::now();
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

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

    let drain_deadline = Instant::now().max(started + timeout) + DRAIN_GRACE;

    if let Some(handle) = stdin_handle {
        match join_until(handle, drain_deadline) {
            Some(Ok(Ok(()))) => {}
            // The child may exit without reading its input; that is its business.
            Some(Ok(Err(err))) => debug!(err = %err, "stdin write incomplete"),
            Some(Err(_)) => return Err(anyhow!("stdin writer thread panicked")),
            None => debug!("stdin writer still blocked, abandoning"),
        }
    }

    let mut abandoned = false;
    let (stdout, stdout_truncated) = join_output(stdout_handle, drain_deadline)
        .context("join stdout")?
        .unwrap_or_else(|| {
            abandoned = true;
            (Vec::new(), 0)
        });
    let (stderr, stderr_truncated) = join_output(stderr_handle, drain_deadline)
        .context("join stderr")?
        .unwrap_or_else(|| {
            abandoned = true;
            (Vec::new(), 0)
        });
    if abandoned {
        warn!("output pipes still held open after the child exited, abandoning readers");
        timed_out = true;
    }

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

/// `None` when the reader is still blocked at `deadline`; the thread is detached.
fn join_output(
    handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>,
    deadline: Instant,
) -> Result<Option<(Vec<u8>, usize)>> {
    match join_until(handle, deadline) {
        Some(Ok(result)) => result.map(Some),
        Some(Err(_)) => Err(anyhow!("output reader thread panicked")),
        None => Ok(None),
    }
}

fn join_until<T>(handle: thread::JoinHandle<T>, deadline: Instant) -> Option<thread::Result<T>> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
    Some(handle.join())
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
