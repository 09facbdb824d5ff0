//! Running a single child process with a deadline and bounded capture.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long readers may keep draining after the child is gone before their
/// output is taken as-is.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Raw output of a finished (or killed) child process.
#[derive(Debug)]
pub struct ChildOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    /// A process the child started still held a pipe open when we returned.
    pub readers_detached: bool,
}

impl ChildOutput {
    /// Stdout decoded as text and trimmed.
    pub fn stdout_text(&self) -> String {
        decode_trimmed(&self.stdout)
    }

    /// Stderr decoded as text and trimmed.
    pub fn stderr_text(&self) -> String {
        decode_trimmed(&self.stderr)
    }
}

/// Lossy decode; invalid sequences become U+FFFD rather than failing the call.
pub fn decode_trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Spawn `cmd`, drain both pipes on helper threads, and kill the child if it
/// outlives `timeout`.
///
/// Stdin is closed. At most `output_limit_bytes` of each stream is kept; the
/// rest is read and discarded so the child never blocks on a full pipe.
///
/// Only the direct child is killed. Grandchildren may keep the pipes open,
/// so the readers are waited on until the deadline (or a short grace after a
/// kill) and then left behind with whatever they captured so far.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ChildOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn child");
            return Err(e).context("spawn child process");
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

    let stdout_capture = SharedCapture::default();
    let stderr_capture = SharedCapture::default();
    let (done_tx, done_rx) = mpsc::channel();
    let spawned = spawn_reader(
        "child-stdout",
        stdout,
        output_limit_bytes,
        stdout_capture.clone(),
        done_tx.clone(),
    )
    .and_then(|()| {
        spawn_reader(
            "child-stderr",
            stderr,
            output_limit_bytes,
            stderr_capture.clone(),
            done_tx,
        )
    });
    if let Err(e) = spawned {
        // A pipe nobody drains can block the child forever; stop it now.
        abandon(&mut child);
        return Err(e);
    }

    let mut timed_out = false;
    let waited = match child.wait_timeout(timeout) {
        Ok(waited) => waited,
        Err(e) => {
            abandon(&mut child);
            return Err(e).context("wait for child");
        }
    };
    let (status, reader_deadline) = match waited {
        Some(status) => {
            let grace = Instant::now() + READER_GRACE;
            let budget = started.checked_add(timeout).map_or(grace, |end| end.max(grace));
            (status, budget)
        }
        None => {
            warn!(timeout_secs = timeout.as_secs(), "child timed out, killing");
            timed_out = true;
            child.kill().context("kill child")?;
            let status = child.wait().context("reap child after kill")?;
            (status, Instant::now() + READER_GRACE)
        }
    };

    let readers_detached = !wait_for_readers(&done_rx, 2, reader_deadline)?;
    if readers_detached {
        warn!("child output pipes still open after exit, detaching readers");
    }

    let (stdout, stdout_truncated) = stdout_capture.take();
    let (stderr, stderr_truncated) = stderr_capture.take();

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "child output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(ChildOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        readers_detached,
    })
}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Bytes kept from one stream plus the count of bytes dropped past the limit.
#[derive(Debug, Default)]
struct Capture {
    kept: Vec<u8>,
    dropped: usize,
}

#[derive(Debug, Default, Clone)]
struct SharedCapture(Arc<Mutex<Capture>>);

impl SharedCapture {
    fn lock(&self) -> std::sync::MutexGuard<'_, Capture> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self) -> (Vec<u8>, usize) {
        let mut capture = self.lock();
        (std::mem::take(&mut capture.kept), capture.dropped)
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    name: &str,
    reader: R,
    limit: usize,
    capture: SharedCapture,
    done: Sender<Result<()>>,
) -> Result<()> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = done.send(read_limited(reader, limit, &capture));
        })
        .with_context(|| format!("spawn {name} reader"))?;
    Ok(())
}

/// Wait until `count` readers report or `deadline` passes. Returns `false`
/// when the deadline won.
fn wait_for_readers(done: &Receiver<Result<()>>, count: usize, deadline: Instant) -> Result<bool> {
    for _ in 0..count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => return Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        }
    }
    Ok(true)
}

fn read_limited<R: Read>(mut reader: R, limit: usize, capture: &SharedCapture) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            break;
        }
        let mut guard = capture.lock();
        let room = limit.saturating_sub(guard.kept.len());
        let keep = n.min(room);
        guard.kept.extend_from_slice(&chunk[..keep]);
        guard.dropped += n - keep;
    }

    Ok(())
}
