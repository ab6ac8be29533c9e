//! Persistent-batch invocation: one renderer process fed one argument line
//! per job over stdin.
//!
//! The stdin protocol emits no per-job completion signal, so each job is a
//! cooperative poll at [`BATCH_POLL_INTERVAL`] for either process exit or
//! the appearance of the job's output file, followed by an exclusive-open
//! poll until the renderer releases the file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::outcome::check_exit;

use super::{
    kill_with_grace, read_last_line, spawn_stderr_reader, LogObserver, BATCH_POLL_INTERVAL,
    DEFAULT_UNLOCK_TIMEOUT, SIGTERM_GRACE_MS, UNLOCK_POLL_INTERVAL,
};

/// Flag that switches the renderer into its stdin argument protocol.
pub(crate) const READ_ARGS_FLAG: &str = "--read-args-from-stdin";

/// An owned handle to the live persistent renderer.
///
/// Held by the engine only while batch mode is active; jobs are strictly
/// serialized on the one process.
#[derive(Debug)]
pub(crate) struct BatchSession {
    child: Child,
    stdin: Option<ChildStdin>,
    last_line: Arc<Mutex<String>>,
    reader: Option<JoinHandle<()>>,
}

impl BatchSession {
    /// Spawns the renderer in stdin-argument mode with the stderr tail
    /// running for the session's lifetime.
    pub(crate) fn start(exe: &str, observer: Option<LogObserver>) -> Result<Self> {
        let mut command = Command::new(exe);
        command
            .arg(READ_ARGS_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        super::isolate_process_group(&mut command);
        let mut child = command.spawn().map_err(|source| Error::Spawn {
            exe: exe.to_string(),
            source,
        })?;
        let last_line = Arc::new(Mutex::new(String::new()));
        let reader = child
            .stderr
            .take()
            .map(|pipe| spawn_stderr_reader(pipe, Arc::clone(&last_line), observer));
        let stdin = child.stdin.take();
        debug!(exe, pid = child.id(), "started persistent renderer");
        Ok(BatchSession {
            child,
            stdin,
            last_line,
            reader,
        })
    }

    /// Whether the persistent process is still running.
    pub(crate) fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Runs one job through the persistent process and classifies its
    /// outcome. A failed job leaves the session usable; a timeout shuts the
    /// renderer down before the error is raised.
    pub(crate) fn submit(
        &mut self,
        args_line: &str,
        output_file: &Path,
        timeout: Option<Duration>,
        benign: &[String],
    ) -> Result<()> {
        // Delete stale output so the file appearing means this job wrote it.
        match fs::remove_file(output_file) {
            Ok(()) => debug!(path = %output_file.display(), "removed stale output file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Ok(mut guard) = self.last_line.lock() {
            guard.clear();
        }

        // The stdin protocol wants forward slashes, one line per job.
        let line = args_line.replace('\\', "/");
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "renderer stdin already closed",
            )
            .into());
        };
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        debug!(args = %line, "submitted batch job");

        let deadline = timeout.map(|t| (Instant::now() + t, t));
        let exit_status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(e) => return Err(e.into()),
            }
            if file_has_bytes(output_file) {
                break None;
            }
            if let Some((at, t)) = deadline {
                if Instant::now() >= at {
                    warn!(
                        timeout_ms = t.as_millis() as u64,
                        "batch job timed out; shutting renderer down"
                    );
                    self.force_end();
                    return Err(Error::Timeout(t));
                }
            }
            thread::sleep(BATCH_POLL_INTERVAL);
        };

        let last = read_last_line(&self.last_line);
        match exit_status {
            // The process died on this job; classify with what it left.
            Some(status) => check_exit(status, &last, file_has_bytes(output_file), benign),
            // Output appeared while the process keeps running: wait for the
            // renderer to finish writing and release the file.
            None => {
                let bound = timeout.unwrap_or(DEFAULT_UNLOCK_TIMEOUT);
                if !wait_until_unlocked(output_file, bound) {
                    warn!(
                        path = %output_file.display(),
                        "output file still locked; shutting renderer down"
                    );
                    self.force_end();
                    return Err(Error::Timeout(bound));
                }
                Ok(())
            }
        }
    }

    /// Ends the batch cooperatively: closing stdin tells the renderer to
    /// exit; wait for it, then join the stderr tail.
    pub(crate) fn end(mut self) -> Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        debug!(code = status.code(), "persistent renderer exited");
        Ok(())
    }

    /// Forced shutdown: close stdin, give the renderer a short window to
    /// exit on its own, then escalate to signals.
    fn force_end(&mut self) {
        drop(self.stdin.take());
        let deadline = Instant::now() + Duration::from_millis(SIGTERM_GRACE_MS);
        while Instant::now() < deadline {
            if !self.is_alive() {
                break;
            }
            thread::sleep(BATCH_POLL_INTERVAL);
        }
        if self.is_alive() {
            kill_with_grace(&mut self.child);
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BatchSession {
    fn drop(&mut self) {
        if self.is_alive() {
            debug!("dropping live batch session; terminating renderer");
            self.force_end();
        } else if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn file_has_bytes(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Polls for exclusive access until the renderer releases the output file.
/// Returns false if it is still locked when the bound expires.
fn wait_until_unlocked(path: &Path, bound: Duration) -> bool {
    let deadline = Instant::now() + bound;
    loop {
        if probe_unlocked(path) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(UNLOCK_POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn probe_unlocked(path: &Path) -> bool {
    use std::os::unix::io::AsRawFd;

    // The advisory lock and the descriptor are released when `file` drops.
    match OpenOptions::new().write(true).open(path) {
        Ok(file) => unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 },
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn probe_unlocked(path: &Path) -> bool {
    // Sharing rules make a plain exclusive open the probe.
    OpenOptions::new().write(true).open(path).is_ok()
}
