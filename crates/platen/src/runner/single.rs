//! Single-shot invocation: one renderer process per render call.
//!
//! Pipe rules: stderr is always captured for classification; stdin is piped
//! only when inline content is fed to the renderer; stdout is piped only
//! when the destination is a stream (for file destinations the renderer
//! writes the output itself). The call thread feeds stdin, then polls
//! `try_wait` at [`EXIT_POLL_INTERVAL`], draining stdout non-blockingly in
//! the same loop, bounded by the configured timeout.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::args::split_args;
use crate::error::{Error, Result};

use super::{
    isolate_process_group, kill_with_grace, read_last_line, spawn_stderr_reader, LogObserver,
    EXIT_POLL_INTERVAL,
};

/// One renderer invocation, ready to run.
pub(crate) struct SingleShotJob<'a> {
    pub exe: &'a str,
    pub args_line: &'a str,
    /// Inline HTML written to the child's stdin when the job's only
    /// document is piped.
    pub stdin_payload: Option<&'a str>,
    pub timeout: Option<Duration>,
    pub observer: Option<LogObserver>,
}

/// What the process left behind, for outcome classification.
#[derive(Debug)]
pub(crate) struct RunOutput {
    pub status: ExitStatus,
    /// Bytes copied from the child's stdout into the stream destination.
    pub bytes_streamed: u64,
    /// Last non-empty stderr line.
    pub last_line: String,
}

/// Runs one renderer process to completion and reaps it.
///
/// On any failure path the process is killed before the error is returned;
/// a timeout kills with SIGTERM/SIGKILL escalation and raises
/// [`Error::Timeout`].
pub(crate) fn run_once(
    job: SingleShotJob<'_>,
    stream_to: Option<&mut dyn Write>,
) -> Result<RunOutput> {
    let tokens = split_args(job.args_line);
    debug!(exe = job.exe, args = job.args_line, "starting renderer");

    let mut command = Command::new(job.exe);
    command
        .args(&tokens)
        .stdin(if job.stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(if stream_to.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::piped());
    isolate_process_group(&mut command);
    let mut child = command.spawn().map_err(|source| Error::Spawn {
        exe: job.exe.to_string(),
        source,
    })?;

    let last_line = Arc::new(Mutex::new(String::new()));
    let reader = child
        .stderr
        .take()
        .map(|pipe| spawn_stderr_reader(pipe, Arc::clone(&last_line), job.observer.clone()));

    let result = drive(&mut child, job.stdin_payload, stream_to, job.timeout);

    // The reader ends at stderr EOF, which the exit (or kill) above
    // guarantees; joining before the snapshot makes the last line complete.
    if let Some(handle) = reader {
        let _ = handle.join();
    }

    let (status, bytes_streamed) = result?;
    Ok(RunOutput {
        status,
        bytes_streamed,
        last_line: read_last_line(&last_line),
    })
}

/// Feeds stdin, supervises the wait loop, drains stdout. Kills the child on
/// every error path so the caller never sees a live orphan.
fn drive(
    child: &mut Child,
    stdin_payload: Option<&str>,
    mut stream_to: Option<&mut dyn Write>,
    timeout: Option<Duration>,
) -> Result<(ExitStatus, u64)> {
    // Feed inline content first; the renderer consumes its whole input
    // before emitting output.
    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            match stdin
                .write_all(payload.as_bytes())
                .and_then(|()| stdin.flush())
            {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    // A dying renderer closes the pipe early; its exit code
                    // is the more useful signal, so keep supervising.
                    debug!("renderer closed stdin early");
                }
                Err(e) => {
                    kill_with_grace(child);
                    return Err(e.into());
                }
            }
        }
        // Dropping the handle closes the pipe and signals end-of-input.
    }

    let mut stdout_pipe = child.stdout.take();
    if let Some(pipe) = &stdout_pipe {
        if let Err(e) = set_nonblocking(pipe) {
            kill_with_grace(child);
            return Err(e.into());
        }
    }

    let mut bytes_streamed: u64 = 0;
    let mut buf = [0u8; 8192];
    let deadline = timeout.map(|t| (Instant::now() + t, t));

    let status = loop {
        let mut drained = false;
        if let (Some(pipe), Some(dest)) = (stdout_pipe.as_mut(), stream_to.as_mut()) {
            match drain_available(pipe, &mut **dest, &mut buf) {
                Ok(n) => {
                    bytes_streamed += n;
                    drained = n > 0;
                }
                Err(e) => {
                    kill_with_grace(child);
                    return Err(e.into());
                }
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                kill_with_grace(child);
                return Err(e.into());
            }
        }

        if let Some((at, t)) = deadline {
            if Instant::now() >= at {
                debug!(timeout_ms = t.as_millis() as u64, "renderer timed out");
                kill_with_grace(child);
                return Err(Error::Timeout(t));
            }
        }

        if !drained {
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    };

    // The pipe may still hold output buffered before exit.
    if let (Some(pipe), Some(dest)) = (stdout_pipe.as_mut(), stream_to.as_mut()) {
        bytes_streamed += drain_available(pipe, &mut **dest, &mut buf)?;
        dest.flush()?;
    }

    Ok((status, bytes_streamed))
}

/// Copies whatever the pipe currently holds into `dest`. Returns the byte
/// count; never blocks (the pipe is in non-blocking mode).
fn drain_available(
    pipe: &mut ChildStdout,
    dest: &mut dyn Write,
    buf: &mut [u8],
) -> io::Result<u64> {
    let mut total = 0u64;
    loop {
        match pipe.read(buf) {
            Ok(0) => break,
            Ok(n) => {
                dest.write_all(&buf[..n])?;
                total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(unix)]
fn set_nonblocking(pipe: &ChildStdout) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = pipe.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_nonblocking(_pipe: &ChildStdout) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "streamed output requires unix pipes; use a file destination",
    ))
}
