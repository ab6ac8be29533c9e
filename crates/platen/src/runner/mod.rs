//! Process supervision.
//!
//! Two mutually exclusive invocation protocols: [`single`] runs one renderer
//! process per job; [`batch`] keeps one renderer alive and feeds it one
//! argument line per job over stdin. Shared plumbing here: the stderr tail
//! thread, SIGTERM/SIGKILL escalation, and the documented poll intervals.

pub mod batch;
pub mod single;

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Callback receiving every non-empty renderer stderr line.
///
/// Invoked from the background reader thread. It must not block: a slow
/// observer stalls the diagnostic pipe and, eventually, the renderer.
pub type LogObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Exit poll interval for single-shot calls.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll interval for batch exit-or-output detection.
pub const BATCH_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Poll interval while waiting for a batch output file to unlock.
pub const UNLOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Unlock wait bound applied when no job timeout is configured.
pub const DEFAULT_UNLOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Grace period between SIGTERM and SIGKILL.
pub(crate) const SIGTERM_GRACE_MS: u64 = 500;

/// Tails a stderr pipe line by line. Every non-empty line overwrites the
/// shared last-line slot, then goes to the observer. Runs until EOF, which
/// arrives when the process exits.
pub(crate) fn spawn_stderr_reader(
    pipe: ChildStderr,
    last_line: Arc<Mutex<String>>,
    observer: Option<LogObserver>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(mut guard) = last_line.lock() {
                guard.clear();
                guard.push_str(&line);
            }
            if let Some(observer) = &observer {
                observer(&line);
            }
        }
    })
}

/// Snapshot of the shared last-line slot, tolerating a poisoned lock.
pub(crate) fn read_last_line(last_line: &Arc<Mutex<String>>) -> String {
    match last_line.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Puts the renderer in its own process group so termination reaches any
/// helper processes it spawned (they would otherwise keep the stderr pipe
/// open past the kill).
#[cfg(unix)]
pub(crate) fn isolate_process_group(command: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn isolate_process_group(_command: &mut std::process::Command) {}

/// Terminates a renderer process: SIGTERM to its process group, a short
/// grace window, then SIGKILL. Always reaps the child before returning.
#[cfg(unix)]
pub(crate) fn kill_with_grace(child: &mut Child) {
    let group = -(child.id() as libc::pid_t);
    if unsafe { libc::kill(group, libc::SIGTERM) } != 0 {
        debug!(pid = child.id(), "SIGTERM delivery failed; process likely already gone");
    }
    let deadline = Instant::now() + Duration::from_millis(SIGTERM_GRACE_MS);
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(_) => break,
        }
    }
    if unsafe { libc::kill(group, libc::SIGKILL) } != 0 {
        warn!(pid = child.id(), "SIGKILL delivery failed");
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
pub(crate) fn kill_with_grace(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to kill renderer process");
    }
    let _ = child.wait();
}
