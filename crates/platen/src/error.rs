//! Error types for platen.
//!
//! One variant per failure class the engine can surface: caller mistakes
//! (batch state, empty input), renderer failures carrying the exit code and
//! the last diagnostic line, timeouts, and infrastructure errors from
//! spawning or staging.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors raised by the rendering engine.
#[derive(Debug, Error)]
pub enum Error {
    /// `begin_batch` was called while a batch is already active.
    #[error("a batch is already active on this engine")]
    BatchAlreadyActive,

    /// `end_batch` was called with no active batch.
    #[error("no batch is active on this engine")]
    BatchNotActive,

    /// A render call was made with an empty document list.
    #[error("no input documents were provided")]
    NoInput,

    /// The renderer exited with a non-benign failure code.
    ///
    /// `diagnostic` is the last non-empty stderr line captured for the job,
    /// which for wkhtmltopdf names the failing URL or resource.
    #[error("renderer exited with code {exit_code} ({diagnostic})")]
    RendererFailure { exit_code: i32, diagnostic: String },

    /// The renderer was terminated by a signal before producing an exit code.
    #[error("renderer terminated by signal {signal} ({diagnostic})")]
    Signaled { signal: i32, diagnostic: String },

    /// The renderer did not finish within the configured timeout.
    ///
    /// The process has already been killed when this is raised.
    #[error("renderer did not finish within {0:?}")]
    Timeout(Duration),

    /// The renderer executable could not be started.
    #[error("failed to start renderer '{exe}': {source}")]
    Spawn { exe: String, source: io::Error },

    /// I/O failure while staging temp assets or talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors caused by how the engine was called rather than by
    /// the renderer or the environment.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::BatchAlreadyActive | Error::BatchNotActive | Error::NoInput
        )
    }

    /// True when the renderer itself reported the failure (as opposed to
    /// infrastructure problems around it).
    pub fn is_renderer_failure(&self) -> bool {
        matches!(self, Error::RendererFailure { .. } | Error::Signaled { .. })
    }
}
