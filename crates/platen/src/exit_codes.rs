//! Exit codes for the platen CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing:
//! - 0-9: operational outcomes (0 success, 1 renderer failure, 2 timeout)
//! - 10-19: user/argument errors (recoverable by fixing the invocation)
//! - 20-29: I/O and internal errors
//!
//! These are a stable contract for automation; changes require a major
//! version bump.

use crate::error::Error;

/// Exit codes for platen invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every job rendered successfully.
    Success = 0,

    /// The renderer reported a failure (non-benign exit) for at least one
    /// job.
    RendererError = 1,

    /// At least one job exceeded its execution timeout.
    Timeout = 2,

    /// Invalid arguments or engine misuse.
    ArgsError = 10,

    /// I/O failure or internal error.
    InternalError = 20,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_error(self) -> bool {
        self != ExitCode::Success
    }

    /// Stable error code name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Success => "OK",
            ExitCode::RendererError => "ERR_RENDERER",
            ExitCode::Timeout => "ERR_TIMEOUT",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }

    /// Of two outcomes, the one that should win the process exit code.
    /// Severity follows the numeric ordering.
    pub fn worst(self, other: ExitCode) -> ExitCode {
        if other.as_i32() > self.as_i32() {
            other
        } else {
            self
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::BatchAlreadyActive | Error::BatchNotActive | Error::NoInput => {
                ExitCode::ArgsError
            }
            Error::RendererFailure { .. } | Error::Signaled { .. } => ExitCode::RendererError,
            Error::Timeout(_) => ExitCode::Timeout,
            Error::Spawn { .. } | Error::Io(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_numeric_values_are_stable() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::RendererError.as_i32(), 1);
        assert_eq!(ExitCode::Timeout.as_i32(), 2);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(ExitCode::from(&Error::NoInput), ExitCode::ArgsError);
        assert_eq!(
            ExitCode::from(&Error::BatchAlreadyActive),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::from(&Error::RendererFailure {
                exit_code: 2,
                diagnostic: String::new()
            }),
            ExitCode::RendererError
        );
        assert_eq!(
            ExitCode::from(&Error::Timeout(Duration::from_secs(1))),
            ExitCode::Timeout
        );
        assert_eq!(
            ExitCode::from(&Error::Io(std::io::Error::other("x"))),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_worst_follows_severity_ordering() {
        assert_eq!(
            ExitCode::Success.worst(ExitCode::RendererError),
            ExitCode::RendererError
        );
        assert_eq!(
            ExitCode::Timeout.worst(ExitCode::RendererError),
            ExitCode::Timeout
        );
        assert_eq!(
            ExitCode::InternalError.worst(ExitCode::ArgsError),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_display_includes_name_and_code() {
        assert_eq!(ExitCode::Timeout.to_string(), "ERR_TIMEOUT (2)");
        assert_eq!(ExitCode::Success.to_string(), "OK (0)");
    }
}
