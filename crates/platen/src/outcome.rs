//! Exit outcome classification.
//!
//! The renderer treats many soft network conditions (broken image links,
//! unreachable remote resources) as non-fatal: it still emits a usable PDF
//! but exits with code 1. Failing every non-zero exit would reject valid
//! output, so code 1 is accepted when the last stderr line matches a known
//! benign message and output was actually produced.

use std::process::ExitStatus;

use tracing::debug;

use crate::error::{Error, Result};

/// Built-in benign stderr lines. Trimmed exact match. Extendable per
/// deployment through `RenderOptions::benign_stderr_lines`.
pub const BENIGN_STDERR_LINES: &[&str] = &[
    "Exit with code 1 due to network error: ContentNotFoundError",
    "Exit with code 1 due to network error: ProtocolUnknownError",
    "Exit with code 1 due to network error: HostNotFoundError",
    "Exit with code 1 due to network error: ContentOperationNotPermittedError",
    "Exit with code 1 due to network error: UnknownContentError",
    "QFont::setPixelSize: Pixel size <= 0",
];

/// Maps a process exit to success or a typed failure.
///
/// Exit 0 is success unconditionally. Exit 1 is success only when the
/// trimmed `last_line` exactly matches an entry of `benign` and
/// `output_produced` is true. Every other exit code fails with the code and
/// the last diagnostic line; termination by signal is its own variant.
pub fn check_exit(
    status: ExitStatus,
    last_line: &str,
    output_produced: bool,
    benign: &[String],
) -> Result<()> {
    let trimmed = last_line.trim();
    let diagnostic = || {
        if trimmed.is_empty() {
            "no diagnostic output captured".to_string()
        } else {
            trimmed.to_string()
        }
    };

    match status.code() {
        Some(0) => Ok(()),
        Some(1) => {
            if output_produced && benign.iter().any(|b| b == trimmed) {
                debug!(line = trimmed, "exit code 1 matched benign stderr line");
                Ok(())
            } else {
                Err(Error::RendererFailure {
                    exit_code: 1,
                    diagnostic: diagnostic(),
                })
            }
        }
        Some(code) => Err(Error::RendererFailure {
            exit_code: code,
            diagnostic: diagnostic(),
        }),
        None => Err(signal_error(status, diagnostic())),
    }
}

#[cfg(unix)]
fn signal_error(status: ExitStatus, diagnostic: String) -> Error {
    use std::os::unix::process::ExitStatusExt;
    Error::Signaled {
        signal: status.signal().unwrap_or(0),
        diagnostic,
    }
}

#[cfg(not(unix))]
fn signal_error(_status: ExitStatus, diagnostic: String) -> Error {
    Error::RendererFailure {
        exit_code: -1,
        diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::default_benign_stderr_lines;

    #[cfg(unix)]
    mod unix_tests {
        use super::*;
        use std::os::unix::process::ExitStatusExt;

        fn exited(code: i32) -> ExitStatus {
            ExitStatus::from_raw(code << 8)
        }

        fn signaled(signal: i32) -> ExitStatus {
            ExitStatus::from_raw(signal)
        }

        #[test]
        fn test_exit_zero_is_success_regardless_of_output() {
            let benign = default_benign_stderr_lines();
            assert!(check_exit(exited(0), "", true, &benign).is_ok());
            assert!(check_exit(exited(0), "", false, &benign).is_ok());
            assert!(check_exit(exited(0), "random warning", false, &benign).is_ok());
        }

        #[test]
        fn test_exit_one_with_benign_line_and_output_is_success() {
            let benign = default_benign_stderr_lines();
            let line = "QFont::setPixelSize: Pixel size <= 0";
            assert!(check_exit(exited(1), line, true, &benign).is_ok());
        }

        #[test]
        fn test_benign_match_trims_whitespace() {
            let benign = default_benign_stderr_lines();
            let line = "  Exit with code 1 due to network error: HostNotFoundError \n";
            assert!(check_exit(exited(1), line, true, &benign).is_ok());
        }

        #[test]
        fn test_exit_one_without_output_fails_even_when_benign() {
            let benign = default_benign_stderr_lines();
            let line = "QFont::setPixelSize: Pixel size <= 0";
            match check_exit(exited(1), line, false, &benign) {
                Err(Error::RendererFailure { exit_code: 1, .. }) => {}
                other => panic!("expected renderer failure, got: {other:?}"),
            }
        }

        #[test]
        fn test_exit_one_with_unrelated_line_fails() {
            let benign = default_benign_stderr_lines();
            match check_exit(exited(1), "Error: Failed loading page", true, &benign) {
                Err(Error::RendererFailure {
                    exit_code: 1,
                    diagnostic,
                }) => {
                    assert_eq!(diagnostic, "Error: Failed loading page");
                }
                other => panic!("expected renderer failure, got: {other:?}"),
            }
        }

        #[test]
        fn test_other_exit_codes_fail_with_code_and_line() {
            let benign = default_benign_stderr_lines();
            match check_exit(exited(137), "killed?", true, &benign) {
                Err(Error::RendererFailure {
                    exit_code: 137,
                    diagnostic,
                }) => assert_eq!(diagnostic, "killed?"),
                other => panic!("expected renderer failure, got: {other:?}"),
            }
        }

        #[test]
        fn test_empty_diagnostic_gets_placeholder() {
            let benign = default_benign_stderr_lines();
            match check_exit(exited(2), "   ", true, &benign) {
                Err(Error::RendererFailure { diagnostic, .. }) => {
                    assert_eq!(diagnostic, "no diagnostic output captured");
                }
                other => panic!("expected renderer failure, got: {other:?}"),
            }
        }

        #[test]
        fn test_signal_termination_is_its_own_variant() {
            let benign = default_benign_stderr_lines();
            match check_exit(signaled(9), "", true, &benign) {
                Err(Error::Signaled { signal: 9, .. }) => {}
                other => panic!("expected signaled variant, got: {other:?}"),
            }
        }

        #[test]
        fn test_allow_list_is_extendable() {
            let mut benign = default_benign_stderr_lines();
            benign.push("Warning: custom deployment quirk".to_string());
            assert!(check_exit(exited(1), "Warning: custom deployment quirk", true, &benign).is_ok());
            // The extension must not loosen matching for other lines
            assert!(check_exit(exited(1), "Warning: other quirk", true, &benign).is_err());
        }
    }

    #[test]
    fn test_default_allow_list_contents() {
        assert_eq!(BENIGN_STDERR_LINES.len(), 6);
        assert!(BENIGN_STDERR_LINES
            .contains(&"Exit with code 1 due to network error: ContentNotFoundError"));
        assert!(BENIGN_STDERR_LINES.contains(&"QFont::setPixelSize: Pixel size <= 0"));
    }
}
