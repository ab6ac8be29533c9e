//! Fake renderer harness for integration tests.
//!
//! Installs a POSIX shell script that speaks the renderer's CLI grammar in
//! both invocation modes (argv and `--read-args-from-stdin`) and records
//! every process start and every job line in side files. Behavior per job is
//! controlled by `--fake-*` tokens smuggled in through the extra-args
//! options:
//!
//! - `--fake-exit N`            exit with code N after the job
//! - `--fake-stderr-plain MSG`  emit a single-token message on stderr
//! - `--fake-stderr-netfail`    emit the benign ContentNotFoundError line
//! - `--fake-stderr-font`       emit the benign QFont pixel-size line
//! - `--fake-sleep N`           sleep N seconds before producing output
//! - `--fake-no-output`         skip writing the output

#![allow(dead_code)]
// Test support intentionally provides more helpers than any single test uses.

use std::fs;
use std::path::{Path, PathBuf};

const SCRIPT: &str = r#"#!/bin/sh
# Fake wkhtmltopdf for integration tests.
set -f
STARTS='@STARTS@'
JOBS='@JOBS@'

echo start >> "$STARTS"

strip() {
  v=$1
  v=${v%\"}
  v=${v#\"}
  printf '%s' "$v"
}

run_job() {
  exit_code=0
  stderr_msg=
  sleep_s=0
  no_output=0
  out=
  inputs=
  printf '%s\n' "$*" >> "$JOBS"
  while [ $# -gt 0 ]; do
    tok=$(strip "$1")
    case "$tok" in
      --fake-exit) exit_code=$(strip "$2"); shift 2 ;;
      --fake-stderr-plain) stderr_msg=$(strip "$2"); shift 2 ;;
      --fake-stderr-netfail) stderr_msg='Exit with code 1 due to network error: ContentNotFoundError'; shift ;;
      --fake-stderr-font) stderr_msg='QFont::setPixelSize: Pixel size <= 0'; shift ;;
      --fake-sleep) sleep_s=$(strip "$2"); shift 2 ;;
      --fake-no-output) no_output=1; shift ;;
      -q|-l|-g|toc) shift ;;
      cover|-O|-s|-T|-B|-L|-R|--page-width|--page-height|--zoom|--toc-header-text|--header-html|--footer-html) shift 2 ;;
      *)
        if [ -n "$out" ]; then
          inputs="$inputs $out"
        fi
        out=$tok
        shift ;;
    esac
  done
  case " $inputs " in
    *" - "*) cat > /dev/null ;;
  esac
  if [ "$sleep_s" != 0 ]; then
    sleep "$sleep_s"
  fi
  if [ -n "$stderr_msg" ]; then
    echo "$stderr_msg" >&2
  fi
  if [ "$no_output" = 0 ] && [ -n "$out" ]; then
    if [ "$out" = - ]; then
      printf '%%PDF-1.4 fake renderer output\n'
    else
      printf '%%PDF-1.4 fake renderer output\n' > "$out"
    fi
  fi
  return "$exit_code"
}

if [ "$1" = --read-args-from-stdin ]; then
  while IFS= read -r line; do
    # shellcheck disable=SC2086
    set -- $line
    run_job "$@"
    rc=$?
    if [ "$rc" -ne 0 ]; then
      exit "$rc"
    fi
  done
  echo eof >> "$STARTS"
  exit 0
else
  run_job "$@"
  exit $?
fi
"#;

/// A fake renderer installed in a test-owned directory.
pub struct FakeRenderer {
    exe: PathBuf,
    starts: PathBuf,
    jobs: PathBuf,
}

impl FakeRenderer {
    /// Writes the script into `dir` and makes it executable.
    pub fn install(dir: &Path) -> FakeRenderer {
        let exe = dir.join("fake-wkhtmltopdf");
        let starts = dir.join("starts.log");
        let jobs = dir.join("jobs.log");
        let body = SCRIPT
            .replace("@STARTS@", &starts.display().to_string())
            .replace("@JOBS@", &jobs.display().to_string());
        fs::write(&exe, body).expect("fake renderer script should be writable");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&exe, fs::Permissions::from_mode(0o755))
                .expect("fake renderer script should be chmoddable");
        }
        FakeRenderer { exe, starts, jobs }
    }

    pub fn exe(&self) -> &str {
        self.exe.to_str().expect("script path should be utf-8")
    }

    /// One entry per process start, plus `eof` when a batch process reached
    /// end of its stdin.
    pub fn starts(&self) -> Vec<String> {
        read_lines(&self.starts)
    }

    /// Number of processes started so far.
    pub fn start_count(&self) -> usize {
        self.starts().iter().filter(|l| *l == "start").count()
    }

    /// The argument line of every job handled, in order.
    pub fn jobs(&self) -> Vec<String> {
        read_lines(&self.jobs)
    }

    pub fn job_count(&self) -> usize {
        self.jobs().len()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}
