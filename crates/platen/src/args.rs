//! Renderer argument composition.
//!
//! The renderer's CLI grammar is positional: page-scoped flags apply to the
//! input path they textually follow, and the output token comes last. The
//! composer therefore produces one flat, quoted argument string rather than
//! a structured argv — the same line is written verbatim to the persistent
//! process's stdin in batch mode, and tokenized with [`split_args`] for
//! `std::process::Command` in single-shot mode.

use std::path::Path;

use crate::options::{RenderOptions, DEFAULT_ZOOM};

/// Token standing for stdin (as a source) or stdout (as the destination).
pub const STDIO_TOKEN: &str = "-";

/// One document block of a composed job. `source` is a path, a URL, or
/// [`STDIO_TOKEN`]; header/footer paths point at staged wrapper pages.
#[derive(Debug, Clone, Default)]
pub struct PageSpec {
    pub source: String,
    pub extra_args: Option<String>,
    pub header_path: Option<std::path::PathBuf>,
    pub footer_path: Option<std::path::PathBuf>,
}

/// A render job with all temp assets resolved to paths, ready to compose.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    pub cover_path: Option<std::path::PathBuf>,
    pub header_path: Option<std::path::PathBuf>,
    pub footer_path: Option<std::path::PathBuf>,
    pub pages: Vec<PageSpec>,
    /// Destination path, or [`STDIO_TOKEN`] to stream over stdout.
    pub output: String,
}

/// Builds the renderer argument line for one job.
///
/// Pure and deterministic: the same options and job always yield a
/// byte-identical string. Emission order is part of the contract:
///
/// 1. global switches (`-q`, `-O`, `-s`, `-l`, `-g`)
/// 2. margins (`-T`, `-B`, `-L`, `-R`) and explicit page dimensions
///    (`--page-width`, `--page-height`; their presence suppresses `-s`)
/// 3. global header/footer pages
/// 4. caller-supplied global arguments, verbatim
/// 5. cover block
/// 6. toc block
/// 7. one block per document in order: source, document arguments (falling
///    back to the global page arguments), document header/footer pages,
///    `--zoom` when the factor is not 1.0
/// 8. the output token
pub fn compose_args(options: &RenderOptions, job: &JobSpec) -> String {
    let mut line = String::new();

    if options.quiet {
        push_token(&mut line, "-q");
    }
    if let Some(token) = options.orientation.renderer_token() {
        push_token(&mut line, &format!("-O {token}"));
    }
    let explicit_size = options.page_width.is_some() || options.page_height.is_some();
    if !explicit_size {
        if let Some(token) = options.page_size.renderer_token() {
            push_token(&mut line, &format!("-s {token}"));
        }
    }
    if options.low_quality {
        push_token(&mut line, "-l");
    }
    if options.grayscale {
        push_token(&mut line, "-g");
    }

    if let Some(mm) = options.margins.top {
        push_token(&mut line, &format!("-T {mm}"));
    }
    if let Some(mm) = options.margins.bottom {
        push_token(&mut line, &format!("-B {mm}"));
    }
    if let Some(mm) = options.margins.left {
        push_token(&mut line, &format!("-L {mm}"));
    }
    if let Some(mm) = options.margins.right {
        push_token(&mut line, &format!("-R {mm}"));
    }
    if let Some(mm) = options.page_width {
        push_token(&mut line, &format!("--page-width {mm}"));
    }
    if let Some(mm) = options.page_height {
        push_token(&mut line, &format!("--page-height {mm}"));
    }

    if let Some(path) = &job.header_path {
        push_token(&mut line, &format!("--header-html {}", quote_path(path)));
    }
    if let Some(path) = &job.footer_path {
        push_token(&mut line, &format!("--footer-html {}", quote_path(path)));
    }

    if let Some(args) = &options.extra_args {
        push_token(&mut line, args);
    }

    if let Some(path) = &job.cover_path {
        push_token(&mut line, &format!("cover {}", quote_path(path)));
        if let Some(args) = &options.cover_extra_args {
            push_token(&mut line, args);
        }
    }

    if options.generate_toc {
        push_token(&mut line, "toc");
        if let Some(text) = &options.toc_header_text {
            push_token(&mut line, &format!("--toc-header-text {}", quote(text)));
        }
        if let Some(args) = &options.toc_extra_args {
            push_token(&mut line, args);
        }
    }

    let zoomed = (options.zoom - DEFAULT_ZOOM).abs() > f32::EPSILON;
    for page in &job.pages {
        if page.source == STDIO_TOKEN {
            push_token(&mut line, STDIO_TOKEN);
        } else {
            push_token(&mut line, &quote(&page.source));
        }
        match (&page.extra_args, &options.page_extra_args) {
            (Some(args), _) => push_token(&mut line, args),
            (None, Some(args)) => push_token(&mut line, args),
            (None, None) => {}
        }
        if let Some(path) = &page.header_path {
            push_token(&mut line, &format!("--header-html {}", quote_path(path)));
        }
        if let Some(path) = &page.footer_path {
            push_token(&mut line, &format!("--footer-html {}", quote_path(path)));
        }
        if zoomed {
            push_token(&mut line, &format!("--zoom {}", options.zoom));
        }
    }

    if job.output == STDIO_TOKEN {
        push_token(&mut line, STDIO_TOKEN);
    } else {
        push_token(&mut line, &quote(&job.output));
    }

    line
}

/// Double-quotes a value, backslash-escaping embedded quotes.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

fn push_token(line: &mut String, token: &str) {
    if !line.is_empty() {
        line.push(' ');
    }
    line.push_str(token);
}

/// Tokenizes a composed argument line for `std::process::Command`.
///
/// Splits on whitespace outside double quotes; `\"` inside a quoted value
/// yields a literal quote. Inverse of [`quote`] for the values the composer
/// emits.
pub fn split_args(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                pending = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        tokens.push(current);
    }
    tokens
}
