//! Supervised HTML-to-PDF rendering through an external
//! wkhtmltopdf-compatible renderer.
//!
//! The engine hides process lifecycle, argument composition, temp-file
//! plumbing, and failure classification behind a narrow facade: hand it HTML
//! (optionally with a cover page, header/footer templates, and per-document
//! overrides), get back PDF bytes or a written file.
//!
//! # Modes
//!
//! - *Single-shot*: one renderer process per call, started and reaped inside
//!   the call.
//! - *Batch*: [`RenderEngine::begin_batch`] switches the engine to one
//!   persistent renderer fed one job at a time over its stdin, amortizing
//!   process startup across many jobs; [`RenderEngine::end_batch`] shuts it
//!   down.
//!
//! # Example
//!
//! ```no_run
//! use platen::{RenderEngine, RenderOptions, Orientation};
//!
//! let mut options = RenderOptions::default();
//! options.orientation = Orientation::Landscape;
//!
//! let mut engine = RenderEngine::new().with_options(options);
//! let pdf = engine.generate("<h1>Invoice #42</h1>", None)?;
//! std::fs::write("invoice.pdf", pdf)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Renderer stderr is tailed line by line; the last line feeds outcome
//! classification (a small allow-list of benign warnings keeps exit code 1
//! from failing calls that still produced output), and every line can be
//! observed through [`RenderEngine::with_observer`].
//!
//! The binary entry point is in `main.rs`.

pub mod args;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod input;
pub mod logging;
pub mod options;
pub mod outcome;
pub mod runner;
pub mod staging;

pub use engine::{Destination, RenderEngine, DEFAULT_RENDERER_EXE};
pub use error::{Error, Result};
pub use input::{InputDocument, PageSource};
pub use options::{Orientation, PageMargins, PageSize, RenderOptions};
pub use outcome::BENIGN_STDERR_LINES;
pub use runner::LogObserver;
