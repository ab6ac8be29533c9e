//! The render engine facade.
//!
//! One engine instance owns the renderer configuration and, while batch
//! mode is active, the persistent renderer process. Every render call runs
//! the same pipeline: stage temp assets, compose the argument line, invoke
//! the renderer, classify the outcome, clean staging up — cleanup always,
//! success or failure.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::args::{compose_args, JobSpec, PageSpec, STDIO_TOKEN};
use crate::error::{Error, Result};
use crate::input::{InputDocument, PageSource};
use crate::options::RenderOptions;
use crate::outcome::check_exit;
use crate::runner::batch::BatchSession;
use crate::runner::single::{run_once, SingleShotJob};
use crate::runner::LogObserver;
use crate::staging::StagingArea;

/// Renderer executable, resolved through `PATH` unless overridden.
pub const DEFAULT_RENDERER_EXE: &str = "wkhtmltopdf";

const TEMP_PREFIX: &str = "platen-";

/// Where a rendered PDF goes. Exactly one per render call.
pub enum Destination<'a> {
    /// Stream the PDF into a writer: directly from the renderer's stdout in
    /// single-shot mode, copied from a staged output file in batch mode.
    Writer(&'a mut dyn Write),
    /// Have the renderer write this file itself.
    File(&'a Path),
}

/// Drives the external renderer.
///
/// Single-shot calls and batch mode are mutually exclusive per instance:
/// while a batch is active, every render call is routed through the one
/// persistent process.
pub struct RenderEngine {
    exe: String,
    temp_dir: Option<PathBuf>,
    options: RenderOptions,
    observer: Option<LogObserver>,
    batch_active: bool,
    session: Option<BatchSession>,
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine {
    pub fn new() -> Self {
        RenderEngine {
            exe: DEFAULT_RENDERER_EXE.to_string(),
            temp_dir: None,
            options: RenderOptions::default(),
            observer: None,
            batch_active: false,
            session: None,
        }
    }

    /// Sets the renderer executable (name on `PATH` or explicit path).
    pub fn with_exe(mut self, exe: impl Into<String>) -> Self {
        self.exe = exe.into();
        self
    }

    /// Overrides the staging directory; created on demand.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs the stderr line observer. It is invoked from the background
    /// reader thread and must not block.
    pub fn with_observer(mut self, observer: LogObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn exe(&self) -> &str {
        &self.exe
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Mutable access to the options. Mutating while a batch job is in
    /// flight on another thread is undefined; between jobs it is fine.
    pub fn options_mut(&mut self) -> &mut RenderOptions {
        &mut self.options
    }

    pub fn batch_active(&self) -> bool {
        self.batch_active
    }

    /// Renders inline HTML to an in-memory PDF.
    pub fn generate(&mut self, html: &str, cover_html: Option<&str>) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.generate_to_writer(html, cover_html, &mut buffer)?;
        Ok(buffer)
    }

    /// Renders inline HTML into `dest`, returning the byte count.
    pub fn generate_to_writer(
        &mut self,
        html: &str,
        cover_html: Option<&str>,
        dest: &mut dyn Write,
    ) -> Result<u64> {
        let docs = [InputDocument::from_html(html)];
        self.generate_from_documents(&docs, cover_html, Destination::Writer(dest))
    }

    /// Renders inline HTML to a file the renderer writes directly.
    pub fn generate_to_file(
        &mut self,
        html: &str,
        cover_html: Option<&str>,
        path: &Path,
    ) -> Result<()> {
        let docs = [InputDocument::from_html(html)];
        self.generate_from_documents(&docs, cover_html, Destination::File(path))?;
        Ok(())
    }

    /// Renders an ordered set of documents into one PDF. Returns the output
    /// byte count.
    pub fn generate_from_documents(
        &mut self,
        docs: &[InputDocument],
        cover_html: Option<&str>,
        dest: Destination<'_>,
    ) -> Result<u64> {
        if docs.is_empty() {
            return Err(Error::NoInput);
        }
        let mut staging = StagingArea::new(self.temp_dir.as_deref(), TEMP_PREFIX)?;
        let result = self.render_staged(docs, cover_html, dest, &mut staging);
        staging.cleanup();
        result
    }

    /// Enables batch mode. The persistent renderer starts lazily on the
    /// first job, so enabling an unused batch costs nothing.
    pub fn begin_batch(&mut self) -> Result<()> {
        if self.batch_active {
            return Err(Error::BatchAlreadyActive);
        }
        self.batch_active = true;
        debug!("batch mode enabled");
        Ok(())
    }

    /// Ends batch mode, shutting the persistent renderer down if it was
    /// ever started.
    pub fn end_batch(&mut self) -> Result<()> {
        if !self.batch_active {
            return Err(Error::BatchNotActive);
        }
        self.batch_active = false;
        if let Some(session) = self.session.take() {
            session.end()?;
        }
        debug!("batch mode ended");
        Ok(())
    }

    fn render_staged(
        &mut self,
        docs: &[InputDocument],
        cover_html: Option<&str>,
        dest: Destination<'_>,
        staging: &mut StagingArea,
    ) -> Result<u64> {
        let header_path = match &self.options.header_html {
            Some(html) => Some(staging.stage_header_footer(html)?),
            None => None,
        };
        let footer_path = match &self.options.footer_html {
            Some(html) => Some(staging.stage_header_footer(html)?),
            None => None,
        };
        let cover_path = match cover_html {
            Some(html) => Some(staging.stage(html)?),
            None => None,
        };

        // A lone inline document is piped over stdin in single-shot mode;
        // all other inline content goes through staged files (the batch
        // stdin channel carries argument lines, not documents).
        let pipe_inline = !self.batch_active
            && docs.len() == 1
            && matches!(docs[0].source, PageSource::Inline(_));
        let stdin_payload: Option<&str> = if pipe_inline {
            match &docs[0].source {
                PageSource::Inline(html) => Some(html.as_str()),
                _ => None,
            }
        } else {
            None
        };

        let mut pages = Vec::with_capacity(docs.len());
        for doc in docs {
            let source = match &doc.source {
                PageSource::Path(path) => path.display().to_string(),
                PageSource::Url(url) => url.clone(),
                PageSource::Inline(html) => {
                    if pipe_inline {
                        STDIO_TOKEN.to_string()
                    } else {
                        staging.stage(html)?.display().to_string()
                    }
                }
            };
            let doc_header = match &doc.header_html {
                Some(html) => Some(staging.stage_header_footer(html)?),
                None => None,
            };
            let doc_footer = match &doc.footer_html {
                Some(html) => Some(staging.stage_header_footer(html)?),
                None => None,
            };
            pages.push(PageSpec {
                source,
                extra_args: doc.extra_args.clone(),
                header_path: doc_header,
                footer_path: doc_footer,
            });
        }

        let job = JobSpec {
            cover_path,
            header_path,
            footer_path,
            pages,
            output: String::new(),
        };

        if self.batch_active {
            self.render_batch(job, dest, staging)
        } else {
            self.render_single(job, stdin_payload, dest)
        }
    }

    fn render_single(
        &mut self,
        mut job: JobSpec,
        stdin_payload: Option<&str>,
        dest: Destination<'_>,
    ) -> Result<u64> {
        match dest {
            Destination::Writer(writer) => {
                job.output = STDIO_TOKEN.to_string();
                let line = compose_args(&self.options, &job);
                let run = run_once(
                    SingleShotJob {
                        exe: &self.exe,
                        args_line: &line,
                        stdin_payload,
                        timeout: self.options.timeout,
                        observer: self.observer.clone(),
                    },
                    Some(writer),
                )?;
                check_exit(
                    run.status,
                    &run.last_line,
                    run.bytes_streamed > 0,
                    &self.options.benign_stderr_lines,
                )?;
                Ok(run.bytes_streamed)
            }
            Destination::File(path) => {
                job.output = path.display().to_string();
                let line = compose_args(&self.options, &job);
                let run = run_once(
                    SingleShotJob {
                        exe: &self.exe,
                        args_line: &line,
                        stdin_payload,
                        timeout: self.options.timeout,
                        observer: self.observer.clone(),
                    },
                    None,
                )?;
                let written = file_len(path);
                check_exit(
                    run.status,
                    &run.last_line,
                    written > 0,
                    &self.options.benign_stderr_lines,
                )?;
                Ok(written)
            }
        }
    }

    fn render_batch(
        &mut self,
        mut job: JobSpec,
        dest: Destination<'_>,
        staging: &mut StagingArea,
    ) -> Result<u64> {
        match dest {
            Destination::File(path) => {
                job.output = path.display().to_string();
                let line = compose_args(&self.options, &job);
                self.batch_submit(&line, path)?;
                Ok(file_len(path))
            }
            Destination::Writer(writer) => {
                let staged_out = staging.reserve();
                job.output = staged_out.display().to_string();
                let line = compose_args(&self.options, &job);
                self.batch_submit(&line, &staged_out)?;
                let bytes = fs::read(&staged_out)?;
                writer.write_all(&bytes)?;
                writer.flush()?;
                Ok(bytes.len() as u64)
            }
        }
    }

    /// Feeds one job to the persistent renderer, starting it on first use
    /// and transparently restarting it if it died since the last job.
    fn batch_submit(&mut self, line: &str, output: &Path) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            if !session.is_alive() {
                warn!("persistent renderer exited unexpectedly; restarting");
                self.session = None;
            }
        }
        if self.session.is_none() {
            let exe = self.exe.clone();
            self.session = Some(BatchSession::start(&exe, self.observer.clone())?);
        }
        match self.session.as_mut() {
            Some(session) => session.submit(
                line,
                output,
                self.options.timeout,
                &self.options.benign_stderr_lines,
            ),
            None => Err(Error::BatchNotActive),
        }
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
