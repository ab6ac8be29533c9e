//! Input documents for a render job.

use std::path::{Path, PathBuf};

/// Where one document's HTML comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// A file on disk, passed to the renderer by path.
    Path(PathBuf),
    /// A URL fetched by the renderer itself.
    Url(String),
    /// HTML held in memory; piped over stdin when the job consists of
    /// exactly this one document in single-shot mode, staged to a temp file
    /// otherwise.
    Inline(String),
}

/// One document of a render job, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDocument {
    pub source: PageSource,
    /// Header HTML overriding the global template for this document only.
    pub header_html: Option<String>,
    /// Footer HTML overriding the global template for this document only.
    pub footer_html: Option<String>,
    /// Raw renderer arguments overriding the global page arguments for this
    /// document only.
    pub extra_args: Option<String>,
}

impl InputDocument {
    fn new(source: PageSource) -> Self {
        InputDocument {
            source,
            header_html: None,
            footer_html: None,
            extra_args: None,
        }
    }

    /// Document backed by a file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        InputDocument::new(PageSource::Path(path.as_ref().to_path_buf()))
    }

    /// Document fetched from a URL by the renderer.
    pub fn from_url(url: impl Into<String>) -> Self {
        InputDocument::new(PageSource::Url(url.into()))
    }

    /// Document from in-memory HTML.
    pub fn from_html(html: impl Into<String>) -> Self {
        InputDocument::new(PageSource::Inline(html.into()))
    }

    pub fn with_header_html(mut self, html: impl Into<String>) -> Self {
        self.header_html = Some(html.into());
        self
    }

    pub fn with_footer_html(mut self, html: impl Into<String>) -> Self {
        self.footer_html = Some(html.into());
        self
    }

    pub fn with_extra_args(mut self, args: impl Into<String>) -> Self {
        self.extra_args = Some(args.into());
        self
    }
}
