//! Render configuration.
//!
//! [`RenderOptions`] is the process-wide configuration applied to every
//! render call unless a document overrides it. Plain public fields with a
//! [`Default`] impl backed by named constants; serde support so the CLI can
//! load the whole struct from a TOML file.
//!
//! Options are read-only for the duration of one render call. Mutating them
//! while a batch job is in flight is undefined.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default zoom factor (no scaling).
pub const DEFAULT_ZOOM: f32 = 1.0;

/// Renderer progress chatter is suppressed by default; stderr still carries
/// warnings and errors, which is all outcome classification needs.
pub const DEFAULT_QUIET: bool = true;

/// Page orientation passed to the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Leave the renderer's own default in effect.
    #[default]
    Default,
    Portrait,
    Landscape,
}

impl Orientation {
    /// Token emitted after `-O`, or `None` when the renderer default applies.
    pub fn renderer_token(&self) -> Option<&'static str> {
        match self {
            Orientation::Default => None,
            Orientation::Portrait => Some("Portrait"),
            Orientation::Landscape => Some("Landscape"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Orientation::Default),
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(format!("unknown orientation: {other}")),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Orientation::Default => "default",
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        };
        write!(f, "{s}")
    }
}

/// Named paper size passed to the renderer.
///
/// Ignored when [`RenderOptions::page_width`] or
/// [`RenderOptions::page_height`] is set explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// Leave the renderer's own default in effect.
    #[default]
    Default,
    A3,
    A4,
    A5,
    A6,
    B4,
    B5,
    Letter,
    Legal,
    Tabloid,
    Ledger,
    Executive,
    Folio,
}

impl PageSize {
    /// Token emitted after `-s`, or `None` when the renderer default applies.
    pub fn renderer_token(&self) -> Option<&'static str> {
        match self {
            PageSize::Default => None,
            PageSize::A3 => Some("A3"),
            PageSize::A4 => Some("A4"),
            PageSize::A5 => Some("A5"),
            PageSize::A6 => Some("A6"),
            PageSize::B4 => Some("B4"),
            PageSize::B5 => Some("B5"),
            PageSize::Letter => Some("Letter"),
            PageSize::Legal => Some("Legal"),
            PageSize::Tabloid => Some("Tabloid"),
            PageSize::Ledger => Some("Ledger"),
            PageSize::Executive => Some("Executive"),
            PageSize::Folio => Some("Folio"),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(PageSize::Default),
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "a6" => Ok(PageSize::A6),
            "b4" => Ok(PageSize::B4),
            "b5" => Ok(PageSize::B5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            "tabloid" => Ok(PageSize::Tabloid),
            "ledger" => Ok(PageSize::Ledger),
            "executive" => Ok(PageSize::Executive),
            "folio" => Ok(PageSize::Folio),
            other => Err(format!("unknown page size: {other}")),
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.renderer_token() {
            Some(token) => token,
            None => "default",
        };
        write!(f, "{}", s.to_ascii_lowercase())
    }
}

/// Page margins in millimeters. `None` leaves the renderer default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMargins {
    pub top: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
}

/// Process-wide rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub orientation: Orientation,
    pub page_size: PageSize,
    /// Trade output fidelity for speed and size.
    pub low_quality: bool,
    pub grayscale: bool,
    /// Zoom factor applied per document; 1.0 emits no flag.
    pub zoom: f32,
    pub margins: PageMargins,
    /// Explicit page width in millimeters; setting this (or `page_height`)
    /// suppresses the named `page_size`.
    pub page_width: Option<f32>,
    pub page_height: Option<f32>,
    /// Insert a table of contents before the first document.
    pub generate_toc: bool,
    pub toc_header_text: Option<String>,
    /// Raw argument string appended at global scope.
    pub extra_args: Option<String>,
    /// Raw argument string appended to every document block that has no
    /// per-document override.
    pub page_extra_args: Option<String>,
    /// Raw argument string appended to the cover block.
    pub cover_extra_args: Option<String>,
    /// Raw argument string appended to the toc block.
    pub toc_extra_args: Option<String>,
    /// Header template applied to every document without its own override.
    pub header_html: Option<String>,
    pub footer_html: Option<String>,
    /// Suppress renderer progress output (`-q`).
    pub quiet: bool,
    /// Wall-clock bound for one render call or batch job. `None` means no
    /// bound. Serialized as integer milliseconds.
    #[serde(with = "duration_millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Stderr lines that keep an exit code of 1 classified as success when
    /// output was produced. Trimmed exact match.
    pub benign_stderr_lines: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            orientation: Orientation::Default,
            page_size: PageSize::Default,
            low_quality: false,
            grayscale: false,
            zoom: DEFAULT_ZOOM,
            margins: PageMargins::default(),
            page_width: None,
            page_height: None,
            generate_toc: false,
            toc_header_text: None,
            extra_args: None,
            page_extra_args: None,
            cover_extra_args: None,
            toc_extra_args: None,
            header_html: None,
            footer_html: None,
            quiet: DEFAULT_QUIET,
            timeout: None,
            benign_stderr_lines: default_benign_stderr_lines(),
        }
    }
}

/// The built-in allow-list as owned strings, for seeding
/// [`RenderOptions::benign_stderr_lines`].
pub fn default_benign_stderr_lines() -> Vec<String> {
    crate::outcome::BENIGN_STDERR_LINES
        .iter()
        .map(|line| (*line).to_string())
        .collect()
}

/// Serializes `Option<Duration>` as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => ser.serialize_some(&(d.as_millis() as u64)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(de)?.map(Duration::from_millis))
    }
}
