//! Temp asset staging for one render call.
//!
//! Every piece of generated HTML handed to the renderer by path (cover page,
//! wrapped header/footer pages, staged inline bodies, reserved output files)
//! goes through a [`StagingArea`]. The area records each path in a manifest
//! and deletes all of them on [`StagingArea::cleanup`], which also runs on
//! drop so early error returns cannot leak files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Fixed HTML shell for header/footer pages. The renderer substitutes page
/// variables by loading the page with a query string like
/// `?page=3&topage=10`; the injected `subst()` script copies each variable
/// into every element carrying the matching class name, so arbitrary caller
/// markup gets working page numbering.
const HEADER_FOOTER_PRELUDE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script>
function subst() {
    var vars = {};
    var query = document.location.search.substring(1).split('&');
    for (var i = 0; i < query.length; i++) {
        var pair = query[i].split('=', 2);
        vars[pair[0]] = decodeURIComponent(pair[1]);
    }
    var classes = ['frompage', 'topage', 'page', 'webpage', 'section', 'subsection', 'subsubsection'];
    for (var i = 0; i < classes.length; i++) {
        var elements = document.getElementsByClassName(classes[i]);
        for (var j = 0; j < elements.length; j++) {
            elements[j].textContent = vars[classes[i]];
        }
    }
}
</script>
</head>
<body style="border:0;margin:0;" onload="subst()">
"#;

const HEADER_FOOTER_EPILOGUE: &str = "\n</body>\n</html>\n";

/// Wraps caller header/footer markup in the substitution shell.
pub fn wrap_header_footer(html: &str) -> String {
    let mut page = String::with_capacity(
        HEADER_FOOTER_PRELUDE.len() + html.len() + HEADER_FOOTER_EPILOGUE.len(),
    );
    page.push_str(HEADER_FOOTER_PRELUDE);
    page.push_str(html);
    page.push_str(HEADER_FOOTER_EPILOGUE);
    page
}

/// Owns the temp files of one render call (or one batch job).
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    prefix: String,
    manifest: Vec<PathBuf>,
}

impl StagingArea {
    /// Resolves the staging directory: an explicit override is created on
    /// demand, otherwise the platform temp directory is used as-is.
    pub fn new(dir_override: Option<&Path>, prefix: &str) -> Result<Self> {
        let dir = match dir_override {
            Some(d) => {
                fs::create_dir_all(d)?;
                d.to_path_buf()
            }
            None => std::env::temp_dir(),
        };
        Ok(StagingArea {
            dir,
            prefix: prefix.to_string(),
            manifest: Vec::new(),
        })
    }

    /// Writes `content` as UTF-8 to a fresh uniquely named file and records
    /// it in the manifest.
    pub fn stage(&mut self, content: &str) -> Result<PathBuf> {
        let path = self.unique_path("html");
        // Recorded before the write so a partial file is still cleaned up.
        self.manifest.push(path.clone());
        fs::write(&path, content)?;
        debug!(path = %path.display(), bytes = content.len(), "staged temp asset");
        Ok(path)
    }

    /// Wraps header/footer markup in the substitution shell and stages it.
    pub fn stage_header_footer(&mut self, html: &str) -> Result<PathBuf> {
        self.stage(&wrap_header_footer(html))
    }

    /// Records a unique output path in the manifest without creating the
    /// file. Used for output files the renderer writes itself.
    pub fn reserve(&mut self) -> PathBuf {
        let path = self.unique_path("pdf");
        self.manifest.push(path.clone());
        path
    }

    /// Deletes every manifest entry. A file the renderer still holds open
    /// (or never created) must not abort deletion of the rest, so individual
    /// failures are logged and skipped. Idempotent.
    pub fn cleanup(&mut self) {
        for path in self.manifest.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to delete temp asset");
                }
            }
        }
    }

    /// The resolved staging directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths currently recorded for cleanup.
    pub fn manifest(&self) -> &[PathBuf] {
        &self.manifest
    }

    fn unique_path(&self, ext: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.{ext}", self.prefix, Uuid::new_v4()))
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.cleanup();
    }
}
