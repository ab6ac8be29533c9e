//! platen - render HTML documents to PDF through an external
//! wkhtmltopdf-compatible renderer.
//!
//! A thin command-line front-end over the library facade: inputs are file
//! paths, URLs, or `-` (HTML read from stdin); output goes to one PDF
//! (`--output`) or one PDF per input (`--out-dir`, optionally through a
//! single persistent renderer with `--batch`).
//!
//! stdout carries payloads (progress lines, `--json` summaries); all logs go
//! to stderr. Exit codes are a stable contract, see `exit_codes`.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use tracing::{error, info, warn};

use platen::exit_codes::ExitCode;
use platen::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use platen::{
    Destination, Error, InputDocument, Orientation, PageSize, RenderEngine, RenderOptions,
    DEFAULT_RENDERER_EXE,
};

/// Render HTML documents to PDF through an external renderer
#[derive(Parser, Debug)]
#[command(name = "platen")]
#[command(author, version)]
#[command(group(ArgGroup::new("dest").required(true).args(["output", "out_dir"])))]
struct Cli {
    /// Input documents: file paths, URLs, or `-` to read HTML from stdin
    #[arg(required = true, value_name = "INPUTS")]
    inputs: Vec<String>,

    /// Render all inputs into this single PDF
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Render one PDF per input into this directory
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Feed --out-dir jobs through one persistent renderer process
    #[arg(long, requires = "out_dir", conflicts_with = "output")]
    batch: bool,

    /// Renderer executable (name on PATH or explicit path)
    #[arg(long, env = "PLATEN_RENDERER", default_value = DEFAULT_RENDERER_EXE)]
    exe: String,

    /// Directory for generated temp files (created on demand)
    #[arg(long, env = "PLATEN_TEMP_DIR", value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Load render options from a TOML file; explicit flags win
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Page orientation (portrait, landscape)
    #[arg(long, value_name = "ORIENTATION")]
    orientation: Option<Orientation>,

    /// Named paper size (a4, letter, ...)
    #[arg(long, value_name = "SIZE")]
    page_size: Option<PageSize>,

    /// Render in grayscale
    #[arg(long)]
    grayscale: bool,

    /// Trade output fidelity for speed and size
    #[arg(long)]
    low_quality: bool,

    /// Zoom factor applied to every page
    #[arg(long, value_name = "FACTOR")]
    zoom: Option<f32>,

    /// Top margin in millimeters
    #[arg(long, value_name = "MM")]
    margin_top: Option<f32>,

    /// Bottom margin in millimeters
    #[arg(long, value_name = "MM")]
    margin_bottom: Option<f32>,

    /// Left margin in millimeters
    #[arg(long, value_name = "MM")]
    margin_left: Option<f32>,

    /// Right margin in millimeters
    #[arg(long, value_name = "MM")]
    margin_right: Option<f32>,

    /// Explicit page width in millimeters (overrides --page-size)
    #[arg(long, value_name = "MM")]
    page_width: Option<f32>,

    /// Explicit page height in millimeters (overrides --page-size)
    #[arg(long, value_name = "MM")]
    page_height: Option<f32>,

    /// Insert a table of contents before the first document
    #[arg(long)]
    toc: bool,

    /// Header text for the table of contents
    #[arg(long, value_name = "TEXT")]
    toc_header_text: Option<String>,

    /// File with header HTML applied to every page
    #[arg(long, value_name = "FILE")]
    header_html: Option<PathBuf>,

    /// File with footer HTML applied to every page
    #[arg(long, value_name = "FILE")]
    footer_html: Option<PathBuf>,

    /// File with cover page HTML
    #[arg(long, value_name = "FILE")]
    cover: Option<PathBuf>,

    /// Kill the renderer if a job runs longer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Let the renderer print its progress chatter (drops its -q flag)
    #[arg(long)]
    renderer_verbose: bool,

    /// Print a machine-readable summary to stdout
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// One rendered (or failed) job, for reporting.
struct JobReport {
    inputs: Vec<String>,
    output: PathBuf,
    bytes: u64,
    outcome: Result<(), Error>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and exit clean; real argument
            // errors map to the stable usage exit code.
            let code = if e.use_stderr() {
                ExitCode::ArgsError.as_i32()
            } else {
                0
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let cli_level = if cli.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let cli_format = cli.json.then_some(LogFormat::Jsonl);
    init_logging(&LogConfig::from_env(cli_level, cli_format));

    let code = run(&cli);
    std::process::exit(code.as_i32());
}

fn run(cli: &Cli) -> ExitCode {
    let options = match build_options(cli) {
        Ok(options) => options,
        Err(code) => return code,
    };

    let cover = match &cli.cover {
        Some(path) => match fs::read_to_string(path) {
            Ok(html) => Some(html),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read cover file");
                return ExitCode::InternalError;
            }
        },
        None => None,
    };

    let docs = match resolve_inputs(&cli.inputs) {
        Ok(docs) => docs,
        Err(e) => {
            error!(error = %e, "failed to read stdin input");
            return ExitCode::InternalError;
        }
    };

    let mut engine = RenderEngine::new()
        .with_exe(cli.exe.clone())
        .with_options(options)
        .with_observer(Arc::new(|line: &str| {
            warn!(source = "renderer", "{line}");
        }));
    if let Some(dir) = &cli.temp_dir {
        engine = engine.with_temp_dir(dir);
    }

    let (reports, code) = match (&cli.output, &cli.out_dir) {
        (Some(path), _) => run_single(&mut engine, docs, cover.as_deref(), path),
        (None, Some(dir)) => run_per_input(&mut engine, docs, cover.as_deref(), dir, cli.batch),
        (None, None) => {
            error!("one of --output or --out-dir is required");
            (Vec::new(), ExitCode::ArgsError)
        }
    };

    report(cli, &engine, &reports);
    code
}

/// Applies the TOML options file (if any), then every explicit flag on top.
fn build_options(cli: &Cli) -> Result<RenderOptions, ExitCode> {
    let mut options = match &cli.options {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                error!(path = %path.display(), error = %e, "failed to read options file");
                ExitCode::InternalError
            })?;
            toml::from_str(&text).map_err(|e| {
                error!(path = %path.display(), error = %e, "invalid options file");
                ExitCode::ArgsError
            })?
        }
        None => RenderOptions::default(),
    };

    if let Some(orientation) = cli.orientation {
        options.orientation = orientation;
    }
    if let Some(size) = cli.page_size {
        options.page_size = size;
    }
    if cli.grayscale {
        options.grayscale = true;
    }
    if cli.low_quality {
        options.low_quality = true;
    }
    if let Some(zoom) = cli.zoom {
        options.zoom = zoom;
    }
    if let Some(mm) = cli.margin_top {
        options.margins.top = Some(mm);
    }
    if let Some(mm) = cli.margin_bottom {
        options.margins.bottom = Some(mm);
    }
    if let Some(mm) = cli.margin_left {
        options.margins.left = Some(mm);
    }
    if let Some(mm) = cli.margin_right {
        options.margins.right = Some(mm);
    }
    if let Some(mm) = cli.page_width {
        options.page_width = Some(mm);
    }
    if let Some(mm) = cli.page_height {
        options.page_height = Some(mm);
    }
    if cli.toc {
        options.generate_toc = true;
    }
    if let Some(text) = &cli.toc_header_text {
        options.toc_header_text = Some(text.clone());
    }
    if let Some(secs) = cli.timeout {
        options.timeout = Some(Duration::from_secs(secs));
    }
    if cli.renderer_verbose {
        options.quiet = false;
    }
    for (flag, slot) in [
        (&cli.header_html, &mut options.header_html),
        (&cli.footer_html, &mut options.footer_html),
    ] {
        if let Some(path) = flag {
            *slot = Some(fs::read_to_string(path).map_err(|e| {
                error!(path = %path.display(), error = %e, "failed to read header/footer file");
                ExitCode::InternalError
            })?);
        }
    }

    Ok(options)
}

/// Turns raw input descriptors into documents. stdin is read at most once,
/// even when `-` appears several times.
fn resolve_inputs(inputs: &[String]) -> std::io::Result<Vec<(String, InputDocument)>> {
    let mut stdin_html: Option<String> = None;
    let mut docs = Vec::with_capacity(inputs.len());
    for raw in inputs {
        let doc = if raw == "-" {
            let html = match &stdin_html {
                Some(html) => html.clone(),
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    stdin_html = Some(buf.clone());
                    buf
                }
            };
            InputDocument::from_html(html)
        } else if is_url(raw) {
            InputDocument::from_url(raw.clone())
        } else {
            InputDocument::from_path(raw)
        };
        docs.push((raw.clone(), doc));
    }
    Ok(docs)
}

fn is_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("file://")
}

/// All inputs into one PDF.
fn run_single(
    engine: &mut RenderEngine,
    docs: Vec<(String, InputDocument)>,
    cover: Option<&str>,
    output: &Path,
) -> (Vec<JobReport>, ExitCode) {
    let (inputs, documents): (Vec<String>, Vec<InputDocument>) = docs.into_iter().unzip();
    let outcome = engine.generate_from_documents(&documents, cover, Destination::File(output));
    let (bytes, outcome) = match outcome {
        Ok(bytes) => (bytes, Ok(())),
        Err(e) => (0, Err(e)),
    };
    let code = match &outcome {
        Ok(()) => ExitCode::Success,
        Err(e) => ExitCode::from(e),
    };
    let report = JobReport {
        inputs,
        output: output.to_path_buf(),
        bytes,
        outcome,
    };
    (vec![report], code)
}

/// One PDF per input. A failed job is reported and does not stop the rest;
/// the process exit code is the worst outcome seen.
fn run_per_input(
    engine: &mut RenderEngine,
    docs: Vec<(String, InputDocument)>,
    cover: Option<&str>,
    dir: &Path,
    batch: bool,
) -> (Vec<JobReport>, ExitCode) {
    if let Err(e) = fs::create_dir_all(dir) {
        error!(dir = %dir.display(), error = %e, "failed to create output directory");
        return (Vec::new(), ExitCode::InternalError);
    }
    let mut code = ExitCode::Success;
    if batch {
        if let Err(e) = engine.begin_batch() {
            error!(error = %e, "failed to begin batch");
            return (Vec::new(), ExitCode::from(&e));
        }
    }

    let mut used_names: HashMap<String, usize> = HashMap::new();
    let mut reports = Vec::with_capacity(docs.len());
    for (raw, doc) in docs {
        let output = dir.join(unique_name(&output_stem(&raw), &mut used_names));
        let outcome =
            engine.generate_from_documents(std::slice::from_ref(&doc), cover, Destination::File(&output));
        let (bytes, outcome) = match outcome {
            Ok(bytes) => (bytes, Ok(())),
            Err(e) => {
                code = code.worst(ExitCode::from(&e));
                (0, Err(e))
            }
        };
        reports.push(JobReport {
            inputs: vec![raw],
            output,
            bytes,
            outcome,
        });
    }

    if batch {
        if let Err(e) = engine.end_batch() {
            error!(error = %e, "failed to end batch");
            code = code.worst(ExitCode::from(&e));
        }
    }
    (reports, code)
}

/// Derives an output file stem from an input descriptor.
fn output_stem(raw: &str) -> String {
    if raw == "-" {
        return "stdin".to_string();
    }
    if is_url(raw) {
        let trimmed = raw.trim_end_matches('/');
        let segment = trimmed
            .rsplit('/')
            .next()
            .unwrap_or("")
            .split(['?', '#'])
            .next()
            .unwrap_or("");
        let stem = segment.rsplit_once('.').map(|(s, _)| s).unwrap_or(segment);
        if stem.is_empty() || stem.contains(':') {
            return "page".to_string();
        }
        return sanitize(stem);
    }
    Path::new(raw)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize)
        .unwrap_or_else(|| "page".to_string())
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Appends a counter suffix when the same stem comes up again.
fn unique_name(stem: &str, used: &mut HashMap<String, usize>) -> String {
    let n = used.entry(stem.to_string()).or_insert(0);
    *n += 1;
    if *n == 1 {
        format!("{stem}.pdf")
    } else {
        format!("{stem}-{n}.pdf")
    }
}

fn report(cli: &Cli, engine: &RenderEngine, reports: &[JobReport]) {
    if cli.json {
        let jobs: Vec<serde_json::Value> = reports
            .iter()
            .map(|r| match &r.outcome {
                Ok(()) => serde_json::json!({
                    "inputs": r.inputs,
                    "output": r.output,
                    "bytes": r.bytes,
                    "status": "ok",
                    "code": ExitCode::Success.code_name(),
                }),
                Err(e) => serde_json::json!({
                    "inputs": r.inputs,
                    "output": r.output,
                    "status": "error",
                    "code": ExitCode::from(e).code_name(),
                    "message": e.to_string(),
                }),
            })
            .collect();
        let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
        let summary = serde_json::json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "renderer": engine.exe(),
            "jobs": jobs,
            "failed": failed,
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
        return;
    }

    for r in reports {
        match &r.outcome {
            Ok(()) => {
                info!(output = %r.output.display(), bytes = r.bytes, "rendered");
                if !cli.quiet {
                    println!("wrote {} ({} bytes)", r.output.display(), r.bytes);
                }
            }
            Err(e) => {
                error!(
                    inputs = ?r.inputs,
                    output = %r.output.display(),
                    error = %e,
                    "render failed"
                );
            }
        }
    }
}
