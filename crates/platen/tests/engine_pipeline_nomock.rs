//! No-mock integration tests for the single-shot render pipeline.
//!
//! A fake renderer (POSIX shell script) stands in for wkhtmltopdf; every
//! test drives the real engine end to end: staging, argument composition,
//! process supervision, outcome classification, cleanup.

#![cfg(unix)]

mod support;

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use platen::{
    Destination, Error, InputDocument, LogObserver, RenderEngine, RenderOptions,
};
use support::fake_renderer::FakeRenderer;
use tempfile::TempDir;

fn engine_for(fake: &FakeRenderer, tmp: &Path) -> RenderEngine {
    RenderEngine::new()
        .with_exe(fake.exe())
        .with_temp_dir(tmp.join("staging"))
}

fn staged_files(tmp: &Path) -> Vec<String> {
    match fs::read_dir(tmp.join("staging")) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_inline_html_to_buffer() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());

    let pdf = engine
        .generate("<h1>hello</h1>", None)
        .expect("default render should succeed");
    assert!(!pdf.is_empty(), "buffer should hold the streamed PDF");
    assert!(pdf.starts_with(b"%PDF"), "payload should be the fake PDF");
    assert_eq!(fake.start_count(), 1);

    // A lone inline document is piped: stdin source token and stdout
    // destination token, nothing staged.
    let jobs = fake.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0], "-q - -");
}

#[test]
fn test_render_to_file() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());

    let input = tmp.path().join("in.html");
    fs::write(&input, "<p>body</p>").unwrap();
    let output = tmp.path().join("out.pdf");

    let docs = [InputDocument::from_path(&input)];
    let bytes = engine
        .generate_from_documents(&docs, None, Destination::File(&output))
        .expect("file render should succeed");
    assert!(bytes > 0);
    let written = fs::read(&output).unwrap();
    assert!(written.starts_with(b"%PDF"));
    assert_eq!(written.len() as u64, bytes);
}

#[test]
fn test_exit_one_with_benign_line_and_output_succeeds() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().extra_args = Some("--fake-stderr-netfail --fake-exit 1".to_string());

    let pdf = engine
        .generate("<p>broken image link</p>", None)
        .expect("benign exit 1 with output should pass");
    assert!(!pdf.is_empty());
}

#[test]
fn test_exit_one_with_benign_line_but_no_output_fails() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().extra_args =
        Some("--fake-stderr-font --fake-exit 1 --fake-no-output".to_string());

    match engine.generate("<p>x</p>", None) {
        Err(Error::RendererFailure { exit_code: 1, .. }) => {}
        other => panic!("expected renderer failure, got: {other:?}"),
    }
}

#[test]
fn test_exit_one_with_unrelated_line_fails() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().extra_args =
        Some("--fake-stderr-plain SegfaultWarning --fake-exit 1".to_string());

    match engine.generate("<p>x</p>", None) {
        Err(Error::RendererFailure {
            exit_code: 1,
            diagnostic,
        }) => assert_eq!(diagnostic, "SegfaultWarning"),
        other => panic!("expected renderer failure, got: {other:?}"),
    }
}

#[test]
fn test_nonzero_exit_fails_despite_output() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().extra_args =
        Some("--fake-stderr-plain LoadFailed --fake-exit 2".to_string());

    match engine.generate("<p>x</p>", None) {
        Err(Error::RendererFailure {
            exit_code: 2,
            diagnostic,
        }) => assert_eq!(diagnostic, "LoadFailed"),
        other => panic!("expected renderer failure, got: {other:?}"),
    }
}

#[test]
fn test_timeout_kills_promptly() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().timeout = Some(Duration::from_millis(300));
    engine.options_mut().extra_args = Some("--fake-sleep 10 --fake-no-output".to_string());

    let start = Instant::now();
    let result = engine.generate("<p>slow</p>", None);
    let elapsed = start.elapsed();

    match result {
        Err(Error::Timeout(t)) => assert_eq!(t, Duration::from_millis(300)),
        other => panic!("expected timeout, got: {other:?}"),
    }
    assert!(
        elapsed < Duration::from_secs(3),
        "kill should be prompt, took {elapsed:?}"
    );
}

#[test]
fn test_temp_assets_cleaned_up_after_success() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().header_html = Some("<span class=\"page\"></span>".to_string());
    engine.options_mut().footer_html = Some("<span class=\"topage\"></span>".to_string());

    engine
        .generate("<p>x</p>", Some("<h1>Cover</h1>"))
        .expect("render should succeed");
    assert!(
        staged_files(tmp.path()).is_empty(),
        "staging dir should be empty after the call"
    );
}

#[test]
fn test_temp_assets_cleaned_up_after_failure() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().header_html = Some("<span class=\"page\"></span>".to_string());
    engine.options_mut().extra_args = Some("--fake-exit 2".to_string());

    assert!(engine.generate("<p>x</p>", Some("<h1>Cover</h1>")).is_err());
    assert!(
        staged_files(tmp.path()).is_empty(),
        "failure path must clean staging up too"
    );
}

#[test]
fn test_observer_receives_stderr_lines() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: LogObserver = Arc::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    });

    let mut engine = engine_for(&fake, tmp.path()).with_observer(observer);
    engine.options_mut().extra_args = Some("--fake-stderr-plain warnline".to_string());
    engine.generate("<p>x</p>", None).expect("render should succeed");

    assert_eq!(seen.lock().unwrap().as_slice(), ["warnline"]);
}

#[test]
fn test_composed_job_carries_cover_toc_and_templates() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut options = RenderOptions::default();
    options.header_html = Some("<b>head</b>".to_string());
    options.footer_html = Some("<b>foot</b>".to_string());
    options.generate_toc = true;
    let mut engine = engine_for(&fake, tmp.path()).with_options(options);

    engine
        .generate("<p>x</p>", Some("<h1>Cover</h1>"))
        .expect("render should succeed");

    let job = &fake.jobs()[0];
    assert!(job.contains("--header-html"), "job: {job}");
    assert!(job.contains("--footer-html"), "job: {job}");
    assert!(job.contains("cover "), "job: {job}");
    assert!(job.contains("toc"), "job: {job}");

    // The staged cover page is a real file while the job runs; the wrapped
    // header carries the substitution shell.
    let staged_header = job
        .split_whitespace()
        .skip_while(|t| *t != "--header-html")
        .nth(1)
        .expect("header path token");
    assert!(staged_header.ends_with(".html"));
}

#[test]
fn test_per_document_overrides_and_order() {
    let tmp = TempDir::new().unwrap();
    let fake = FakeRenderer::install(tmp.path());
    let mut engine = engine_for(&fake, tmp.path());
    engine.options_mut().page_extra_args = Some("--fake-exit 0".to_string());

    let first = tmp.path().join("first.html");
    let second = tmp.path().join("second.html");
    fs::write(&first, "<p>1</p>").unwrap();
    fs::write(&second, "<p>2</p>").unwrap();

    let docs = [
        InputDocument::from_path(&first).with_extra_args("--fake-stderr-plain doc1"),
        InputDocument::from_path(&second),
    ];
    let output = tmp.path().join("both.pdf");
    engine
        .generate_from_documents(&docs, None, Destination::File(&output))
        .expect("two-document render should succeed");

    let job = &fake.jobs()[0];
    let first_at = job.find("first.html").expect("first doc in job line");
    let second_at = job.find("second.html").expect("second doc in job line");
    assert!(first_at < second_at, "document order must be preserved: {job}");
    assert!(
        job.contains("--fake-stderr-plain doc1"),
        "per-document args must ride its block: {job}"
    );
}
