// ABOUTME: Integration tests for the strata CLI binary.
// ABOUTME: Covers dispatch from files and stdin, by-id dispatch, fan-out, preference printing and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title></head>
<body>
<article><p>Hi there</p></article>
</body>
</html>"#;

fn strata_cmd() -> Command {
    Command::cargo_bin("strata").unwrap()
}

fn write_page(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn dispatch_html_file_uses_preferred_strategy() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir, "page.html", PAGE);

    strata_cmd()
        .arg("dispatch")
        .arg(&page)
        .arg("--url")
        .arg("https://example.com/page")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"success\""))
        .stdout(predicate::str::contains("\"strategy\": \"html-text\""))
        .stdout(predicate::str::contains("Hi there"));
}

#[test]
fn dispatch_reads_stdin() {
    strata_cmd()
        .args(["--compact", "dispatch", "-", "--url", "file:///note.txt"])
        .args(["--content-type", "text/plain"])
        .write_stdin("just some notes")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"strategy\":\"text-plain\""))
        .stdout(predicate::str::contains("just some notes"));
}

#[test]
fn empty_document_exits_with_empty_failure() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir, "blank.html", "");

    strata_cmd()
        .arg("dispatch")
        .arg(&page)
        .args(["--url", "https://example.com/blank"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("empty_failure"))
        .stdout(predicate::str::contains("all_strategies_exhausted"));
}

#[test]
fn dispatch_by_strategy_id() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir, "page.html", PAGE);

    strata_cmd()
        .arg("dispatch")
        .arg(&page)
        .args(["--url", "https://example.com/page", "--strategy", "html-title"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"strategy\": \"html-title\""))
        .stdout(predicate::str::contains("Test Page"));

    strata_cmd()
        .arg("dispatch")
        .arg(&page)
        .args(["--url", "https://example.com/page", "--strategy", "nope"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("no_strategy_configured"));
}

#[test]
fn custom_preferences_change_the_order() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir, "page.html", PAGE);
    let prefs = write_page(
        &dir,
        "prefs.json",
        r#"[{"content_type": "text/html", "strategies": [{"id": "html-text"}, {"id": "html-title", "order": 1}]}]"#,
    );

    strata_cmd()
        .arg("--prefs")
        .arg(&prefs)
        .arg("dispatch")
        .arg(&page)
        .args(["--url", "https://example.com/page"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"strategy\": \"html-title\""));
}

#[test]
fn bad_order_only_affects_its_own_entry() {
    let dir = TempDir::new().unwrap();
    let prefs = write_page(
        &dir,
        "prefs.json",
        r#"[
            {"content_type": "text/html", "strategies": [{"id": "html-text"}, {"id": "html-title", "order": 1.5}]},
            {"content_type": "text/plain", "strategies": [{"id": "text-plain"}]}
        ]"#,
    );

    strata_cmd()
        .arg("--compact")
        .arg("--prefs")
        .arg(&prefs)
        .arg("prefs")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"content_type":"text/html","strategies":["html-text","html-title"]}"#,
        ))
        .stdout(predicate::str::contains(
            r#"{"content_type":"text/plain","strategies":["text-plain"]}"#,
        ));
}

#[test]
fn prefs_prints_resolved_order() {
    strata_cmd()
        .args(["--compact", "prefs"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"content_type":"text/html","strategies":["html-text","html-title","text-plain"]}"#,
        ));
}

#[test]
fn fanout_reports_each_strategy() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir, "page.html", PAGE);

    strata_cmd()
        .arg("fanout")
        .arg(&page)
        .args(["--url", "https://example.com/page", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcomes\""))
        .stdout(predicate::str::contains("\"strategy\": \"html-title\""))
        .stdout(predicate::str::contains("\"strategy\": \"text-plain\""))
        .stdout(predicate::str::contains("\"live_workers\""));
}

#[test]
fn config_and_overrides_are_applied() {
    let dir = TempDir::new().unwrap();
    let page = write_page(&dir, "page.html", PAGE);
    let config = write_page(
        &dir,
        "config.json",
        r#"{"parser.minThread": 1, "parser.maxThread": 2, "parser.timeout": "5"}"#,
    );

    strata_cmd()
        .arg("--config")
        .arg(&config)
        .args(["--set", "parser.workQueueSize=16", "--stats"])
        .arg("dispatch")
        .arg(&page)
        .args(["--url", "https://example.com/page"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_workers\": 2"))
        .stdout(predicate::str::contains("\"min_workers\": 1"));
}

#[test]
fn malformed_override_is_a_usage_error() {
    strata_cmd()
        .args(["--set", "parser.timeout", "prefs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn missing_file_is_an_error() {
    strata_cmd()
        .args(["dispatch", "/definitely/not/here.html", "--url", "https://example.com"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("file not found"));
}
