//! Integration tests for the `logan` binary.
//!
//! Runs the built executable against real TOML and log files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn logan(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_logan"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("should run logan binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn moz_log(dir: &TempDir, name: &str, lines: &[&str]) -> String {
    let path = dir.path().join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(&path, content).expect("should write log");
    path.display().to_string()
}

const CHANNEL_LOG: &[&str] = &[
    "2020-01-01 00:00:00.000000 UTC - [Parent 1: Main Thread]: D/nsHttp Creating nsHttpChannel [this=0x1]",
    "2020-01-01 00:00:00.050000 UTC - [Parent 1: Main Thread]: D/nsHttp nsHttpChannel::Init [this=0x1]",
    "2020-01-01 00:00:00.051000 UTC - [Parent 1: Main Thread]: D/nsHttp uri=https://example.com/",
    "2020-01-01 00:00:00.100000 UTC - [Parent 1: Main Thread]: D/nsHttp Creating nsHttpChannel [this=0x2]",
    "2020-01-01 00:00:00.200000 UTC - [Parent 1: Main Thread]: D/nsHttp Destroying nsHttpChannel [this=0x1]",
];

#[test]
fn test_config_validate_valid_toml() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = dir.path().join("logan.toml");
    fs::write(
        &config,
        r#"
[general]
log_level = "warn"
log_format = "json"

[engine]
schema = "moz"
chunk_size = 4096
pattern_mode = "strict"
ipc = "auto"
"#,
    )
    .expect("should write config");

    let output = logan(&config, &["--output", "json", "config", "validate"]);
    assert!(output.status.success(), "valid config should validate");
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json report");
    assert_eq!(report["valid"], true);
}

#[test]
fn test_config_validate_invalid_value_exits_2() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = dir.path().join("logan.toml");
    fs::write(&config, "[engine]\nipc = \"sometimes\"\n").expect("should write config");

    let output = logan(&config, &["config", "validate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("engine.ipc"));
}

#[test]
fn test_config_validate_malformed_toml() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[general\nlog_level = \"info\"\n").expect("should write config");

    let output = logan(&config, &["config", "validate"]);
    assert!(!output.status.success(), "malformed TOML should fail");
}

#[test]
fn test_config_show_section() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = dir.path().join("logan.toml");
    fs::write(&config, "[engine]\nchunk_size = 8192\n").expect("should write config");

    let output = logan(&config, &["config", "show", "--section", "engine"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("chunk_size = 8192"));
    assert!(!text.contains("log_level"));

    let output = logan(&config, &["config", "show", "--section", "ebpf"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_parse_reports_classes() {
    let dir = TempDir::new().expect("should create temp dir");
    let log = moz_log(&dir, "log-main.1.moz_log", CHANNEL_LOG);
    let config = dir.path().join("absent.toml");

    let output = logan(&config, &["--output", "json", "parse", &log]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json report");
    assert_eq!(report["summary"]["lines"], 5);
    assert_eq!(report["summary"]["objects"], 2);
    let classes = report["classes"].as_array().expect("classes");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0]["class_name"], "nsHttpChannel");
    assert_eq!(classes[0]["objects"], 2);
    assert_eq!(classes[0]["live"], 1);
}

#[test]
fn test_search_follow_captured_property() {
    let dir = TempDir::new().expect("should create temp dir");
    let log = moz_log(&dir, "log-main.1.moz_log", CHANNEL_LOG);
    let config = dir.path().join("absent.toml");

    let output = logan(
        &config,
        &[
            "--output",
            "json",
            "search",
            &log,
            "--class",
            "nsHttpChannel",
            "--prop",
            "url",
            "--op",
            "contains",
            "--value",
            "example.com",
        ],
    );
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json report");
    assert_eq!(report["total"], 1);
    assert_eq!(report["results"][0]["pointer"], "0x1");
    assert_eq!(report["results"][0]["props"]["url"], "https://example.com/");
}

#[test]
fn test_search_truncates_to_max_results() {
    let dir = TempDir::new().expect("should create temp dir");
    let log = moz_log(&dir, "log-main.1.moz_log", CHANNEL_LOG);
    let config = dir.path().join("logan.toml");
    fs::write(&config, "[search]\nmax_results = 1\n").expect("should write config");

    let output = logan(
        &config,
        &[
            "--output",
            "json",
            "search",
            &log,
            "--class",
            "nsHttpChannel",
            "--prop",
            "*",
            "--op",
            "contains",
            "--value",
            "Creating nsHttpChannel",
        ],
    );
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json report");
    assert_eq!(report["total"], 2);
    assert_eq!(report["truncated"], true);
    let results = report["results"].as_array().expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["pointer"], "0x1");
}

#[test]
fn test_search_bad_operator_exits_4() {
    let dir = TempDir::new().expect("should create temp dir");
    let log = moz_log(&dir, "log-main.1.moz_log", CHANNEL_LOG);
    let config = dir.path().join("absent.toml");

    let output = logan(&config, &["search", &log, "--prop", "url", "--op", "like"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_parse_missing_file_fails() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = dir.path().join("absent.toml");
    let missing = dir.path().join("nope.moz_log");

    let output = logan(&config, &["parse", &missing.display().to_string()]);
    assert_eq!(output.status.code(), Some(1));
}
