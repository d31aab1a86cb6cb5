//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with HOME pointed at a scratch directory
//! so the user's real configuration is never touched.

use std::path::Path;
use std::process::Command;

const CATALOG: &str = r#"
[[books]]
id = "tales"
title = "Tales"
duration = 120.0

[[books.chapters]]
id = 1
title = "First"
start = 0.0
end = 60.0

[[books.chapters]]
id = 2
title = "Second"
start = 60.0
end = 120.0
"#;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_nodoff-cli"))
        .args(args)
        .env("HOME", home)
        .env("NODOFF_ENV", "dev")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn write_catalog(dir: &Path) -> String {
    let path = dir.join("books.toml");
    std::fs::write(&path, CATALOG).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_progress_chapter_relative() {
    let home = tempfile::tempdir().unwrap();
    let catalog = write_catalog(home.path());
    let (code, stdout, _) = run_cli(
        home.path(),
        &["progress", "--position", "75", "--chapters", &catalog, "--book", "tales"],
    );
    assert_eq!(code, 0);
    let snapshot: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(snapshot["unit"]["kind"], "chapter");
    assert_eq!(snapshot["elapsed_within_unit"], 15.0);
    assert_eq!(snapshot["total_remaining"], 45.0);
}

#[test]
fn test_progress_without_duration_is_zeroed() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["progress", "--position", "75"]);
    assert_eq!(code, 0);
    let snapshot: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(snapshot["fraction"], 0.0);
    assert_eq!(snapshot["total_duration"], 0.0);
}

#[test]
fn test_auto_check_wraps_midnight() {
    let home = tempfile::tempdir().unwrap();
    let args = ["auto", "check", "--start", "23:00", "--end", "07:00", "--at"];

    let (code, stdout, _) = run_cli(home.path(), &[&args[..], &["00:30"][..]].concat());
    assert_eq!(code, 0);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["inside"], true);
    assert_eq!(result["wraps_midnight"], true);

    let (_, stdout, _) = run_cli(home.path(), &[&args[..], &["10:00"][..]].concat());
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["inside"], false);
}

#[test]
fn test_auto_check_rejects_bad_time() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(
        home.path(),
        &["auto", "check", "--start", "25:00", "--end", "07:00"],
    );
    assert_ne!(code, 0);
}

#[test]
fn test_presets_list() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["presets"]);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.first(), Some(&"5 minutes"));
    assert_eq!(lines.last(), Some(&"End of chapter"));
}

#[test]
fn test_config_set_get_roundtrip() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "set", "sleep_timer.fade_out_window_secs", "45"]);
    assert_eq!(code, 0);
    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "sleep_timer.fade_out_window_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "45");
}

#[test]
fn test_config_rejects_out_of_range_volume() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["config", "set", "sleep_timer.base_volume", "3"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("base_volume"));
}

#[test]
fn test_config_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_simulate_preset_runs_to_expiry() {
    let home = tempfile::tempdir().unwrap();
    let catalog = write_catalog(home.path());
    let (code, stdout, stderr) = run_cli(
        home.path(),
        &[
            "simulate", "--book", &catalog, "--id", "tales", "--timer", "3s", "--tick-ms", "5",
        ],
    );
    assert_eq!(code, 0, "stderr: {stderr}");

    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(kinds.first(), Some(&"TimerArmed"));
    assert!(kinds.contains(&"TimerExpired"));
    assert!(kinds.contains(&"PromptOpened"));
    assert_eq!(kinds.last(), Some(&"StateSnapshot"));
}

#[test]
fn test_simulate_unknown_book_fails() {
    let home = tempfile::tempdir().unwrap();
    let catalog = write_catalog(home.path());
    let (code, _, stderr) = run_cli(
        home.path(),
        &["simulate", "--book", &catalog, "--id", "missing", "--timer", "3s"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("book not found"));
}
