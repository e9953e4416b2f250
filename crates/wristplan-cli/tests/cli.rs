//! CLI E2E tests.
//!
//! Each test drives the built binary with its own `HOME`, so config, ledger
//! and history start empty. The bundled schedule is used unless a test
//! points `schedule.path` elsewhere.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command under `home` and return (stdout, stderr, code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_wristplan"))
        .args(args)
        .env("HOME", home)
        .env_remove("WRISTPLAN_ENV")
        .env("WRISTPLAN_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    serde_json::from_str(&run_ok(home, args)).expect("Failed to parse JSON output")
}

// 2026-06-01 is a Monday.

#[test]
fn test_status_reports_active_entry() {
    let home = TempDir::new().unwrap();
    let snap = run_json(home.path(), &["status", "--at", "2026-06-01T10:00"]);
    let active = &snap["active"];
    assert_eq!(active["name"], "Deep work");
    assert_eq!(active["summary"], "3h | 09:00 - 12:00");
    assert_eq!(active["elapsed"], "1h");
    assert_eq!(active["remaining"], "2h");
    assert_eq!(active["quarter_marks"], 13);
    assert_eq!(snap["next"]["name"], "Lunch");
}

#[test]
fn test_status_carries_configured_colors() {
    let home = TempDir::new().unwrap();
    let snap = run_json(home.path(), &["status", "--at", "2026-06-01T10:00"]);
    assert_eq!(snap["colors"]["primary_color"], "#d5f7e4");
    assert_eq!(snap["colors"]["secondary_color"], "#68c4af");

    run_ok(home.path(), &["config", "set", "ui.primary_color", "#ff8800"]);
    let snap = run_json(home.path(), &["status", "--at", "2026-06-01T10:00"]);
    assert_eq!(snap["colors"]["primary_color"], "#ff8800");
}

#[test]
fn test_missing_schedule_file_is_an_error() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("missing.json");
    run_ok(home.path(), &["config", "set", "schedule.path", missing.to_str().unwrap()]);
    let (_, stderr, code) = run_cli(home.path(), &["status", "--at", "2026-06-01T10:00"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_status_has_no_side_effects() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["status", "--at", "2026-06-01T09:00:30"]);
    let history = run_json(home.path(), &["history"]);
    assert_eq!(history.as_array().unwrap().len(), 0);
}

#[test]
fn test_next_looks_into_tomorrow() {
    let home = TempDir::new().unwrap();
    let next = run_json(home.path(), &["next", "--at", "2026-06-05T23:30"]);
    assert_eq!(next["name"], "Long run");
    assert_eq!(next["days_ahead"], 1);
}

#[test]
fn test_day_lists_timeline() {
    let home = TempDir::new().unwrap();
    let day = run_json(home.path(), &["day", "sat"]);
    let names: Vec<_> = day
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Long run", "Reading", "Sleep"]);
}

#[test]
fn test_tick_fires_once_and_records_history() {
    let home = TempDir::new().unwrap();
    let first = run_json(home.path(), &["tick", "--at", "2026-06-01T09:00:30"]);
    let events = first["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "AlertFired");
    assert_eq!(events[0]["entry_id"], "Deep work@09:00");

    let second = run_json(home.path(), &["tick", "--at", "2026-06-01T09:00:40"]);
    assert!(second["events"].as_array().unwrap().is_empty());

    let history = run_json(home.path(), &["history"]);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let ledger = run_json(home.path(), &["ledger", "show"]);
    assert_eq!(ledger["fired"].as_array().unwrap().len(), 1);
    assert!(run_ok(home.path(), &["ledger", "clear"]).contains("cleared 1"));
}

#[test]
fn test_vibration_toggle_silences_tick() {
    let home = TempDir::new().unwrap();
    assert_eq!(run_ok(home.path(), &["toggle", "vibration"]).trim(), "vibration: on");
    assert_eq!(
        run_ok(home.path(), &["toggle", "vibration", "off"]).trim(),
        "vibration: off"
    );
    let tick = run_json(home.path(), &["tick", "--at", "2026-06-01T09:00:30"]);
    assert!(tick["events"].as_array().unwrap().is_empty());
    assert_eq!(tick["snapshot"]["vibration_enabled"], false);
}

#[test]
fn test_schedule_toggle_hides_overlay() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["toggle", "schedule", "off"]);
    let snap = run_json(home.path(), &["status", "--at", "2026-06-01T10:00"]);
    assert_eq!(snap["schedule_enabled"], false);
    assert!(snap["active"].is_null());
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    assert_eq!(run_ok(home.path(), &["config", "get", "alerts.mode"]).trim(), "timer");
    run_ok(home.path(), &["config", "set", "alerts.mode", "poll"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "alerts.mode"]).trim(), "poll");

    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "alerts.nope", "1"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_custom_schedule_path() {
    let home = TempDir::new().unwrap();
    let doc = home.path().join("plan.json");
    std::fs::write(
        &doc,
        r#"{ "mainSchedule": [ { "days": ["Mon"], "schedule": [
            { "name": "Solo", "startTime": "10:00", "endTime": "11:00" } ] } ] }"#,
    )
    .unwrap();

    let summary = run_json(home.path(), &["validate", doc.to_str().unwrap()]);
    assert_eq!(summary["entries"], 1);
    assert_eq!(summary["days"]["Mon"], 1);
    assert_eq!(summary["days"]["Tue"], 0);

    run_ok(home.path(), &["config", "set", "schedule.path", doc.to_str().unwrap()]);
    let snap = run_json(home.path(), &["status", "--at", "2026-06-01T10:30"]);
    assert_eq!(snap["active"]["name"], "Solo");
}

#[test]
fn test_validate_rejects_bad_time() {
    let home = TempDir::new().unwrap();
    let doc = home.path().join("bad.json");
    std::fs::write(
        &doc,
        r#"{ "mainSchedule": [ { "days": ["Mon"], "schedule": [
            { "name": "Broken", "startTime": "9:00", "endTime": "10:00" } ] } ] }"#,
    )
    .unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["validate", doc.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();
    assert!(run_ok(home.path(), &["completions", "bash"]).contains("wristplan"));
}
