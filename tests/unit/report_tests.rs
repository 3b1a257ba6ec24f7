//! Unit tests for the JSONL run report writer.

use chrono::Utc;
use procflow::report::{ReportEntry, ReportWriter};
use tempfile::TempDir;

fn entry(action: &str, status: &str, exit_code: Option<i32>) -> ReportEntry {
    ReportEntry {
        timestamp: Utc::now(),
        stage: "build".into(),
        action: action.into(),
        status: status.into(),
        exit_code,
        elapsed_ms: 12,
        fatal: false,
    }
}

#[test]
fn appends_one_json_line_per_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report");
    let writer = ReportWriter::new(path.clone());

    writer.append(&entry("compile", "ok", Some(0))).unwrap();
    writer.append(&entry("package", "failed", Some(2))).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["action"], "compile");
    assert_eq!(first["status"], "ok");
    assert_eq!(first["exit_code"], 0);

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["action"], "package");
    assert_eq!(second["exit_code"], 2);
}

#[test]
fn timed_out_entry_has_null_exit_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report");
    let writer = ReportWriter::new(path.clone());

    writer.append(&entry("slow", "timed_out", None)).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert!(value["exit_code"].is_null());
    assert_eq!(value["status"], "timed_out");
}

#[test]
fn appends_survive_separate_writer_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report");

    ReportWriter::new(path.clone())
        .append(&entry("a", "ok", Some(0)))
        .unwrap();
    ReportWriter::new(path.clone())
        .append(&entry("b", "ok", Some(0)))
        .unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 2);
}
