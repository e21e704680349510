// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn todays_file(dir: &std::path::Path) -> std::path::PathBuf {
    dir.join(format!("audit-{}.jsonl", Utc::now().format("%Y-%m-%d")))
}

#[test]
fn records_are_appended_as_jsonl() {
    let tmp = TempDir::new().unwrap();
    let audit = AuditLog::new(tmp.path().to_path_buf());

    audit.record("tsk-1", "task_created", 1, None, serde_json::json!({"request": "check"}));
    audit.record("tsk-1", "task_planning", 2, Some("ops"), serde_json::json!({}));

    let content = std::fs::read_to_string(todays_file(tmp.path())).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["task_id"], "tsk-1");
    assert_eq!(first["event"], "task_created");
    assert_eq!(first["version"], 1);
    assert_eq!(first["details"]["request"], "check");
    assert!(first.get("actor").is_none(), "absent actor is omitted");

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["actor"], "ops");
    assert_eq!(second["version"], 2);
}

#[test]
fn timestamps_are_rfc3339() {
    let tmp = TempDir::new().unwrap();
    let audit = AuditLog::new(tmp.path().to_path_buf());
    audit.record("tsk-1", "task_created", 1, None, serde_json::json!({}));

    let content = std::fs::read_to_string(todays_file(tmp.path())).unwrap();
    let record: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    let ts = record["ts"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "bad ts: {ts}");
}

#[test]
fn write_failures_count_instead_of_blocking() {
    let tmp = TempDir::new().unwrap();
    // A file where the directory should be: every append fails.
    let bogus_dir = tmp.path().join("occupied");
    std::fs::write(&bogus_dir, b"not a directory").unwrap();

    let audit = AuditLog::new(bogus_dir);
    assert_eq!(audit.write_failures(), 0);

    audit.record("tsk-1", "task_created", 1, None, serde_json::json!({}));
    audit.record("tsk-1", "task_planning", 2, None, serde_json::json!({}));
    assert_eq!(audit.write_failures(), 2);
}
