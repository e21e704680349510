// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit trail.
//!
//! Newline-delimited JSON at `logs/audit/audit-YYYY-MM-DD.jsonl`, one record
//! per state transition and per command result. Writes are best-effort:
//! failures never block task progress, they increment a counter surfaced via
//! `/health`.

use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Serialize)]
struct AuditRecord<'a> {
    ts: String,
    task_id: &'a str,
    event: &'a str,
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<&'a str>,
    details: serde_json::Value,
}

pub struct AuditLog {
    dir: PathBuf,
    write_failures: AtomicU64,
}

impl AuditLog {
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "could not create audit directory");
        }
        AuditLog { dir, write_failures: AtomicU64::new(0) }
    }

    /// Append one record; never fails the caller.
    pub fn record(
        &self,
        task_id: &str,
        event: &str,
        version: u64,
        actor: Option<&str>,
        details: serde_json::Value,
    ) {
        let now = Utc::now();
        let record = AuditRecord {
            ts: now.to_rfc3339(),
            task_id,
            event,
            version,
            actor,
            details,
        };
        let path = self.dir.join(format!("audit-{}.jsonl", now.format("%Y-%m-%d")));
        if let Err(e) = self.append_line(&path, &record) {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(path = %path.display(), error = %e, "audit write failed");
        }
    }

    fn append_line(&self, path: &std::path::Path, record: &AuditRecord<'_>) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")
    }

    /// Count of failed writes since start, exposed via `/health`.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
