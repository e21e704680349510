// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the controller.

use std::path::PathBuf;
use std::time::Duration;

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// HTTP listen port (`PORT`, default 8000).
pub fn port() -> u16 {
    parsed("PORT").unwrap_or(8000)
}

/// Heartbeat staleness threshold before an agent is reaped
/// (`AGENT_HEARTBEAT_TIMEOUT_SECONDS`, default 60).
pub fn heartbeat_timeout() -> Duration {
    Duration::from_secs(parsed("AGENT_HEARTBEAT_TIMEOUT_SECONDS").unwrap_or(60))
}

/// How long terminal tasks are retained before the sweep prunes them
/// (`TASK_RETENTION_HOURS`, default 168).
pub fn task_retention() -> Duration {
    Duration::from_secs(parsed::<u64>("TASK_RETENTION_HOURS").unwrap_or(168) * 3600)
}

/// Extra wall-clock allowance on top of a command's own timeout
/// (`NETWORK_SLACK_SECONDS`, default 10).
pub fn network_slack() -> Duration {
    Duration::from_secs(parsed("NETWORK_SLACK_SECONDS").unwrap_or(10))
}

/// How long a cancel waits for the agent's own result before the controller
/// closes the command forcibly (`CANCEL_GRACE_SECONDS`, default 5).
pub fn cancel_grace() -> Duration {
    Duration::from_secs(parsed("CANCEL_GRACE_SECONDS").unwrap_or(5))
}

/// Directory for append-only audit files (`AUDIT_LOG_DIR`, default `logs/audit`).
pub fn audit_log_dir() -> PathBuf {
    std::env::var("AUDIT_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("logs/audit"))
}

/// Log filter (`LOG_LEVEL`, default `info`).
pub fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}
