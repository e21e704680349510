// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command records and their results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default per-command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
/// Lower bound for a command timeout; zero is rejected outright.
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
/// Upper bound; larger values are clamped down during normalization.
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// Synthetic exit code recorded when a command was cancelled.
pub const EXIT_CANCELLED: i32 = -1;
/// Synthetic exit code recorded when a command timed out.
pub const EXIT_TIMED_OUT: i32 = -2;
/// Synthetic exit code recorded when the agent disconnected mid-command.
pub const EXIT_DISCONNECTED: i32 = -3;

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Validation errors for commands inside a plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command {index}: timeout_seconds must be between {MIN_TIMEOUT_SECONDS} and {MAX_TIMEOUT_SECONDS}, got {got}")]
    TimeoutOutOfRange { index: usize, got: u64 },

    #[error("command {index}: empty shell fragment")]
    EmptyRun { index: usize },
}

/// One shell fragment targeted at an agent workspace. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Working directory on the agent.
    pub dir: String,
    /// Shell fragment to execute.
    pub run: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

impl Command {
    pub fn new(dir: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run: run.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            continue_on_error: false,
            env: None,
        }
    }

    /// Check the invariants the orchestrator enforces at plan intake.
    ///
    /// `timeout_seconds == 0` is an error; values above the maximum are not —
    /// they are clamped by [`Command::normalize`].
    pub fn validate(&self, index: usize) -> Result<(), CommandError> {
        if self.run.trim().is_empty() {
            return Err(CommandError::EmptyRun { index });
        }
        if self.timeout_seconds < MIN_TIMEOUT_SECONDS {
            return Err(CommandError::TimeoutOutOfRange { index, got: self.timeout_seconds });
        }
        Ok(())
    }

    /// Clamp the timeout into the accepted range.
    pub fn normalize(&mut self) {
        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            self.timeout_seconds = MAX_TIMEOUT_SECONDS;
        }
    }

    /// One-line summary for error messages: the first few words of `run`.
    pub fn summary(&self) -> &str {
        crate::id::short(self.run.trim(), 48)
    }
}

/// Terminal record of one executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_index: usize,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub duration_ms: u64,
    pub completed_at_ms: u64,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
