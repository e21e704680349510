// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identity and lifecycle state machine.
//!
//! Status transitions are monotonic on a fixed graph; terminal states are
//! sinks. Version bookkeeping (strictly increasing on every mutation) lives
//! in the task store — this module only validates and applies transitions.

use crate::agent::AgentId;
use crate::command::CommandResult;
use crate::plan::Plan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task. Never reused.
    pub struct TaskId("tsk-");
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    AwaitingApproval,
    Ready,
    Running,
    Completed,
    Failed,
    Rejected,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Planning => "planning",
        AwaitingApproval => "awaiting_approval",
        Ready => "ready",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    /// Terminal states are sinks.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Rejected
                | TaskStatus::Cancelled
        )
    }

    /// Legal edges of the lifecycle graph.
    ///
    /// Cancellation is valid from every non-terminal state. `Ready` may jump
    /// straight to `Completed` (empty plan) or `Failed` (no agent available
    /// at dispatch).
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Planning) => true,
            (Planning, AwaitingApproval | Ready | Failed) => true,
            (AwaitingApproval, Ready | Rejected) => true,
            (Ready, Running | Completed | Failed) => true,
            (Running, Completed | Failed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Attempted illegal status transition; the task is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Who decided an approval gate, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub decided_at_ms: u64,
}

/// A tracked unit of work from submission to terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// The original natural-language request.
    pub request: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<AgentId>,
    #[serde(default)]
    pub command_results: Vec<CommandResult>,
    /// Concatenated output stream, `"[cmd N] "` framed before each command's
    /// first chunk.
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRecord>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// Monotonically increasing mutation counter; observers use it to
    /// coalesce duplicates.
    pub version: u64,
    /// Which command last appended output (framing bookkeeping).
    #[serde(skip)]
    last_output_index: Option<usize>,
}

impl Task {
    pub fn new(request: impl Into<String>, epoch_ms: u64) -> Self {
        Task {
            id: TaskId::generate(),
            request: request.into(),
            status: TaskStatus::Pending,
            plan: None,
            assigned_agent_id: None,
            command_results: Vec::new(),
            output: String::new(),
            error: None,
            approval: None,
            created_at_ms: epoch_ms,
            updated_at_ms: epoch_ms,
            version: 1,
            last_output_index: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status transition, or reject it leaving the task unchanged.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    /// Append an output chunk, framing the first chunk of each command.
    pub fn append_output(&mut self, command_index: usize, content: &str) {
        if self.last_output_index != Some(command_index) {
            self.output.push_str(&format!("[cmd {command_index}] "));
            self.last_output_index = Some(command_index);
        }
        self.output.push_str(content);
    }

    /// Record a command's terminal result.
    pub fn record_result(&mut self, result: CommandResult) {
        self.command_results.push(result);
    }

    /// Number of commands in the plan, zero while unplanned.
    pub fn command_count(&self) -> usize {
        self.plan.as_ref().map_or(0, |p| p.commands.len())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
