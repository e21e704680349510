// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events broadcast to UI observers.
//!
//! Serializes with `{"type": "event_name", ...fields}` format. Ordering and
//! back-pressure semantics live in the controller's event bus; these are the
//! wire shapes only.

use crate::agent::{Agent, AgentId};
use crate::command::CommandResult;
use crate::task::{Task, TaskId};
use serde::{Deserialize, Serialize};

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

crate::simple_display! {
    OutputStream {
        Stdout => "stdout",
        Stderr => "stderr",
    }
}

/// Typed stream published to every connected UI observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Full snapshot delivered once on subscribe.
    #[serde(rename = "initial_state")]
    InitialState { agents: Vec<Agent>, tasks: Vec<Task> },

    #[serde(rename = "agent_connected")]
    AgentConnected { agent: Agent },

    #[serde(rename = "agent_updated")]
    AgentUpdated { agent: Agent },

    #[serde(rename = "agent_disconnected")]
    AgentDisconnected { agent_id: AgentId },

    /// Whole task with its new version. Never dropped by the bus; a newer
    /// version supersedes an older queued one for the same task.
    #[serde(rename = "task_updated")]
    TaskUpdated { task: Box<Task> },

    #[serde(rename = "task_output")]
    TaskOutput {
        task_id: TaskId,
        command_index: usize,
        stream: OutputStream,
        content: String,
    },

    #[serde(rename = "command_result")]
    CommandResult {
        task_id: TaskId,
        #[serde(flatten)]
        result: CommandResult,
    },

    /// Sentinel left behind when output chunks were dropped under
    /// back-pressure.
    #[serde(rename = "task_output_truncated")]
    TaskOutputTruncated { task_id: TaskId, dropped: usize },
}

impl Event {
    /// Stable event name for logging and audit records.
    pub fn name(&self) -> &'static str {
        match self {
            Event::InitialState { .. } => "initial_state",
            Event::AgentConnected { .. } => "agent_connected",
            Event::AgentUpdated { .. } => "agent_updated",
            Event::AgentDisconnected { .. } => "agent_disconnected",
            Event::TaskUpdated { .. } => "task_updated",
            Event::TaskOutput { .. } => "task_output",
            Event::CommandResult { .. } => "command_result",
            Event::TaskOutputTruncated { .. } => "task_output_truncated",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
