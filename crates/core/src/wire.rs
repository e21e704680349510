// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent link wire protocol.
//!
//! One JSON object per WebSocket message, UTF-8, tagged by `type`. Unknown
//! types deserialize to [`AgentMessage::Unknown`] so the controller can log
//! and ignore them without dropping the link.

use crate::agent::{AgentHello, Telemetry};
use crate::event::OutputStream;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages an agent sends to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentMessage {
    #[serde(rename = "agent_hello")]
    Hello(AgentHello),

    #[serde(rename = "heartbeat")]
    Heartbeat {
        #[serde(default)]
        telemetry: Telemetry,
    },

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
        command_index: usize,
        exit_code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
        #[serde(default)]
        duration_ms: u64,
    },

    #[serde(rename = "ack")]
    Ack { msg_id: String },

    /// Catch-all for unknown message types (logged and ignored).
    #[serde(other, skip_serializing)]
    Unknown,
}

/// Messages the controller sends to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerMessage {
    #[serde(rename = "command_execute")]
    CommandExecute {
        task_id: TaskId,
        command_index: usize,
        dir: String,
        run: String,
        timeout_seconds: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        env: Option<BTreeMap<String, String>>,
    },

    #[serde(rename = "command_cancel")]
    CommandCancel { task_id: TaskId, command_index: usize },

    #[serde(rename = "ping")]
    Ping,
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
