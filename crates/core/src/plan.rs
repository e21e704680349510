// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution plans: an ordered command sequence targeted at one agent and
//! workspace, plus the advisory metadata the approval gate consumes.

use crate::agent::AgentId;
use crate::command::{Command, CommandError};
use serde::{Deserialize, Serialize};

/// Execution context on the agent side, referenced by name only at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceType {
    #[default]
    Bare,
    Docker,
    Venv,
}

crate::simple_display! {
    WorkspaceType {
        Bare => "bare",
        Docker => "docker",
        Venv => "venv",
    }
}

/// Advisory risk tag; combined with the safety verdict it decides whether
/// human approval is required.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

crate::simple_display! {
    RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

/// A validated, ordered specification of commands fulfilling one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Pin to one agent. The planner's JSON schema calls this `target_agent`.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target_agent")]
    pub target_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_role: Option<String>,
    pub workspace: String,
    #[serde(default)]
    pub workspace_type: WorkspaceType,
    /// Human-readable step descriptions, one per logical step.
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_approval: bool,
    pub commands: Vec<Command>,
}

impl Plan {
    /// A minimal plan running the given commands in the default workspace.
    pub fn from_commands(commands: Vec<Command>) -> Self {
        Plan {
            target_agent_id: None,
            target_role: None,
            workspace: "default".to_string(),
            workspace_type: WorkspaceType::Bare,
            steps: Vec::new(),
            reasoning: String::new(),
            risk_level: RiskLevel::Low,
            requires_approval: false,
            commands,
        }
    }

    /// Validate every command; the first violation wins.
    pub fn validate(&self) -> Result<(), CommandError> {
        for (index, command) in self.commands.iter().enumerate() {
            command.validate(index)?;
        }
        Ok(())
    }

    /// Clamp per-command timeouts into range.
    pub fn normalize(&mut self) {
        for command in &mut self.commands {
            command.normalize();
        }
    }

    /// Raise the risk level; never lowers it.
    pub fn raise_risk(&mut self, level: RiskLevel) {
        if level > self.risk_level {
            self.risk_level = level;
        }
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
