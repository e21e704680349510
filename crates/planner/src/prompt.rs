// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt assembly for the live planner.

use drover_core::Agent;
use std::fmt::Write;

/// The Plan JSON schema, verbatim as shown to the model.
const PLAN_SCHEMA: &str = r#"{ "target_agent": "<agent id, optional>",
  "target_role": "<role tag, optional>",
  "workspace": "<workspace name>",
  "workspace_type": "bare" | "docker" | "venv",
  "steps": ["<human-readable step>", ...],
  "reasoning": "<why this plan fulfils the request>",
  "risk_level": "low" | "medium" | "high",
  "requires_approval": true | false,
  "commands": [ { "dir": "<working directory>", "run": "<shell fragment>",
                  "timeout_seconds": 300, "continue_on_error": false,
                  "env": {"KEY": "value"} } ] }"#;

/// System prompt: who the model is, the inventory it can target, and the
/// exact output contract.
pub fn system_prompt(inventory: &[Agent]) -> String {
    let mut prompt = String::from(
        "You are the planning engine of a task-orchestration controller. \
         You translate an operator's request into a JSON execution plan of \
         ordered shell commands that run on exactly one of the connected \
         agents listed below.\n\nConnected agents:\n",
    );
    prompt.push_str(&render_inventory(inventory));
    prompt.push_str("\nReply with a single JSON object matching this schema, and nothing else:\n");
    prompt.push_str(PLAN_SCHEMA);
    prompt.push_str(
        "\n\nRules: prefer read-only commands; set requires_approval to true \
         whenever a command mutates system state; never emit destructive \
         commands such as recursive deletes of / or raw device writes.",
    );
    prompt
}

/// Correction prompt sent once after an unparsable reply.
pub fn correction_prompt(request: &str) -> String {
    format!(
        "Your previous reply was not valid JSON matching the plan schema. \
         Reply again for the request below with ONLY the JSON object, no \
         prose and no code fences.\n\nRequest: {request}"
    )
}

/// Agent inventory as the bullet list embedded in the system prompt.
pub fn render_inventory(inventory: &[Agent]) -> String {
    if inventory.is_empty() {
        return "- (no agents connected)\n".to_string();
    }
    let mut out = String::new();
    for agent in inventory {
        let roles: Vec<&str> = agent.roles.iter().map(String::as_str).collect();
        let tags: Vec<&str> = agent.tags.iter().map(String::as_str).collect();
        let caps: Vec<String> = agent
            .capabilities
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let _ = writeln!(
            out,
            "- {} ({}) status={} roles=[{}] tags=[{}] capabilities=[{}]",
            agent.id,
            agent.hostname,
            agent.status,
            roles.join(", "),
            tags.join(", "),
            caps.join(", "),
        );
    }
    out
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
