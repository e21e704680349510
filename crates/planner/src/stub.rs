// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic keyword-heuristic planner.
//!
//! Used whenever no LLM credentials are configured. Never fails: unknown
//! requests map to a harmless host inspection.

use crate::{Planner, PlannerError};
use async_trait::async_trait;
use drover_core::{Agent, Command, Plan, RiskLevel};

pub struct StubPlanner;

impl StubPlanner {
    pub fn new() -> Self {
        StubPlanner
    }

    fn build_plan(request: &str) -> Plan {
        let lowered = request.to_lowercase();

        let (steps, commands, reasoning) = if lowered.contains("deploy") {
            (
                vec![
                    "Pull the latest sources".to_string(),
                    "Install dependencies".to_string(),
                    "Restart the application service".to_string(),
                ],
                vec![
                    Command::new("~", "git pull origin main"),
                    Command::new("~", "pip install -r requirements.txt"),
                    Command::new("~", "sudo systemctl restart app"),
                ],
                "deploy keyword: pull, install, restart".to_string(),
            )
        } else if lowered.contains("update") || lowered.contains("pull") {
            (
                vec!["Pull the latest sources".to_string()],
                vec![Command::new("~", "git pull origin main")],
                "update keyword: refresh the working copy".to_string(),
            )
        } else if lowered.contains("status") || lowered.contains("check") {
            (
                vec!["Report uptime and running services".to_string()],
                vec![Command::new(
                    "~",
                    "uptime && systemctl list-units --type=service --state=running",
                )],
                "status keyword: read-only host inspection".to_string(),
            )
        } else {
            (
                vec!["Inspect host load".to_string()],
                vec![Command::new("~", "uptime")],
                "no keyword matched: default to a harmless inspection".to_string(),
            )
        };

        let mut plan = Plan::from_commands(commands);
        plan.steps = steps;
        plan.reasoning = reasoning;
        plan.risk_level = RiskLevel::Low;
        plan
    }
}

impl Default for StubPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for StubPlanner {
    async fn plan(&self, request: &str, _inventory: &[Agent]) -> Result<Plan, PlannerError> {
        Ok(Self::build_plan(request))
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
#[path = "stub_tests.rs"]
mod tests;
