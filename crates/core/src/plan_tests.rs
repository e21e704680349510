// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn plan_parses_planner_schema_shape() {
    let json = r#"{
        "target_agent": "pi-kitchen",
        "workspace": "ops",
        "workspace_type": "docker",
        "steps": ["check uptime"],
        "reasoning": "simple read-only check",
        "risk_level": "low",
        "requires_approval": false,
        "commands": [{"dir": "~", "run": "uptime"}]
    }"#;
    let plan: Plan = serde_json::from_str(json).unwrap();
    assert_eq!(plan.target_agent_id, Some(AgentId::new("pi-kitchen")));
    assert_eq!(plan.workspace_type, WorkspaceType::Docker);
    assert_eq!(plan.commands.len(), 1);
}

#[test]
fn plan_accepts_controller_field_name_too() {
    let json = r#"{
        "target_agent_id": "pi-attic",
        "workspace": "default",
        "commands": []
    }"#;
    let plan: Plan = serde_json::from_str(json).unwrap();
    assert_eq!(plan.target_agent_id, Some(AgentId::new("pi-attic")));
    assert_eq!(plan.workspace_type, WorkspaceType::Bare);
}

#[test]
fn validate_reports_first_offending_command() {
    let mut plan = Plan::from_commands(vec![
        Command::new("/", "uptime"),
        Command::new("/", ""),
    ]);
    assert_eq!(plan.validate(), Err(CommandError::EmptyRun { index: 1 }));

    plan.commands[1].run = "df -h".to_string();
    plan.commands[1].timeout_seconds = 0;
    assert_eq!(
        plan.validate(),
        Err(CommandError::TimeoutOutOfRange { index: 1, got: 0 })
    );
}

#[test]
fn raise_risk_never_lowers() {
    let mut plan = Plan::from_commands(vec![]);
    plan.raise_risk(RiskLevel::High);
    assert_eq!(plan.risk_level, RiskLevel::High);
    plan.raise_risk(RiskLevel::Low);
    assert_eq!(plan.risk_level, RiskLevel::High);
}

#[yare::parameterized(
    low_medium  = { RiskLevel::Low, RiskLevel::Medium },
    medium_high = { RiskLevel::Medium, RiskLevel::High },
    low_high    = { RiskLevel::Low, RiskLevel::High },
)]
fn risk_levels_are_ordered(lower: RiskLevel, higher: RiskLevel) {
    assert!(lower < higher);
}

#[test]
fn workspace_type_serde_roundtrip() {
    for wt in [WorkspaceType::Bare, WorkspaceType::Docker, WorkspaceType::Venv] {
        let json = serde_json::to_string(&wt).unwrap();
        let parsed: WorkspaceType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wt);
    }
}
