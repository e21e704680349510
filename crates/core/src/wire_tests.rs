// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::AgentId;

#[test]
fn hello_fields_are_inlined_in_the_frame() {
    let json = r#"{
        "type": "agent_hello",
        "id": "pi-kitchen",
        "hostname": "pi-kitchen.local",
        "roles": ["web"],
        "tags": [],
        "capabilities": {"docker": "true"}
    }"#;
    let msg: AgentMessage = serde_json::from_str(json).unwrap();
    match msg {
        AgentMessage::Hello(hello) => {
            assert_eq!(hello.id, AgentId::new("pi-kitchen"));
            assert_eq!(hello.hostname, "pi-kitchen.local");
        }
        other => panic!("expected hello, got {other:?}"),
    }
}

#[test]
fn unknown_message_types_map_to_catch_all() {
    let msg: AgentMessage =
        serde_json::from_str(r#"{"type": "telemetry_v2", "whatever": 1}"#).unwrap();
    assert_eq!(msg, AgentMessage::Unknown);
}

#[test]
fn heartbeat_telemetry_defaults_when_missing() {
    let msg: AgentMessage = serde_json::from_str(r#"{"type": "heartbeat"}"#).unwrap();
    match msg {
        AgentMessage::Heartbeat { telemetry } => assert_eq!(telemetry, Telemetry::default()),
        other => panic!("expected heartbeat, got {other:?}"),
    }
}

#[test]
fn command_result_stderr_is_optional() {
    let msg: AgentMessage = serde_json::from_str(
        r#"{"type": "command_result", "task_id": "tsk-1", "command_index": 0,
            "exit_code": 1, "duration_ms": 88}"#,
    )
    .unwrap();
    match msg {
        AgentMessage::CommandResult { exit_code, stderr, .. } => {
            assert_eq!(exit_code, 1);
            assert!(stderr.is_none());
        }
        other => panic!("expected command_result, got {other:?}"),
    }
}

#[test]
fn command_execute_roundtrip() {
    let msg = ControllerMessage::CommandExecute {
        task_id: TaskId::new("tsk-7"),
        command_index: 1,
        dir: "/opt/app".to_string(),
        run: "git pull origin main".to_string(),
        timeout_seconds: 300,
        env: None,
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"command_execute\""));
    assert!(!json.contains("env"));
    let parsed: ControllerMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn ping_is_a_bare_frame() {
    assert_eq!(
        serde_json::to_string(&ControllerMessage::Ping).unwrap(),
        r#"{"type":"ping"}"#
    );
}

#[test]
fn task_output_roundtrip() {
    let msg = AgentMessage::TaskOutput {
        task_id: TaskId::new("tsk-1"),
        command_index: 0,
        stream: OutputStream::Stdout,
        content: "hello\n".to_string(),
    };
    let json = serde_json::to_string(&msg).unwrap();
    let parsed: AgentMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, msg);
}
