// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::TaskStatus;

#[yare::parameterized(
    validation  = { OrchestratorError::Validation("bad".into()), StatusCode::BAD_REQUEST },
    task_404    = { OrchestratorError::TaskNotFound("tsk-x".into()), StatusCode::NOT_FOUND },
    agent_404   = { OrchestratorError::AgentNotFound("agt-x".into()), StatusCode::NOT_FOUND },
    no_agent    = { OrchestratorError::AgentUnavailable, StatusCode::SERVICE_UNAVAILABLE },
    internal    = { OrchestratorError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR },
)]
fn status_codes(error: OrchestratorError, expected: StatusCode) {
    assert_eq!(error.status_code(), expected);
}

#[test]
fn invalid_transition_maps_to_conflict() {
    let error: OrchestratorError = InvalidTransition {
        from: TaskStatus::Completed,
        to: TaskStatus::Running,
    }
    .into();
    assert_eq!(error.status_code(), StatusCode::CONFLICT);
    assert!(error.to_string().contains("completed"));
    assert!(error.to_string().contains("running"));
}
