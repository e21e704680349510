// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST handlers.

use super::AppState;
use crate::error::OrchestratorError;
use crate::orchestrator::{ApproveRequest, Health, SubmitRequest};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use drover_core::{Agent, AgentId, AgentStatus, Task, TaskId, TaskStatus};
use serde::Deserialize;

const DEFAULT_TASK_LIMIT: usize = 100;

pub(super) async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(state.health())
}

#[derive(Deserialize)]
pub(super) struct AgentQuery {
    status: Option<AgentStatus>,
    role: Option<String>,
}

pub(super) async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
) -> Json<Vec<Agent>> {
    let agents = state
        .registry
        .snapshot()
        .into_iter()
        .filter(|a| query.status.is_none_or(|s| a.status == s))
        .filter(|a| query.role.as_deref().is_none_or(|r| a.has_role(r)))
        .collect();
    Json(agents)
}

pub(super) async fn remove_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    let agent_id = AgentId::new(id);
    state.remove_agent(&agent_id)?;
    Ok(Json(serde_json::json!({"status": "removed", "agent_id": agent_id})))
}

#[derive(Deserialize)]
pub(super) struct TaskQuery {
    status: Option<TaskStatus>,
    limit: Option<usize>,
}

pub(super) async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Json<Vec<Task>> {
    Json(state.store.list(query.status, query.limit.unwrap_or(DEFAULT_TASK_LIMIT)))
}

pub(super) async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, OrchestratorError> {
    Ok(Json(state.get_task(&TaskId::new(id))?))
}

pub(super) async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Task>), OrchestratorError> {
    let task = state.submit(body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub(super) async fn approve_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<Task>, OrchestratorError> {
    Ok(Json(state.approve(&TaskId::new(id), body, None)?))
}

pub(super) async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, OrchestratorError> {
    Ok(Json(state.cancel(&TaskId::new(id))?))
}
