// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST and WebSocket surface.
//!
//! Thin layer binding HTTP to the orchestrator; transport concerns only.

mod routes;
mod ws_agent;
mod ws_client;

use crate::orchestrator::Orchestrator;
use axum::routing::{delete, get, post};
use axum::Router;
use drover_core::SystemClock;
use std::sync::Arc;

/// Shared handler state.
pub type AppState = Arc<Orchestrator<SystemClock>>;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/agents", get(routes::list_agents))
        .route("/api/agents/:id", delete(routes::remove_agent))
        .route("/api/tasks", get(routes::list_tasks).post(routes::create_task))
        .route("/api/tasks/:id", get(routes::get_task))
        .route("/api/tasks/:id/approve", post(routes::approve_task))
        .route("/api/tasks/:id/cancel", post(routes::cancel_task))
        .route("/ws/client", get(ws_client::upgrade))
        .route("/ws/agent", get(ws_agent::upgrade))
        .with_state(state)
}
