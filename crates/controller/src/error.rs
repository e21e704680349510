// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller error taxonomy and its HTTP mapping.
//!
//! Errors are returned to callers as `{"detail": <string>}` with 4xx for
//! validation, 404 for unknown IDs, 409 for illegal state transitions, 503
//! when no agent is available, and 500 otherwise. Task-level failures
//! (command exits, timeouts, disconnects) are not API errors — they land in
//! the task's `error` field.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drover_core::InvalidTransition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed request or schema violation; the task is never created.
    #[error("{0}")]
    Validation(String),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("agent {0} not found")]
    AgentNotFound(String),

    /// Approve/cancel attempted in the wrong state; the task is unchanged.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// No suitable online agent at dispatch.
    #[error("no suitable agent available")]
    AgentUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::TaskNotFound(_) | OrchestratorError::AgentNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            OrchestratorError::InvalidTransition(_) => StatusCode::CONFLICT,
            OrchestratorError::AgentUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            // Generic message to the caller; full detail stays in the log.
            return (status, Json(serde_json::json!({"detail": "internal error"}))).into_response();
        }
        (status, Json(serde_json::json!({"detail": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
