// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-planner: turns a natural-language request plus the agent inventory
//! into a structured [`Plan`].
//!
//! Two concrete planners exist behind one narrow trait: the live planner
//! delegates to an LLM through the [`CompletionClient`] boundary, and the
//! stub planner answers from keyword heuristics whenever no credentials are
//! configured. Vendor SDK shapes never leak past the client module.

pub mod client;
pub mod config;
mod live;
mod prompt;
mod stub;

use async_trait::async_trait;
use drover_core::{Agent, Plan};
use thiserror::Error;

pub use client::{CompletionClient, CompletionError};
pub use config::{PlannerConfig, Provider};
pub use live::LivePlanner;
pub use stub::StubPlanner;

/// Planning failures surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The model produced unparsable output twice in a row.
    #[error("planner produced unparsable output: {0}")]
    Format(String),

    #[error("completion request failed: {0}")]
    Completion(#[from] CompletionError),
}

/// The planner capability: one operation, two implementations.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Translate a request and the current inventory into a plan.
    async fn plan(&self, request: &str, inventory: &[Agent]) -> Result<Plan, PlannerError>;

    /// Short provider label for `/health`.
    fn provider_name(&self) -> &'static str;
}
