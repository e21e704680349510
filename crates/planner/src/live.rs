// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM-backed planner with a one-shot JSON-reformat retry.

use crate::client::CompletionClient;
use crate::{prompt, Planner, PlannerError};
use async_trait::async_trait;
use drover_core::{Agent, Plan};

/// Planner that delegates to an external model through a completion client.
pub struct LivePlanner {
    provider: &'static str,
    client: Box<dyn CompletionClient>,
}

impl LivePlanner {
    pub fn new(provider: &'static str, client: Box<dyn CompletionClient>) -> Self {
        Self { provider, client }
    }

    fn parse_reply(reply: &str) -> Result<Plan, String> {
        let json = extract_json(reply).ok_or_else(|| "no JSON object found".to_string())?;
        serde_json::from_str::<Plan>(json).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Planner for LivePlanner {
    async fn plan(&self, request: &str, inventory: &[Agent]) -> Result<Plan, PlannerError> {
        let system = prompt::system_prompt(inventory);

        let reply = self.client.complete(&system, request).await?;
        let first_error = match Self::parse_reply(&reply) {
            Ok(plan) => return Ok(plan),
            Err(e) => e,
        };
        tracing::warn!(
            provider = self.provider,
            error = %first_error,
            "planner reply was not valid JSON, retrying once"
        );

        let retry = self
            .client
            .complete(&system, &prompt::correction_prompt(request))
            .await?;
        Self::parse_reply(&retry).map_err(|second_error| {
            tracing::error!(
                provider = self.provider,
                error = %second_error,
                "planner reply unparsable after retry"
            );
            PlannerError::Format(second_error)
        })
    }

    fn provider_name(&self) -> &'static str {
        self.provider
    }
}

/// Pull a JSON object out of a model reply.
///
/// Accepts fenced blocks (```json ... ``` or bare ```), otherwise falls back
/// to the outermost brace span.
fn extract_json(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();

    if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        // Skip a language tag like `json` up to the first newline.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(fence_end) = body.find("```") {
            let inner = body[..fence_end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
