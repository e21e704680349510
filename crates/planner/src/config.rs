// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner provider selection from the environment.
//!
//! `LLM_PROVIDER` picks explicitly; otherwise the first configured API key
//! wins, and with no credentials at all the deterministic stub is used.

use crate::client::{AnthropicClient, OllamaClient, OpenAiClient};
use crate::live::LivePlanner;
use crate::stub::StubPlanner;
use crate::Planner;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MISTRAL_MODEL: &str = "mistral-large-latest";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3";

/// Supported planner providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Stub,
    Anthropic,
    OpenAi,
    Mistral,
    Ollama,
}

drover_core::simple_display! {
    Provider {
        Stub => "stub",
        Anthropic => "anthropic",
        OpenAi => "openai",
        Mistral => "mistral",
        Ollama => "ollama",
    }
}

impl Provider {
    fn parse(s: &str) -> Option<Provider> {
        match s.trim().to_lowercase().as_str() {
            "stub" => Some(Provider::Stub),
            "anthropic" => Some(Provider::Anthropic),
            "openai" => Some(Provider::OpenAi),
            "mistral" => Some(Provider::Mistral),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }
}

/// Resolved planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub provider: Provider,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub mistral_api_key: Option<String>,
    pub mistral_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl PlannerConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let anthropic_api_key = env_var("ANTHROPIC_API_KEY");
        let openai_api_key = env_var("OPENAI_API_KEY");
        let mistral_api_key = env_var("MISTRAL_API_KEY");
        let ollama_configured =
            env_var("OLLAMA_BASE_URL").is_some() || env_var("OLLAMA_MODEL").is_some();

        let provider = match env_var("LLM_PROVIDER").and_then(|v| Provider::parse(&v)) {
            Some(p) => p,
            // Auto-detect by key priority.
            None if anthropic_api_key.is_some() => Provider::Anthropic,
            None if openai_api_key.is_some() => Provider::OpenAi,
            None if mistral_api_key.is_some() => Provider::Mistral,
            None if ollama_configured => Provider::Ollama,
            None => Provider::Stub,
        };

        PlannerConfig {
            provider,
            anthropic_api_key,
            anthropic_model: env_var("ANTHROPIC_MODEL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            openai_api_key,
            openai_model: env_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            mistral_api_key,
            mistral_model: env_var("MISTRAL_MODEL")
                .unwrap_or_else(|| DEFAULT_MISTRAL_MODEL.to_string()),
            ollama_base_url: env_var("OLLAMA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: env_var("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            max_tokens: env_var("LLM_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            timeout: Duration::from_secs(
                env_var("LLM_TIMEOUT_SECONDS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }

    /// Build the planner this configuration describes.
    ///
    /// A provider selected without its credentials falls back to the stub —
    /// the controller must keep planning deterministically rather than fail
    /// every submission.
    pub fn build(&self) -> Arc<dyn Planner> {
        match self.provider {
            Provider::Stub => Arc::new(StubPlanner::new()),
            Provider::Anthropic => match &self.anthropic_api_key {
                Some(key) => Arc::new(LivePlanner::new(
                    "anthropic",
                    Box::new(AnthropicClient::new(
                        key,
                        &self.anthropic_model,
                        self.max_tokens,
                        self.timeout,
                    )),
                )),
                None => self.stub_fallback("anthropic"),
            },
            Provider::OpenAi => match &self.openai_api_key {
                Some(key) => Arc::new(LivePlanner::new(
                    "openai",
                    Box::new(OpenAiClient::openai(
                        key,
                        &self.openai_model,
                        self.max_tokens,
                        self.timeout,
                    )),
                )),
                None => self.stub_fallback("openai"),
            },
            Provider::Mistral => match &self.mistral_api_key {
                Some(key) => Arc::new(LivePlanner::new(
                    "mistral",
                    Box::new(OpenAiClient::mistral(
                        key,
                        &self.mistral_model,
                        self.max_tokens,
                        self.timeout,
                    )),
                )),
                None => self.stub_fallback("mistral"),
            },
            Provider::Ollama => Arc::new(LivePlanner::new(
                "ollama",
                Box::new(OllamaClient::new(
                    &self.ollama_base_url,
                    &self.ollama_model,
                    self.timeout,
                )),
            )),
        }
    }

    fn stub_fallback(&self, wanted: &str) -> Arc<dyn Planner> {
        tracing::warn!(provider = wanted, "provider selected without credentials, using stub planner");
        Arc::new(StubPlanner::new())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
