// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The LLM boundary: one operation, `complete(system, user) -> String`.
//!
//! Each provider wraps its vendor HTTP API here; none of the vendor JSON
//! shapes escape this module.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MISTRAL_URL: &str = "https://api.mistral.ai/v1/chat/completions";

/// Errors crossing the LLM boundary.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("completion response carried no text content")]
    MissingContent,
}

/// A single operation over an LLM vendor: complete a prompt pair into text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CompletionError::Api { status: status.as_u16(), body })
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Anthropic messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });
        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let json: serde_json::Value = error_for_status(response).await?.json().await?;
        json["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(CompletionError::MissingContent)
    }
}

/// OpenAI-compatible chat completions API; Mistral speaks the same shape.
pub struct OpenAiClient {
    client: reqwest::Client,
    url: &'static str,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            url: OPENAI_URL,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn mistral(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            url: MISTRAL_URL,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let messages = [
            ChatMessage { role: "system", content: system },
            ChatMessage { role: "user", content: user },
        ];
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        let response = self
            .client
            .post(self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json: serde_json::Value = error_for_status(response).await?.json().await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(CompletionError::MissingContent)
    }
}

/// Local Ollama instance.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let messages = [
            ChatMessage { role: "system", content: system },
            ChatMessage { role: "user", content: user },
        ];
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(&body).send().await?;
        let json: serde_json::Value = error_for_status(response).await?.json().await?;
        json["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(CompletionError::MissingContent)
    }
}
