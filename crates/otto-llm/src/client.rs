//! `LlmClient` capability (SPEC_FULL §4.7), generalized from
//! `openibank-llm::providers::LLMProvider` + `router.rs`'s
//! timeout/fallback composition: "propose money, never execute" becomes
//! "propose conversation state, never commit without the Master Decider".

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{LlmError, LlmResult};

/// One advisor call: a prompt in, a parsed JSON object out. Each of the
/// three pipeline stages builds its own prompt and decodes the object into
/// its own output type; the client itself is prompt-agnostic.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: Option<&str>,
        timeout: Duration,
    ) -> LlmResult<serde_json::Value>;
}

/// OpenAI-compatible chat-completions client (vLLM, Ollama's OpenAI shim,
/// hosted providers) - generalized from
/// `openibank-llm::providers::OpenAICompatProvider`, JSON-mode forced on
/// since every stage here expects a structured object back.
pub struct HttpLlmClient {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            default_model: default_model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        model: Option<&str>,
        timeout: Duration,
    ) -> LlmResult<serde_json::Value> {
        let model = model.unwrap_or(&self.default_model);
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            stream: false,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&request).timeout(timeout);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let elapsed_start = std::time::Instant::now();
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout { elapsed_ms: elapsed_start.elapsed().as_millis() as u64 }
            } else {
                LlmError::Network { message: e.to_string() }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed { message: format!("HTTP {status}: {body}") });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidJson { message: e.to_string() })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        serde_json::from_str(&content).map_err(|e| LlmError::InvalidJson { message: e.to_string() })
    }
}

/// Always-unavailable client for deployments with no advisor configured;
/// every stage call fails fast into its deterministic fallback.
pub struct NoLlmClient;

#[async_trait]
impl LlmClient for NoLlmClient {
    async fn complete(
        &self,
        _prompt: &str,
        _model: Option<&str>,
        _timeout: Duration,
    ) -> LlmResult<serde_json::Value> {
        Err(LlmError::Network { message: "no LLM client configured".to_string() })
    }
}
