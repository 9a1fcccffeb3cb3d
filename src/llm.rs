use crate::config::LlmConfig;
use crate::error::{MapperError, Result};
use async_trait::async_trait;
use std::str::FromStr;
use tracing::{debug, warn};

/// HTTP dialect spoken by the local model server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmApi {
    /// llama.cpp server native `/completion` endpoint
    Completion,
    /// OpenAI-compatible `/chat/completions` endpoint
    ChatCompletions,
}

impl FromStr for LlmApi {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "completion" | "llama" | "llamacpp" => Ok(LlmApi::Completion),
            "chat" | "openai" | "chat_completions" => Ok(LlmApi::ChatCompletions),
            other => Err(MapperError::Config(format!(
                "unknown LLM API '{}' (expected 'completion' or 'chat')",
                other
            ))),
        }
    }
}

/// Anything that turns a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MapperError::Llm(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        let (url, body) = match self.config.api {
            LlmApi::Completion => (
                format!("{}/completion", self.config.base_url),
                serde_json::json!({
                    "prompt": prompt,
                    "temperature": self.config.temperature,
                    "n_predict": self.config.max_tokens,
                    "stream": false,
                }),
            ),
            LlmApi::ChatCompletions => (
                format!("{}/chat/completions", self.config.base_url),
                serde_json::json!({
                    "model": self.config.model,
                    "messages": [
                        {"role": "user", "content": prompt}
                    ],
                    "temperature": self.config.temperature,
                    "max_tokens": self.config.max_tokens,
                }),
            ),
        };

        debug!("POST {}", url);
        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MapperError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MapperError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MapperError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(MapperError::Llm(format!("LLM API error: {}", error)));
        }

        match self.config.api {
            LlmApi::Completion => completion_content(&response_json),
            LlmApi::ChatCompletions => chat_content(&response_json),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.call_llm(prompt).await
    }
}

fn completion_content(response_json: &serde_json::Value) -> Result<String> {
    if response_json.get("stopped_limit").and_then(|v| v.as_bool()) == Some(true) {
        warn!("LLM response was truncated by the token limit");
    }
    response_json
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| MapperError::Llm(format!("No content in LLM response: {}", response_json)))
}

fn chat_content(response_json: &serde_json::Value) -> Result<String> {
    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| MapperError::Llm(format!("No choices in LLM response: {}", response_json)))?;

    if choice.get("finish_reason").and_then(|r| r.as_str()) == Some("length") {
        warn!("LLM response was truncated by the token limit");
    }

    choice["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MapperError::Llm(format!("No content in LLM response: {}", response_json)))
}
