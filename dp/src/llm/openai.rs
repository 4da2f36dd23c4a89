//! OpenAI Chat Completions client
//!
//! Transient failures (timeouts, connection errors, 5xx) are retried here with
//! jittered exponential backoff. A 429 is surfaced at once as
//! [`LlmError::RateLimited`] so the caller can honour the provider's wait.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// Resends of one request after a transient failure
pub const TRANSIENT_RETRIES: u32 = 3;

const BACKOFF_BASE_MS: u64 = 1000;

/// Wait assumed when a 429 carries no usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct OpenAIClient {
    model: String,
    api_key: String,
    endpoint: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAIClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config
            .api_key()
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let system = (!request.system_prompt.is_empty()).then(|| ChatMessage {
            role: "system",
            content: &request.system_prompt,
        });
        let messages = system
            .into_iter()
            .chain(request.messages.iter().map(|m| ChatMessage {
                role: m.role.as_str(),
                content: &m.content,
            }))
            .collect();

        // Reasoning models only accept max_completion_tokens
        let limit = request.max_tokens.min(self.max_tokens);
        let reasoning = ["o1", "o3", "gpt-5"].iter().any(|p| self.model.starts_with(p));

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: (!reasoning).then_some(limit),
            max_completion_tokens: reasoning.then_some(limit),
            temperature: request.temperature,
        }
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = retry_after(response.headers());
            debug!(?retry_after, "send_once: rate limited");
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        Ok(chat.into_completion())
    }
}

/// Seconds from a Retry-After header, or the default wait
fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

fn backoff(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS.saturating_mul(1 << attempt.min(10));
    let jitter = rand::rng().random_range(0..=base / 4);
    Duration::from_millis(base + jitter)
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, max_tokens = request.max_tokens, "OpenAIClient::complete: called");
        let body = self.chat_request(&request);

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Err(e) if e.is_transient() && attempt < TRANSIENT_RETRIES => {
                    let wait = backoff(attempt);
                    attempt += 1;
                    warn!(attempt, ?wait, error = %e, "Transient provider failure, retrying");
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl ChatResponse {
    fn into_completion(self) -> CompletionResponse {
        let usage = self
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let (content, stop_reason) = match self.choices.into_iter().next() {
            Some(choice) => (choice.message.content, StopReason::from_openai(choice.finish_reason.as_deref())),
            None => (None, StopReason::EndTurn),
        };
        CompletionResponse {
            content,
            stop_reason,
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(model: &str, max_tokens: u32) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test-key".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            http: Client::new(),
            max_tokens,
        }
    }

    fn body(client: &OpenAIClient, request: &CompletionRequest) -> serde_json::Value {
        serde_json::to_value(client.chat_request(request)).unwrap()
    }

    #[test]
    fn test_single_prompt_body() {
        let client = client("gpt-4o-mini", 8192);
        let body = body(&client, &CompletionRequest::prompt("Plan the day", 1000, Some(0.1)));

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Plan the day");
        assert!(body["temperature"].as_f64().is_some());
    }

    #[test]
    fn test_system_prompt_goes_first() {
        let client = client("gpt-4o-mini", 8192);
        let mut request = CompletionRequest::prompt("Hello", 100, None);
        request.system_prompt = "Be terse".to_string();

        let body = body(&client, &request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_token_limit_capped_by_config() {
        let client = client("gpt-4o-mini", 1000);
        let body = body(&client, &CompletionRequest::prompt("Test", 5000, None));
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_reasoning_models_use_completion_tokens() {
        let client = client("o3-mini", 4000);
        let body = body(&client, &CompletionRequest::prompt("Test", 2000, None));
        assert_eq!(body["max_completion_tokens"], 2000);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_without_usage() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"plan\":[]}"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();

        let resp = chat.into_completion();
        assert_eq!(resp.content.as_deref(), Some("{\"plan\":[]}"));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert_eq!(resp.usage, TokenUsage::default());
    }

    #[test]
    fn test_response_with_usage_and_length_stop() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"partial"},"finish_reason":"length"}],
                "usage":{"prompt_tokens":12,"completion_tokens":30}}"#,
        )
        .unwrap();

        let resp = chat.into_completion();
        assert_eq!(resp.stop_reason, StopReason::MaxTokens);
        assert_eq!(resp.usage.total(), 42);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after(&headers), Duration::from_secs(DEFAULT_RETRY_AFTER_SECS));
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Duration::from_secs(7));
    }

    #[test]
    fn test_backoff_grows() {
        assert!(backoff(0) >= Duration::from_millis(BACKOFF_BASE_MS));
        assert!(backoff(2) >= Duration::from_millis(4 * BACKOFF_BASE_MS));
    }
}
