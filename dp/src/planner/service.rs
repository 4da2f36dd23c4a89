//! GenerationService - the planner's view of the model
//!
//! Every request runs under an explicit deadline so one stuck call cannot
//! stall a person's pipeline. Network retry stays inside the client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::error::StageError;
use crate::config::{LlmConfig, PlannerConfig};
use crate::llm::{CompletionRequest, LlmClient, StopReason};

/// Upper bound on random jitter added to rate-limit sleeps
const RATE_LIMIT_JITTER_MS: u64 = 500;

/// Deadline-bounded `ask(prompt) -> text`
pub struct GenerationService {
    client: Arc<dyn LlmClient>,
    deadline: Duration,
    max_tokens: u32,
    temperature: Option<f32>,
    rate_limit_retries: u32,
    requests: AtomicU64,
    tokens: AtomicU64,
}

impl GenerationService {
    pub fn new(client: Arc<dyn LlmClient>, llm: &LlmConfig, planner: &PlannerConfig) -> Self {
        debug!(deadline_ms = planner.request_deadline_ms, "GenerationService::new: called");
        Self {
            client,
            deadline: Duration::from_millis(planner.request_deadline_ms),
            max_tokens: llm.max_tokens,
            temperature: Some(llm.temperature),
            rate_limit_retries: llm.max_retries,
            requests: AtomicU64::new(0),
            tokens: AtomicU64::new(0),
        }
    }

    /// Service with default request settings and the given deadline
    pub fn with_deadline(client: Arc<dyn LlmClient>, deadline: Duration) -> Self {
        let planner = PlannerConfig {
            request_deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            ..PlannerConfig::default()
        };
        Self::new(client, &LlmConfig::default(), &planner)
    }

    /// Ask for text
    ///
    /// `objective` only labels the request in logs.
    pub async fn ask(&self, prompt: &str, objective: &str) -> Result<String, StageError> {
        debug!(objective, prompt_len = prompt.len(), "ask: called");
        let mut rate_limited = 0;
        loop {
            let request = CompletionRequest::prompt(prompt, self.max_tokens, self.temperature);
            self.requests.fetch_add(1, Ordering::Relaxed);

            let outcome = tokio::time::timeout(self.deadline, self.client.complete(request)).await;
            let response = match outcome {
                Err(_) => {
                    warn!(objective, deadline = ?self.deadline, "Request deadline exceeded");
                    return Err(StageError::Deadline(self.deadline));
                }
                Ok(Err(e)) if e.is_rate_limit() && rate_limited < self.rate_limit_retries => {
                    rate_limited += 1;
                    let jitter = Duration::from_millis(rand::rng().random_range(0..=RATE_LIMIT_JITTER_MS));
                    let wait = e.retry_after().unwrap_or(Duration::from_secs(60)) + jitter;
                    warn!(objective, attempt = rate_limited, wait = ?wait, "Rate limited, sleeping");
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Ok(Err(e)) if e.is_request_scoped() => {
                    warn!(objective, error = %e, "Provider refused request");
                    return Err(StageError::Refused(e));
                }
                Ok(Err(e)) => return Err(StageError::Service(e)),
                Ok(Ok(response)) => response,
            };

            self.tokens.fetch_add(response.usage.total(), Ordering::Relaxed);
            match response.stop_reason {
                StopReason::MaxTokens => warn!(objective, "Completion truncated at the token limit"),
                StopReason::ContentFilter => warn!(objective, "Completion cut short by the content filter"),
                StopReason::EndTurn => {}
            }
            let text = response.content.unwrap_or_default();
            if text.trim().is_empty() {
                debug!(objective, "ask: empty response");
                return Err(StageError::EmptyResponse);
            }
            debug!(objective, len = text.len(), "ask: response received");
            return Ok(text);
        }
    }

    /// Requests sent so far, rate-limited ones included
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Tokens reported by the backend so far
    pub fn tokens(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, LlmError};
    use async_trait::async_trait;

    struct Stuck;

    #[async_trait]
    impl LlmClient for Stuck {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CompletionResponse::text("too late"))
        }
    }

    struct RateLimitedOnce {
        calls: AtomicU64,
    }

    #[async_trait]
    impl LlmClient for RateLimitedOnce {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::RateLimited {
                    retry_after: Duration::from_millis(1),
                })
            } else {
                Ok(CompletionResponse::text("after wait"))
            }
        }
    }

    #[tokio::test]
    async fn test_ask_returns_text() {
        let service = GenerationService::with_deadline(
            Arc::new(MockLlmClient::with_texts(&["hello"])),
            Duration::from_secs(5),
        );
        assert_eq!(service.ask("prompt", "test").await.unwrap(), "hello");
        assert_eq!(service.requests(), 1);
    }

    #[tokio::test]
    async fn test_ask_empty_response() {
        let service =
            GenerationService::with_deadline(Arc::new(MockLlmClient::with_texts(&["  "])), Duration::from_secs(5));
        assert!(matches!(service.ask("p", "test").await, Err(StageError::EmptyResponse)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_deadline() {
        let service = GenerationService::with_deadline(Arc::new(Stuck), Duration::from_millis(50));
        let err = service.ask("p", "test").await.unwrap_err();
        assert!(matches!(err, StageError::Deadline(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_waits_out_rate_limit() {
        let service = GenerationService::with_deadline(
            Arc::new(RateLimitedOnce {
                calls: AtomicU64::new(0),
            }),
            Duration::from_secs(5),
        );
        assert_eq!(service.ask("p", "test").await.unwrap(), "after wait");
        assert_eq!(service.requests(), 2);
    }

    struct Refusing(u16);

    #[async_trait]
    impl LlmClient for Refusing {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Status {
                status: self.0,
                body: "content_filter".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_ask_refused_request_stays_local() {
        let service = GenerationService::with_deadline(Arc::new(Refusing(400)), Duration::from_secs(5));
        let err = service.ask("p", "test").await.unwrap_err();
        assert!(matches!(err, StageError::Refused(_)));
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_ask_bad_credentials_are_fatal() {
        let service = GenerationService::with_deadline(Arc::new(Refusing(401)), Duration::from_secs(5));
        let err = service.ask("p", "test").await.unwrap_err();
        assert!(matches!(err, StageError::Service(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_ask_keeps_truncated_text() {
        let truncated = CompletionResponse {
            content: Some("{\"plan\": [\"Office#1 at 09:00\"".to_string()),
            stop_reason: StopReason::MaxTokens,
            usage: Default::default(),
        };
        let client = Arc::new(MockLlmClient::new(vec![truncated]));
        let service = GenerationService::with_deadline(client, Duration::from_secs(5));
        // The caller's parser decides whether a cut-off answer is usable
        assert_eq!(service.ask("p", "test").await.unwrap(), "{\"plan\": [\"Office#1 at 09:00\"");
    }

    #[tokio::test]
    async fn test_ask_service_failure_is_fatal() {
        let service = GenerationService::with_deadline(Arc::new(MockLlmClient::new(vec![])), Duration::from_secs(5));
        assert!(service.ask("p", "test").await.unwrap_err().is_fatal());
    }
}
