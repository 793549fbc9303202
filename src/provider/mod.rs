//! Gateway over the generative text backends.
//!
//! The gateway owns the per-call timeout, the retry policy, and metrics
//! emission. It never looks at what the provider wrote; checking the output
//! is the pipeline's job.

mod anthropic;
mod openai;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use crate::config::{Config, ProviderKind};
use crate::error::LocalizeError;
use crate::metrics::{MetricsSink, ProviderCallRecord};
use crate::prompt::PromptPayload;
use crate::retry::{with_retry_if, RetryConfig};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to an error.
    /// 429 and 5xx are retried; 401/403 are credential problems.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth { status, body },
            429 | 500..=599 => Self::Server { status, body },
            _ => Self::Rejected { status, body },
        }
    }

    pub fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(error.to_string())
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Network(_) | Self::Server { .. } | Self::InvalidResponse(_)
        )
    }

    pub fn into_localize_error(self, attempts: u32) -> LocalizeError {
        match self {
            Self::Timeout(_) => LocalizeError::ProviderTimeout { attempts },
            Self::Auth { status, .. } => LocalizeError::ProviderAuthFailure { status },
            Self::Rejected { status, body } => LocalizeError::ProviderRejected {
                status,
                message: truncate(&body, 200),
            },
            other => LocalizeError::ProviderTransientFailure {
                message: truncate(&other.to_string(), 200),
            },
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Text returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Completion tokens when the backend reports usage
    pub completion_tokens: Option<u32>,
}

/// The closed set of supported backends.
#[derive(Debug, Clone)]
pub enum ProviderBackend {
    OpenAi(OpenAiBackend),
    Anthropic(AnthropicBackend),
}

impl ProviderBackend {
    pub fn from_config(config: &Config) -> Self {
        match config.provider {
            ProviderKind::Primary => Self::OpenAi(OpenAiBackend::new(
                &config.openai_api_url,
                &config.openai_api_key,
                &config.openai_model,
            )),
            ProviderKind::Secondary => Self::Anthropic(AnthropicBackend::new(
                &config.anthropic_api_url,
                &config.anthropic_api_key,
                &config.anthropic_model,
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
        }
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        prompt: &PromptPayload,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        match self {
            Self::OpenAi(backend) => backend.send(client, prompt, max_tokens, timeout).await,
            Self::Anthropic(backend) => backend.send(client, prompt, max_tokens, timeout).await,
        }
    }
}

pub struct ProviderGateway {
    backend: ProviderBackend,
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl ProviderGateway {
    pub fn new(backend: ProviderBackend, timeout: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            backend,
            client: reqwest::Client::new(),
            timeout,
            retry: RetryConfig::provider_call(),
            metrics,
        }
    }

    pub fn from_config(config: &Config, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::new(
            ProviderBackend::from_config(config),
            config.provider_timeout,
            metrics,
        )
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Upper bound on how long `generate` can take before giving up.
    pub fn worst_case_duration(&self) -> Duration {
        self.timeout * (self.retry.retries() + 1) + self.retry.total_backoff()
    }

    /// Generate text for a prompt, retrying transient failures.
    pub async fn generate(
        &self,
        prompt: &PromptPayload,
        max_tokens: u32,
    ) -> Result<String, LocalizeError> {
        let mut attempts = 0u32;
        let operation_name = format!("{} generation", self.backend.name());

        let result = with_retry_if(
            &self.retry,
            &operation_name,
            || {
                attempts += 1;
                self.attempt(prompt, max_tokens)
            },
            ProviderError::is_retryable,
        )
        .await;

        result
            .map(|completion| completion.text)
            .map_err(|e| e.into_localize_error(attempts))
    }

    async fn attempt(
        &self,
        prompt: &PromptPayload,
        max_tokens: u32,
    ) -> Result<Completion, ProviderError> {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            self.timeout,
            self.backend
                .send(&self.client, prompt, max_tokens, self.timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        let prompt_tokens = (prompt.char_len() / 4) as u32;
        let completion_tokens = match &outcome {
            Ok(c) => c
                .completion_tokens
                .unwrap_or((c.text.chars().count() / 4) as u32),
            Err(_) => 0,
        };

        self.metrics.record_provider_call(ProviderCallRecord {
            timestamp: Utc::now(),
            provider: self.backend.name(),
            estimated_tokens: prompt_tokens + completion_tokens,
            latency: started.elapsed(),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concepts::ConceptDetector;
    use crate::culture::CulturalCategory;
    use crate::i18n::Language;
    use crate::metrics::LocalizationMetrics;
    use crate::prompt::PromptBuilder;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn prompt() -> PromptPayload {
        let passage = "Recursion is a function calling itself.";
        let detector = ConceptDetector::new();
        let concepts = detector.detect(passage);
        let concept = detector.primary(&concepts).unwrap();
        PromptBuilder::new()
            .build(
                concept,
                CulturalCategory::Cricket,
                Language::from_code("en").unwrap(),
                passage,
            )
            .unwrap()
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(10))
    }

    fn openai_gateway(
        server: &MockServer,
        timeout: Duration,
        metrics: Arc<LocalizationMetrics>,
    ) -> ProviderGateway {
        let backend = ProviderBackend::OpenAi(OpenAiBackend::new(
            &format!("{}/v1/chat/completions", server.uri()),
            "test-openai-key",
            "gpt-4o-mini",
        ));
        ProviderGateway::new(backend, timeout, metrics).with_retry(fast_retry())
    }

    fn openai_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"completion_tokens": 12}
        })
    }

    // ==================== Error classification ====================

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ProviderError::from_status(401, String::new()),
            ProviderError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(403, String::new()),
            ProviderError::Auth { .. }
        ));
        assert!(ProviderError::from_status(429, String::new()).is_retryable());
        assert!(ProviderError::from_status(503, String::new()).is_retryable());
        assert!(!ProviderError::from_status(400, String::new()).is_retryable());
        assert!(!ProviderError::from_status(401, String::new()).is_retryable());
    }

    #[test]
    fn test_into_localize_error() {
        assert_eq!(
            ProviderError::Timeout(Duration::from_secs(1)).into_localize_error(3),
            LocalizeError::ProviderTimeout { attempts: 3 }
        );
        assert_eq!(
            ProviderError::from_status(401, "bad key".to_string()).into_localize_error(1),
            LocalizeError::ProviderAuthFailure { status: 401 }
        );
        assert_eq!(
            ProviderError::from_status(502, "bad gateway".to_string())
                .into_localize_error(3)
                .kind(),
            "provider_transient_failure"
        );
        assert_eq!(
            ProviderError::from_status(422, "bad".to_string())
                .into_localize_error(1)
                .kind(),
            "provider_rejected"
        );
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, 200).len(), 203);
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn test_worst_case_duration() {
        let metrics = Arc::new(LocalizationMetrics::new());
        let backend = ProviderBackend::OpenAi(OpenAiBackend::new("http://x", "k", "m"));
        let gateway = ProviderGateway::new(backend, Duration::from_secs(30), metrics);
        // 3 x 30s + 500ms + 1s of backoff
        assert_eq!(gateway.worst_case_duration(), Duration::from_millis(91_500));

        let single = gateway.with_retry(RetryConfig::new(1, Duration::from_secs(1)));
        assert_eq!(single.worst_case_duration(), Duration::from_secs(30));
    }

    // ==================== generate ====================

    #[tokio::test]
    async fn test_generate_success_records_metrics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_body("localized")))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = Arc::new(LocalizationMetrics::new());
        let gateway = openai_gateway(&server, Duration::from_secs(5), metrics.clone());

        let text = gateway.generate(&prompt(), 500).await.unwrap();
        assert_eq!(text, "localized");
        assert_eq!(metrics.provider_calls(), 1);
        assert_eq!(metrics.provider_failures(), 0);
        assert!(metrics.report().estimated_tokens > 12);
    }

    #[tokio::test]
    async fn test_generate_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_body("third time")))
            .mount(&server)
            .await;

        let metrics = Arc::new(LocalizationMetrics::new());
        let gateway = openai_gateway(&server, Duration::from_secs(5), metrics.clone());

        let text = gateway.generate(&prompt(), 500).await.unwrap();
        assert_eq!(text, "third time");
        assert_eq!(metrics.provider_calls(), 3);
        assert_eq!(metrics.provider_failures(), 2);
    }

    #[tokio::test]
    async fn test_generate_auth_failure_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = Arc::new(LocalizationMetrics::new());
        let gateway = openai_gateway(&server, Duration::from_secs(5), metrics.clone());

        let err = gateway.generate(&prompt(), 500).await.unwrap_err();
        assert_eq!(err, LocalizeError::ProviderAuthFailure { status: 401 });
        assert_eq!(metrics.provider_calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_times_out_each_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(openai_body("too late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let metrics = Arc::new(LocalizationMetrics::new());
        let gateway = openai_gateway(&server, Duration::from_millis(100), metrics.clone());

        let started = Instant::now();
        let err = gateway.generate(&prompt(), 500).await.unwrap_err();
        assert_eq!(err, LocalizeError::ProviderTimeout { attempts: 3 });
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(metrics.provider_failures(), 3);
    }

    #[tokio::test]
    async fn test_generate_anthropic_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "from claude"}],
                "usage": {"input_tokens": 40, "output_tokens": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = Arc::new(LocalizationMetrics::new());
        let backend = ProviderBackend::Anthropic(AnthropicBackend::new(
            &format!("{}/v1/messages", server.uri()),
            "test-anthropic-key",
            "claude-3-5-haiku-latest",
        ));
        let gateway = ProviderGateway::new(backend, Duration::from_secs(5), metrics.clone());
        assert_eq!(gateway.provider_name(), "anthropic");

        let text = gateway.generate(&prompt(), 500).await.unwrap();
        assert_eq!(text, "from claude");
        assert_eq!(metrics.provider_calls(), 1);
    }

    #[test]
    fn test_backend_from_config() {
        let config = Config {
            provider: ProviderKind::Secondary,
            ..Config::default()
        };
        assert_eq!(ProviderBackend::from_config(&config).name(), "anthropic");
        assert_eq!(
            ProviderBackend::from_config(&Config::default()).name(),
            "openai"
        );
    }
}
