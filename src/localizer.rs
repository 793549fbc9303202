//! The localization pipeline.
//!
//! `Localizer::localize` checks the input, looks up the result cache, and on a
//! miss runs detection, selection, prompt building, admission, generation and
//! verification as one single-flight computation per cache key. Provider and
//! verification failures become a result carrying the original text and the
//! error; only rejections (oversized input, exhausted admission, strict
//! template misses, invalid profiles) are returned as `Err`.

use crate::admission::AdmissionController;
use crate::cache::{CacheEntry, CacheError, CacheKey, CacheOutcome, ResultCache};
use crate::concepts::{ConceptDetector, ConceptKind};
use crate::config::Config;
use crate::culture::{CulturalCategory, MetaphorSelector};
use crate::error::LocalizeError;
use crate::fallback::{FallbackChain, FallbackContext};
use crate::metrics::{MetricsSink, RequestLogEntry, RequestOutcome};
use crate::preservation::PreservationValidator;
use crate::profile::Profile;
use crate::prompt::PromptBuilder;
use crate::provider::ProviderGateway;
use chrono::Utc;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Attached to every successful result.
pub const DISCLAIMER: &str = "Cultural analogies are generated to aid understanding. \
Code and technical terms are kept exactly as in the original; verify details against \
the original passage.";

/// Expired cache entries are swept at least this often.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizationRequest {
    pub text: String,
    pub profile: Profile,
}

impl LocalizationRequest {
    pub fn new(text: impl Into<String>, profile: Profile) -> Self {
        Self {
            text: text.into(),
            profile,
        }
    }
}

/// Outcome of a `localize` call. Either `error` is `None` and `localized`
/// holds the rewritten text, or `error` is set and `localized == original`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalizedResult {
    pub original: String,
    pub localized: String,
    pub concepts_detected: Vec<ConceptKind>,
    pub metaphors_used: Vec<CulturalCategory>,
    pub cached: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<LocalizeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<&'static str>,
}

fn serialize_error<S: Serializer>(
    error: &Option<LocalizeError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    error.as_ref().map(|e| e.to_detail()).serialize(serializer)
}

impl LocalizedResult {
    pub fn from_entry(original: &str, entry: &CacheEntry, cached: bool) -> Self {
        Self {
            original: original.to_string(),
            localized: entry.localized_text.clone(),
            concepts_detected: entry.concepts_detected.clone(),
            metaphors_used: entry.metaphors_used.clone(),
            cached,
            error: None,
            disclaimer: Some(DISCLAIMER),
        }
    }

    pub fn fallback(
        original: &str,
        error: LocalizeError,
        concepts_detected: Vec<ConceptKind>,
    ) -> Self {
        Self {
            original: original.to_string(),
            localized: original.to_string(),
            concepts_detected,
            metaphors_used: Vec::new(),
            cached: false,
            error: Some(error),
            disclaimer: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Pipeline stage, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detecting,
    Building,
    Admitting,
    Generating,
    Verifying,
    /// Waiting on a computation (own or a peer's) past the caller's deadline
    Waiting,
}

/// A pipeline failure and where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: Stage,
    pub error: LocalizeError,
    pub concepts_detected: Vec<ConceptKind>,
}

impl StageError {
    fn new(stage: Stage, error: LocalizeError) -> Self {
        Self {
            stage,
            error,
            concepts_detected: Vec::new(),
        }
    }

    fn with_concepts(mut self, concepts: Vec<ConceptKind>) -> Self {
        self.concepts_detected = concepts;
        self
    }
}

/// Everything a cache-miss computation needs. Shared with spawned computations.
struct Pipeline {
    detector: ConceptDetector,
    selector: MetaphorSelector,
    prompts: PromptBuilder,
    admission: AdmissionController,
    gateway: ProviderGateway,
    max_tokens: u32,
    strict_templates: bool,
    ttl: Duration,
}

impl Pipeline {
    async fn run(&self, text: &str, profile: &Profile, key: &str) -> Result<CacheEntry, StageError> {
        let concepts = self.detector.detect(text);
        let primary = self
            .detector
            .primary(&concepts)
            .ok_or_else(|| StageError::new(Stage::Detecting, LocalizeError::NoConceptDetected))?;
        let kinds = self.detector.kinds(&concepts);

        let category = self.selector.select(primary, profile);

        let prompt = match self
            .prompts
            .build(primary, category, profile.language(), text)
        {
            Ok(prompt) => prompt,
            Err(e) if self.strict_templates => {
                return Err(StageError::new(Stage::Building, e).with_concepts(kinds));
            }
            Err(e) => {
                warn!("{}; using generic exemplars for {}", e, key);
                self.prompts
                    .build_generic(primary, category, profile.language(), text)
            }
        };

        let localized = {
            let _permit = self
                .admission
                .admit()
                .await
                .map_err(|e| StageError::new(Stage::Admitting, e).with_concepts(kinds.clone()))?;

            self.gateway
                .generate(&prompt, self.max_tokens)
                .await
                .map_err(|e| StageError::new(Stage::Generating, e).with_concepts(kinds.clone()))?
        };

        let report = PreservationValidator::validate(text, &localized, &concepts);
        if report.has_warnings() {
            warn!(
                "Preservation warnings for {}: {}",
                key,
                report.warnings.join("; ")
            );
        }
        if report.has_errors() {
            return Err(StageError::new(
                Stage::Verifying,
                LocalizeError::VerificationFailed {
                    missing: report.errors,
                },
            )
            .with_concepts(kinds));
        }

        info!(
            "Localized {} ({} framed as {}, {:?} template)",
            key, primary.kind, category, prompt.source
        );
        Ok(CacheEntry::new(localized, kinds, vec![category], self.ttl))
    }
}

pub struct Localizer {
    pipeline: Arc<Pipeline>,
    cache: ResultCache<StageError>,
    fallbacks: FallbackChain,
    max_text_length: usize,
    metrics: Arc<dyn MetricsSink>,
}

impl Localizer {
    pub fn new(config: &Config, gateway: ProviderGateway, metrics: Arc<dyn MetricsSink>) -> Self {
        let fallbacks = FallbackChain::new();
        info!(
            "Localizer ready: provider={}, ttl={:?}, max_text_length={}, rate_limit={}/min, max_concurrent={}",
            gateway.provider_name(),
            config.cache_ttl,
            config.max_text_length,
            config.rate_limit_per_minute,
            config.max_concurrent_provider_calls
        );
        info!(
            "Provider calls give up after at most {:?}; fallbacks: {}",
            gateway.worst_case_duration(),
            fallbacks.strategy_names().join(" -> ")
        );

        Self {
            pipeline: Arc::new(Pipeline {
                detector: ConceptDetector::new(),
                selector: MetaphorSelector::new(),
                prompts: PromptBuilder::new(),
                admission: AdmissionController::from_config(config),
                gateway,
                max_tokens: config.max_tokens,
                strict_templates: config.strict_templates,
                ttl: config.cache_ttl,
            }),
            cache: ResultCache::new(config.cache_ttl),
            fallbacks,
            max_text_length: config.max_text_length,
            metrics,
        }
    }

    pub fn from_config(config: &Config, metrics: Arc<dyn MetricsSink>) -> Self {
        let gateway = ProviderGateway::from_config(config, Arc::clone(&metrics));
        Self::new(config, gateway, metrics)
    }

    pub fn selector(&self) -> &MetaphorSelector {
        &self.pipeline.selector
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.pipeline.admission
    }

    pub fn cache(&self) -> &ResultCache<StageError> {
        &self.cache
    }

    /// Start sweeping expired cache entries in the background. The task ends
    /// when the localizer is dropped.
    pub fn start_cache_sweeper(&self) -> JoinHandle<()> {
        let period = self.cache.ttl().min(MAX_SWEEP_PERIOD);
        info!("Sweeping expired cache entries every {:?}", period);
        self.cache.spawn_sweeper(period)
    }

    /// Localize a passage for a profile.
    ///
    /// With a `deadline`, the call stops waiting once it elapses and returns
    /// the original text with `DeadlineExceeded`; a computation that other
    /// callers are still waiting on keeps running.
    pub async fn localize(
        &self,
        request: LocalizationRequest,
        deadline: Option<Duration>,
    ) -> Result<LocalizedResult, LocalizeError> {
        let started = Instant::now();

        let length = request.text.chars().count();
        if length > self.max_text_length {
            let err = LocalizeError::InputTooLarge {
                length,
                max: self.max_text_length,
            };
            warn!("Rejected request: {}", err);
            self.record(String::new(), RequestOutcome::Rejected, started, Some(&err));
            return Err(err);
        }

        let key = CacheKey::new(&request.text, &request.profile);
        debug!("Localizing {} for profile {}", key.short(), request.profile.id());

        let pipeline = Arc::clone(&self.pipeline);
        let text = request.text.clone();
        let profile = request.profile.clone();
        let key_label = key.short().to_string();
        let compute = move || async move { pipeline.run(&text, &profile, &key_label).await };

        let lookup = self.cache.get_or_compute(&key, compute);
        let waited = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, lookup).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Compute(StageError::new(
                    Stage::Waiting,
                    LocalizeError::DeadlineExceeded { deadline },
                ))),
            },
            None => lookup.await,
        };

        let failure = match waited {
            Ok((entry, outcome)) => {
                let (cached, logged) = match outcome {
                    CacheOutcome::Hit => (true, RequestOutcome::CacheHit),
                    CacheOutcome::Computed => (false, RequestOutcome::Computed),
                    CacheOutcome::Joined => (false, RequestOutcome::Joined),
                };
                self.record(key.short().to_string(), logged, started, None);
                return Ok(LocalizedResult::from_entry(&request.text, &entry, cached));
            }
            Err(CacheError::Compute(failure)) => failure,
            Err(CacheError::Abandoned) => StageError::new(
                Stage::Generating,
                LocalizeError::ProviderTransientFailure {
                    message: "computation ended without a result".to_string(),
                },
            ),
        };

        let elapsed = started.elapsed();
        if failure.error == LocalizeError::NoConceptDetected {
            info!(
                "No concept detected for {} at {:?} after {:?}",
                key.short(),
                failure.stage,
                elapsed
            );
        } else {
            error!(
                "Localization failed at {:?} for {} after {:?}: {}",
                failure.stage,
                key.short(),
                elapsed,
                failure.error
            );
        }

        if failure.error.is_rejection() {
            self.record(
                key.short().to_string(),
                RequestOutcome::Rejected,
                started,
                Some(&failure.error),
            );
            return Err(failure.error);
        }

        let ctx = FallbackContext {
            failure: &failure.error,
            original: &request.text,
            concepts_detected: &failure.concepts_detected,
            recovered: self.cache.peek(&key),
        };
        let (strategy, result) = self.fallbacks.resolve(&ctx);
        debug!("Fallback for {} resolved by {}", key.short(), strategy);

        self.record(
            key.short().to_string(),
            RequestOutcome::Fallback,
            started,
            Some(&failure.error),
        );
        Ok(result)
    }

    fn record(
        &self,
        key: String,
        outcome: RequestOutcome,
        started: Instant,
        error: Option<&LocalizeError>,
    ) {
        self.metrics.record_request(RequestLogEntry {
            timestamp: Utc::now(),
            key,
            outcome,
            latency: started.elapsed(),
            error_kind: error.map(|e| e.kind()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Language;
    use crate::metrics::LocalizationMetrics;
    use crate::provider::{OpenAiBackend, ProviderBackend};
    use crate::retry::RetryConfig;
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    fn profile(categories: Vec<CulturalCategory>) -> Profile {
        Profile::new("student-1", categories, Language::from_code("en").unwrap()).unwrap()
    }

    fn localizer(server: &MockServer, config: Config) -> (Localizer, Arc<LocalizationMetrics>) {
        let metrics = Arc::new(LocalizationMetrics::new());
        let backend = ProviderBackend::OpenAi(OpenAiBackend::new(&server.uri(), "k", "gpt-4o-mini"));
        let gateway = ProviderGateway::new(backend, config.provider_timeout, metrics.clone())
            .with_retry(RetryConfig::new(3, Duration::from_millis(10)));
        (Localizer::new(&config, gateway, metrics.clone()), metrics)
    }

    async fn respond_with(server: &MockServer, content: &str) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(server)
            .await;
    }

    // ==================== Rejections ====================

    #[tokio::test]
    async fn test_input_too_large_rejected_before_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let config = Config {
            max_text_length: 10,
            ..Config::default()
        };
        let (localizer, metrics) = localizer(&server, config);

        let request = LocalizationRequest::new(
            "a recursive function",
            profile(vec![CulturalCategory::Cricket]),
        );
        let err = localizer.localize(request, None).await.unwrap_err();
        assert_eq!(err, LocalizeError::InputTooLarge { length: 20, max: 10 });
        assert_eq!(metrics.rejections(), 1);
    }

    #[tokio::test]
    async fn test_length_counts_characters_not_bytes() {
        let server = MockServer::start().await;
        respond_with(&server, "मानो loop एक over है").await;
        let config = Config {
            max_text_length: 10,
            ..Config::default()
        };
        let (localizer, _) = localizer(&server, config);

        // 8 characters, 14 bytes
        let request = LocalizationRequest::new("loop लूप", profile(vec![CulturalCategory::Cricket]));
        let result = localizer.localize(request, None).await.unwrap();
        assert!(result.is_success(), "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_strict_templates_reject_missing_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let config = Config {
            strict_templates: true,
            ..Config::default()
        };
        let (localizer, _) = localizer(&server, config);

        let request = LocalizationRequest::new(
            "Recursion solves a problem through smaller copies of itself.",
            profile(vec![CulturalCategory::Food]),
        );
        let err = localizer.localize(request, None).await.unwrap_err();
        assert_eq!(err.kind(), "template_missing");
    }

    // ==================== Soft failures ====================

    #[tokio::test]
    async fn test_missing_template_falls_back_to_generic() {
        let server = MockServer::start().await;
        respond_with(&server, "Recursion is like a dosa batter that starts the next dosa.").await;
        let (localizer, _) = localizer(&server, Config::default());

        let request = LocalizationRequest::new(
            "Recursion solves a problem through smaller copies of itself.",
            profile(vec![CulturalCategory::Food]),
        );
        let result = localizer.localize(request, None).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.metaphors_used, vec![CulturalCategory::Food]);
    }

    #[tokio::test]
    async fn test_no_concept_returns_original() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (localizer, metrics) = localizer(&server, Config::default());

        let text = "The weather in Chennai is lovely today.";
        let request = LocalizationRequest::new(text, profile(vec![CulturalCategory::Cricket]));
        let result = localizer.localize(request, None).await.unwrap();
        assert_eq!(result.error, Some(LocalizeError::NoConceptDetected));
        assert_eq!(result.localized, text);
        assert!(result.disclaimer.is_none());
        assert_eq!(metrics.fallbacks(), 1);
        assert_eq!(localizer.selector().selections("student-1"), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_reports_concepts() {
        let server = MockServer::start().await;
        respond_with(&server, "A kind of team selection, like a cricket squad.").await;
        let (localizer, _) = localizer(&server, Config::default());

        let text = "A class groups data.";
        let request = LocalizationRequest::new(text, profile(vec![CulturalCategory::Cricket]));
        let result = localizer.localize(request, None).await.unwrap();
        assert_eq!(
            result.error,
            Some(LocalizeError::VerificationFailed {
                missing: vec!["class".to_string()]
            })
        );
        assert_eq!(result.localized, text);
        assert_eq!(result.concepts_detected, vec![ConceptKind::Class]);
    }

    // ==================== Results ====================

    #[tokio::test]
    async fn test_success_carries_disclaimer_and_serializes() {
        let server = MockServer::start().await;
        respond_with(&server, "A class is like a cricket team: a template for players.").await;
        let (localizer, _) = localizer(&server, Config::default());

        let request = LocalizationRequest::new(
            "A class is a template for objects.",
            profile(vec![CulturalCategory::Cricket]),
        );
        let result = localizer.localize(request, None).await.unwrap();
        assert_eq!(result.disclaimer, Some(DISCLAIMER));
        assert_eq!(result.concepts_detected, vec![ConceptKind::Class]);
        assert_eq!(result.metaphors_used, vec![CulturalCategory::Cricket]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"], serde_json::Value::Null);
        assert_eq!(json["concepts_detected"][0], "class");
        assert_eq!(json["metaphors_used"][0], "cricket");
    }

    // ==================== Cache sweep ====================

    #[tokio::test]
    async fn test_sweeper_clears_expired_results() {
        let server = MockServer::start().await;
        respond_with(&server, "A class is like a cricket team: a template for players.").await;
        let config = Config {
            cache_ttl: Duration::from_millis(200),
            ..Config::default()
        };
        let (localizer, _) = localizer(&server, config);
        let _sweeper = localizer.start_cache_sweeper();

        let request = LocalizationRequest::new(
            "A class is a template for objects.",
            profile(vec![CulturalCategory::Cricket]),
        );
        assert!(localizer.localize(request, None).await.unwrap().is_success());
        assert_eq!(localizer.cache().len(), 1);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(localizer.cache().is_empty());
    }

    #[test]
    fn test_fallback_serializes_error_detail() {
        let result = LocalizedResult::fallback(
            "text",
            LocalizeError::RateLimitExceeded {
                retry_after: Duration::from_secs(2),
            },
            vec![],
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["kind"], "rate_limit_exceeded");
        assert_eq!(json["error"]["retry_after_ms"], 2000);
        assert!(json.get("disclaimer").is_none());
    }
}
