//! Localization metrics and observability.
//!
//! The pipeline emits one `ProviderCallRecord` per external call and one
//! `RequestLogEntry` per `localize` call to a `MetricsSink`. Sinks are
//! fire-and-forget: they must not block and cannot fail the request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Outcome of one HTTP attempt against a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCallRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: &'static str,
    pub estimated_tokens: u32,
    pub latency: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a `localize` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Served from a stored entry
    CacheHit,
    /// Computed by this request
    Computed,
    /// Shared the result of a computation another request started
    Joined,
    /// Original text returned with an error attached
    Fallback,
    /// Refused before producing a result
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Short cache key prefix, empty when the request never got a key
    pub key: String,
    pub outcome: RequestOutcome,
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

pub trait MetricsSink: Send + Sync {
    fn record_provider_call(&self, record: ProviderCallRecord);
    fn record_request(&self, entry: RequestLogEntry);
}

/// Counter-backed sink.
#[derive(Debug, Default)]
pub struct LocalizationMetrics {
    cache_hits: AtomicUsize,
    computed: AtomicUsize,
    joined: AtomicUsize,
    fallbacks: AtomicUsize,
    rejections: AtomicUsize,
    provider_calls: AtomicUsize,
    provider_failures: AtomicUsize,
    estimated_tokens: AtomicUsize,
}

impl LocalizationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    pub fn joined(&self) -> usize {
        self.joined.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> usize {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Number of HTTP attempts made against the provider.
    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn provider_failures(&self) -> usize {
        self.provider_failures.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let computed = self.computed();
        let joined = self.joined();
        let fallbacks = self.fallbacks();
        let answered = hits + computed + joined + fallbacks;
        let cache_hit_rate = if answered > 0 {
            (hits as f64 / answered as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.provider_calls();
        let failures = self.provider_failures();
        let provider_success_rate = if calls > 0 {
            ((calls - failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            computed,
            joined,
            fallbacks,
            rejections: self.rejections(),
            cache_hit_rate,
            provider_calls: calls,
            provider_failures: failures,
            provider_success_rate,
            estimated_tokens: self.estimated_tokens.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for LocalizationMetrics {
    fn record_provider_call(&self, record: ProviderCallRecord) {
        debug!(
            "Provider call to {}: success={} latency={:?} tokens~{}",
            record.provider, record.success, record.latency, record.estimated_tokens
        );
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        if !record.success {
            self.provider_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.estimated_tokens
            .fetch_add(record.estimated_tokens as usize, Ordering::Relaxed);
    }

    fn record_request(&self, entry: RequestLogEntry) {
        debug!(
            "Request {} finished as {:?} in {:?}",
            entry.key, entry.outcome, entry.latency
        );
        let counter = match entry.outcome {
            RequestOutcome::CacheHit => &self.cache_hits,
            RequestOutcome::Computed => &self.computed,
            RequestOutcome::Joined => &self.joined,
            RequestOutcome::Fallback => &self.fallbacks,
            RequestOutcome::Rejected => &self.rejections,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Sink that only logs. Useful when no counters are wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_provider_call(&self, record: ProviderCallRecord) {
        match &record.error {
            None => debug!(
                "{} call ok in {:?} (~{} tokens)",
                record.provider, record.latency, record.estimated_tokens
            ),
            Some(error) => debug!(
                "{} call failed in {:?}: {}",
                record.provider, record.latency, error
            ),
        }
    }

    fn record_request(&self, entry: RequestLogEntry) {
        debug!(
            "Request {} -> {:?} in {:?} (error: {})",
            entry.key,
            entry.outcome,
            entry.latency,
            entry.error_kind.unwrap_or("none")
        );
    }
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub computed: usize,
    pub joined: usize,
    pub fallbacks: usize,
    pub rejections: usize,

    /// Cache hit rate as a percentage (0-100) of answered requests
    pub cache_hit_rate: f64,

    pub provider_calls: usize,
    pub provider_failures: usize,

    /// Provider success rate as a percentage (0-100)
    pub provider_success_rate: f64,

    pub estimated_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(success: bool, tokens: u32) -> ProviderCallRecord {
        ProviderCallRecord {
            timestamp: Utc::now(),
            provider: "openai",
            estimated_tokens: tokens,
            latency: Duration::from_millis(120),
            success,
            error: if success { None } else { Some("503".to_string()) },
        }
    }

    fn request(outcome: RequestOutcome) -> RequestLogEntry {
        RequestLogEntry {
            timestamp: Utc::now(),
            key: "abcd1234".to_string(),
            outcome,
            latency: Duration::from_millis(5),
            error_kind: None,
        }
    }

    #[test]
    fn test_empty_report() {
        let report = LocalizationMetrics::new().report();
        assert_eq!(report.provider_calls, 0);
        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.provider_success_rate, 0.0);
    }

    #[test]
    fn test_provider_calls_and_rates() {
        let metrics = LocalizationMetrics::new();
        metrics.record_provider_call(call(true, 100));
        metrics.record_provider_call(call(true, 50));
        metrics.record_provider_call(call(false, 10));
        metrics.record_provider_call(call(true, 40));

        let report = metrics.report();
        assert_eq!(report.provider_calls, 4);
        assert_eq!(report.provider_failures, 1);
        assert_eq!(report.provider_success_rate, 75.0);
        assert_eq!(report.estimated_tokens, 200);
    }

    #[test]
    fn test_request_outcomes() {
        let metrics = LocalizationMetrics::new();
        metrics.record_request(request(RequestOutcome::Computed));
        metrics.record_request(request(RequestOutcome::CacheHit));
        metrics.record_request(request(RequestOutcome::CacheHit));
        metrics.record_request(request(RequestOutcome::Fallback));
        metrics.record_request(request(RequestOutcome::Rejected));
        metrics.record_request(request(RequestOutcome::Joined));
        metrics.record_request(request(RequestOutcome::Joined));
        metrics.record_request(request(RequestOutcome::CacheHit));

        let report = metrics.report();
        assert_eq!(report.cache_hits, 3);
        assert_eq!(report.computed, 1);
        assert_eq!(report.joined, 2);
        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.rejections, 1);
        assert!((report.cache_hit_rate - 300.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_serialization() {
        let json = serde_json::to_string(&call(false, 7)).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"503\""));
        let json = serde_json::to_string(&request(RequestOutcome::CacheHit)).unwrap();
        assert!(json.contains("cache_hit"));
    }
}
