//! Error taxonomy for the localization pipeline.
//!
//! `LocalizeError` is cloneable so a single failed computation can be handed
//! to every caller waiting on the same cache key.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalizeError {
    #[error("text is {length} characters, maximum is {max}")]
    InputTooLarge { length: usize, max: usize },

    #[error("no programming concept detected in text")]
    NoConceptDetected,

    #[error("provider timed out after {attempts} attempt(s)")]
    ProviderTimeout { attempts: u32 },

    #[error("provider rejected credentials ({status})")]
    ProviderAuthFailure { status: u16 },

    #[error("provider failed after retries: {message}")]
    ProviderTransientFailure { message: String },

    #[error("provider rejected request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    #[error("localized text dropped protected content: {missing:?}")]
    VerificationFailed { missing: Vec<String> },

    #[error("rate limit exceeded, retry after {}ms", retry_after.as_millis())]
    RateLimitExceeded { retry_after: Duration },

    #[error("no prompt template for {concept} framed as {category}")]
    TemplateMissing { concept: String, category: String },

    #[error("request deadline of {}ms elapsed", deadline.as_millis())]
    DeadlineExceeded { deadline: Duration },

    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

impl LocalizeError {
    /// Stable identifier used in responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputTooLarge { .. } => "input_too_large",
            Self::NoConceptDetected => "no_concept_detected",
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::ProviderAuthFailure { .. } => "provider_auth_failure",
            Self::ProviderTransientFailure { .. } => "provider_transient_failure",
            Self::ProviderRejected { .. } => "provider_rejected",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::TemplateMissing { .. } => "template_missing",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::InvalidProfile(_) => "invalid_profile",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// Suggested delay before the caller tries again, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Errors that are returned to the caller as a rejection instead of being
    /// folded into a fallback result.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InputTooLarge { .. }
                | Self::RateLimitExceeded { .. }
                | Self::TemplateMissing { .. }
                | Self::InvalidProfile(_)
        )
    }

    pub fn to_detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind(),
            message: self.to_string(),
            retry_after_ms: self.retry_after().map(|d| d.as_millis() as u64),
        }
    }
}

/// Serialisable view of an error attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}
