use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Which generative backend the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI Chat Completions
    Primary,
    /// Anthropic Messages
    Secondary,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" | "openai" => Ok(Self::Primary),
            "secondary" | "anthropic" => Ok(Self::Secondary),
            other => bail!("Unknown provider '{}'. Expected primary or secondary", other),
        }
    }
}

/// What the admission stage does once the per-minute budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Reject immediately with a retry-after hint
    Reject,
    /// Wait for budget, with at most `max_depth` requests waiting
    Queue { max_depth: usize },
}

#[derive(Debug, Clone)]
pub struct Config {
    // Provider selection
    pub provider: ProviderKind,

    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,

    // Anthropic
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_api_url: String,

    // Pipeline limits
    pub cache_ttl: Duration,
    pub max_text_length: usize,
    pub rate_limit_per_minute: u32,
    pub provider_timeout: Duration,
    pub max_concurrent_provider_calls: usize,
    pub admission_policy: AdmissionPolicy,
    pub max_tokens: u32,
    pub strict_templates: bool,

    // HTTP adapter
    pub profiles_file: Option<String>,
    pub api_key: Option<String>,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Primary,
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            anthropic_api_key: String::new(),
            anthropic_model: "claude-3-5-haiku-latest".to_string(),
            anthropic_api_url: "https://api.anthropic.com/v1/messages".to_string(),
            cache_ttl: Duration::from_secs(86_400),
            max_text_length: 5000,
            rate_limit_per_minute: 100,
            provider_timeout: Duration::from_secs(30),
            max_concurrent_provider_calls: 10,
            admission_policy: AdmissionPolicy::Queue { max_depth: 50 },
            max_tokens: 1500,
            strict_templates: false,
            profiles_file: None,
            api_key: None,
            port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let provider = match std::env::var("LOCALIZER_PROVIDER") {
            Ok(value) => ProviderKind::parse(&value)?,
            Err(_) => defaults.provider,
        };

        // Only the selected backend needs a key
        let openai_api_key = match provider {
            ProviderKind::Primary => {
                std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?
            }
            ProviderKind::Secondary => std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        };
        let anthropic_api_key = match provider {
            ProviderKind::Secondary => {
                std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY not set")?
            }
            ProviderKind::Primary => std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
        };

        let queue_depth = env_parse("ADMISSION_QUEUE_DEPTH").unwrap_or(50);
        let admission_policy = match std::env::var("ADMISSION_POLICY")
            .unwrap_or_else(|_| "queue".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "reject" => AdmissionPolicy::Reject,
            "queue" => AdmissionPolicy::Queue {
                max_depth: queue_depth,
            },
            other => bail!("Unknown ADMISSION_POLICY '{}'. Expected queue or reject", other),
        };

        let config = Self {
            provider,

            // OpenAI
            openai_api_key,
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_api_url: std::env::var("OPENAI_API_URL").unwrap_or(defaults.openai_api_url),

            // Anthropic
            anthropic_api_key,
            anthropic_model: std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.anthropic_model),
            anthropic_api_url: std::env::var("ANTHROPIC_API_URL")
                .unwrap_or(defaults.anthropic_api_url),

            // Pipeline limits
            cache_ttl: env_parse("CACHE_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            max_text_length: env_parse("MAX_TEXT_LENGTH").unwrap_or(defaults.max_text_length),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE")
                .unwrap_or(defaults.rate_limit_per_minute),
            provider_timeout: env_parse("PROVIDER_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            max_concurrent_provider_calls: env_parse("MAX_CONCURRENT_PROVIDER_CALLS")
                .unwrap_or(defaults.max_concurrent_provider_calls),
            admission_policy,
            max_tokens: env_parse("PROVIDER_MAX_TOKENS").unwrap_or(defaults.max_tokens),
            strict_templates: env_parse("STRICT_TEMPLATES").unwrap_or(false),

            // HTTP adapter
            profiles_file: std::env::var("PROFILES_FILE").ok(),
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            port: env_parse("PORT").unwrap_or(defaults.port),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl.is_zero() {
            bail!("CACHE_TTL_SECONDS must be greater than zero");
        }
        if self.max_text_length == 0 {
            bail!("MAX_TEXT_LENGTH must be greater than zero");
        }
        if self.rate_limit_per_minute == 0 {
            bail!("RATE_LIMIT_PER_MINUTE must be greater than zero");
        }
        if self.provider_timeout.is_zero() {
            bail!("PROVIDER_TIMEOUT_SECONDS must be greater than zero");
        }
        if self.max_concurrent_provider_calls == 0 {
            bail!("MAX_CONCURRENT_PROVIDER_CALLS must be greater than zero");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
