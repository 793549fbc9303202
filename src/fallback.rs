//! Ordered fallback strategies applied when a localization fails.
//!
//! Each strategy is a pure function of the failure context. The chain tries
//! them in order and the first one that produces a result wins.

use crate::cache::CacheEntry;
use crate::concepts::ConceptKind;
use crate::error::LocalizeError;
use crate::localizer::LocalizedResult;
use std::sync::Arc;

/// What a strategy can see about the failed request.
#[derive(Debug, Clone)]
pub struct FallbackContext<'a> {
    pub failure: &'a LocalizeError,
    pub original: &'a str,
    /// Concept kinds found before the failure, if detection ran
    pub concepts_detected: &'a [ConceptKind],
    /// A fresh entry stored for the same key after this request missed
    pub recovered: Option<Arc<CacheEntry>>,
}

pub type FallbackStrategy = fn(&FallbackContext<'_>) -> Option<LocalizedResult>;

/// A peer stored a result while this request was failing: serve it.
pub fn race_recovery(ctx: &FallbackContext<'_>) -> Option<LocalizedResult> {
    ctx.recovered
        .as_ref()
        .map(|entry| LocalizedResult::from_entry(ctx.original, entry, true))
}

/// Return the original text with the failure attached. Always applies.
pub fn echo_original(ctx: &FallbackContext<'_>) -> Option<LocalizedResult> {
    Some(LocalizedResult::fallback(
        ctx.original,
        ctx.failure.clone(),
        ctx.concepts_detected.to_vec(),
    ))
}

pub struct FallbackChain {
    strategies: Vec<(&'static str, FallbackStrategy)>,
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self {
            strategies: vec![
                ("race_recovery", race_recovery),
                ("echo_original", echo_original),
            ],
        }
    }
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    /// Apply the first strategy that produces a result, returning its name.
    pub fn resolve(&self, ctx: &FallbackContext<'_>) -> (&'static str, LocalizedResult) {
        self.strategies
            .iter()
            .find_map(|(name, strategy)| strategy(ctx).map(|result| (*name, result)))
            .unwrap_or_else(|| {
                (
                    "echo_original",
                    LocalizedResult::fallback(
                        ctx.original,
                        ctx.failure.clone(),
                        ctx.concepts_detected.to_vec(),
                    ),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culture::CulturalCategory;
    use crate::localizer::DISCLAIMER;
    use std::time::Duration;

    fn stored() -> Arc<CacheEntry> {
        Arc::new(CacheEntry::new(
            "Loops are like overs in cricket.".to_string(),
            vec![ConceptKind::Loop],
            vec![CulturalCategory::Cricket],
            Duration::from_secs(60),
        ))
    }

    fn context<'a>(
        failure: &'a LocalizeError,
        recovered: Option<Arc<CacheEntry>>,
    ) -> FallbackContext<'a> {
        FallbackContext {
            failure,
            original: "Loops repeat work.",
            concepts_detected: &[ConceptKind::Loop],
            recovered,
        }
    }

    // ==================== Strategies ====================

    #[test]
    fn test_race_recovery_needs_an_entry() {
        let failure = LocalizeError::ProviderTimeout { attempts: 3 };
        assert!(race_recovery(&context(&failure, None)).is_none());

        let result = race_recovery(&context(&failure, Some(stored()))).unwrap();
        assert_eq!(result.localized, "Loops are like overs in cricket.");
        assert_eq!(result.original, "Loops repeat work.");
        assert!(result.cached);
        assert!(result.error.is_none());
        assert_eq!(result.disclaimer, Some(DISCLAIMER));
    }

    #[test]
    fn test_echo_original_always_applies() {
        let failure = LocalizeError::VerificationFailed {
            missing: vec!["loop".to_string()],
        };
        let result = echo_original(&context(&failure, None)).unwrap();
        assert_eq!(result.localized, result.original);
        assert_eq!(result.error, Some(failure));
        assert_eq!(result.concepts_detected, vec![ConceptKind::Loop]);
        assert!(result.metaphors_used.is_empty());
        assert!(!result.cached);
        assert!(result.disclaimer.is_none());
    }

    // ==================== Chain ====================

    #[test]
    fn test_chain_order() {
        let chain = FallbackChain::new();
        assert_eq!(chain.strategy_names(), vec!["race_recovery", "echo_original"]);

        let failure = LocalizeError::ProviderTransientFailure {
            message: "503".to_string(),
        };
        let (name, result) = chain.resolve(&context(&failure, Some(stored())));
        assert_eq!(name, "race_recovery");
        assert!(result.error.is_none());

        let (name, result) = chain.resolve(&context(&failure, None));
        assert_eq!(name, "echo_original");
        assert_eq!(result.localized, "Loops repeat work.");
    }
}
