//! Admission control in front of the provider gateway.
//!
//! Two limits apply to every provider call: a sliding one-minute budget of
//! calls and a fixed pool of concurrent calls. What happens when either is
//! exhausted depends on the `AdmissionPolicy`; waiting is always bounded.

use crate::config::{AdmissionPolicy, Config};
use crate::error::LocalizeError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

const WINDOW: Duration = Duration::from_secs(60);

/// Retry hint when only the concurrency pool is saturated.
const SATURATED_RETRY_HINT: Duration = Duration::from_secs(1);

/// Holds one slot of the concurrent-call pool until dropped.
#[derive(Debug)]
pub struct AdmissionPermit {
    _slot: OwnedSemaphorePermit,
}

#[derive(Debug)]
pub struct AdmissionController {
    limit_per_window: u32,
    policy: AdmissionPolicy,
    max_concurrent: usize,
    /// Admission times inside the current window, oldest first
    records: Mutex<VecDeque<Instant>>,
    slots: Arc<Semaphore>,
    waiting: AtomicUsize,
}

/// Decrements the waiting count however the wait ends.
struct QueueGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdmissionController {
    pub fn new(limit_per_window: u32, max_concurrent: usize, policy: AdmissionPolicy) -> Self {
        Self {
            limit_per_window: limit_per_window.max(1),
            policy,
            max_concurrent: max_concurrent.max(1),
            records: Mutex::new(VecDeque::new()),
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_per_minute,
            config.max_concurrent_provider_calls,
            config.admission_policy,
        )
    }

    /// Number of callers currently waiting for budget or a slot.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Number of provider calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    /// Admit one provider call, waiting or rejecting according to the policy.
    ///
    /// Budget is only recorded once a slot is held, so a rejected call never
    /// spends any of the window.
    pub async fn admit(&self) -> Result<AdmissionPermit, LocalizeError> {
        let retry_after = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(slot) => match self.try_take_budget(Instant::now()) {
                Ok(()) => return Ok(AdmissionPermit { _slot: slot }),
                Err(retry_after) => retry_after,
            },
            Err(_) => self
                .budget_wait(Instant::now())
                .unwrap_or(SATURATED_RETRY_HINT),
        };

        let max_depth = match self.policy {
            AdmissionPolicy::Reject => {
                warn!("Admission rejected, retry after {:?}", retry_after);
                return Err(LocalizeError::RateLimitExceeded { retry_after });
            }
            AdmissionPolicy::Queue { max_depth } => max_depth,
        };

        let _guard = self.enter_queue(max_depth, retry_after)?;

        loop {
            let slot = Arc::clone(&self.slots)
                .acquire_owned()
                .await
                .map_err(|_| LocalizeError::RateLimitExceeded {
                    retry_after: SATURATED_RETRY_HINT,
                })?;

            match self.try_take_budget(Instant::now()) {
                Ok(()) => return Ok(AdmissionPermit { _slot: slot }),
                Err(retry_after) => {
                    drop(slot);
                    debug!("Rate budget spent, waiting {:?}", retry_after);
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }

    fn enter_queue(
        &self,
        max_depth: usize,
        retry_after: Duration,
    ) -> Result<QueueGuard<'_>, LocalizeError> {
        let previous = self.waiting.fetch_add(1, Ordering::SeqCst);
        let guard = QueueGuard {
            waiting: &self.waiting,
        };

        if previous >= max_depth {
            drop(guard);
            warn!(
                "Admission queue full ({} waiting), retry after {:?}",
                max_depth, retry_after
            );
            return Err(LocalizeError::RateLimitExceeded { retry_after });
        }

        Ok(guard)
    }

    /// Record an admission if the window has room, otherwise return how long
    /// until the oldest admission leaves the window.
    fn try_take_budget(&self, now: Instant) -> Result<(), Duration> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match Self::window_wait(&mut records, self.limit_per_window, now) {
            Some(retry_after) => Err(retry_after),
            None => {
                records.push_back(now);
                Ok(())
            }
        }
    }

    /// How long until the window has room, without recording anything.
    fn budget_wait(&self, now: Instant) -> Option<Duration> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Self::window_wait(&mut records, self.limit_per_window, now)
    }

    fn window_wait(records: &mut VecDeque<Instant>, limit: u32, now: Instant) -> Option<Duration> {
        while let Some(&oldest) = records.front() {
            if now.duration_since(oldest) >= WINDOW {
                records.pop_front();
            } else {
                break;
            }
        }

        if records.len() < limit as usize {
            return None;
        }

        let oldest = records.front().copied().unwrap_or(now);
        let retry_after = WINDOW.saturating_sub(now.duration_since(oldest));
        Some(retry_after.max(Duration::from_millis(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_until_queued(limiter: &AdmissionController, n: usize) {
        while limiter.queued() < n {
            tokio::task::yield_now().await;
        }
    }

    // ==================== Reject policy ====================

    #[tokio::test(start_paused = true)]
    async fn test_reject_after_budget_spent() {
        let limiter = AdmissionController::new(3, 10, AdmissionPolicy::Reject);
        for _ in 0..3 {
            drop(limiter.admit().await.unwrap());
        }

        let err = limiter.admit().await.unwrap_err();
        let retry_after = err.retry_after().unwrap();
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = AdmissionController::new(2, 10, AdmissionPolicy::Reject);
        drop(limiter.admit().await.unwrap());
        tokio::time::advance(Duration::from_secs(30)).await;
        drop(limiter.admit().await.unwrap());

        let err = limiter.admit().await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limiter.admit().await.is_ok());
    }

    #[tokio::test]
    async fn test_reject_when_pool_saturated() {
        let limiter = AdmissionController::new(100, 1, AdmissionPolicy::Reject);
        let held = limiter.admit().await.unwrap();
        assert_eq!(limiter.in_flight(), 1);

        let err = limiter.admit().await.unwrap_err();
        assert_eq!(err.retry_after(), Some(SATURATED_RETRY_HINT));

        drop(held);
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.admit().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_rejection_keeps_budget() {
        let limiter = AdmissionController::new(2, 1, AdmissionPolicy::Reject);
        let held = limiter.admit().await.unwrap();

        for _ in 0..3 {
            let err = limiter.admit().await.unwrap_err();
            assert_eq!(err.retry_after(), Some(SATURATED_RETRY_HINT));
        }

        // Only one call was admitted, so one more fits the window
        drop(held);
        drop(limiter.admit().await.unwrap());

        let err = limiter.admit().await.unwrap_err();
        assert_eq!(err.retry_after(), Some(WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_and_spent_reports_window_wait() {
        let limiter = AdmissionController::new(1, 1, AdmissionPolicy::Reject);
        let _held = limiter.admit().await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        let err = limiter.admit().await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(40)));
    }

    // ==================== Queue policy ====================

    #[tokio::test(start_paused = true)]
    async fn test_queue_waits_for_budget() {
        let limiter = Arc::new(AdmissionController::new(
            1,
            10,
            AdmissionPolicy::Queue { max_depth: 1 },
        ));
        let _first = limiter.admit().await.unwrap();
        let started = Instant::now();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.admit().await.map(|_| Instant::now()) })
        };
        wait_until_queued(&limiter, 1).await;

        // Queue holds one waiter already
        let err = limiter.admit().await.unwrap_err();
        assert!(err.retry_after().unwrap() > Duration::ZERO);

        let admitted_at = waiter.await.unwrap().unwrap();
        assert!(admitted_at.duration_since(started) >= WINDOW);
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn test_queue_waits_for_slot() {
        let limiter = Arc::new(AdmissionController::new(
            100,
            1,
            AdmissionPolicy::Queue { max_depth: 5 },
        ));
        let held = limiter.admit().await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.admit().await.is_ok() })
        };
        wait_until_queued(&limiter, 1).await;
        assert_eq!(limiter.in_flight(), 1);

        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_leaves_queue() {
        let limiter = AdmissionController::new(1, 10, AdmissionPolicy::Queue { max_depth: 1 });
        let _first = limiter.admit().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), limiter.admit()).await;
        assert!(result.is_err());
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_rejection_keeps_budget() {
        let limiter = AdmissionController::new(2, 1, AdmissionPolicy::Queue { max_depth: 0 });
        let held = limiter.admit().await.unwrap();

        let err = limiter.admit().await.unwrap_err();
        assert_eq!(err.retry_after(), Some(SATURATED_RETRY_HINT));

        drop(held);
        assert!(limiter.admit().await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_depth_queue_rejects() {
        let limiter = AdmissionController::new(1, 10, AdmissionPolicy::Queue { max_depth: 0 });
        let _first = limiter.admit().await.unwrap();
        assert!(matches!(
            limiter.admit().await,
            Err(LocalizeError::RateLimitExceeded { .. })
        ));
    }
}
