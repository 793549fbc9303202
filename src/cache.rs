//! Content-addressed result cache with single-flight computation.
//!
//! A key is either `Ready` (a stored entry with an expiry) or `Pending` (one
//! computation in flight, shared by every caller that asks for the key while
//! it runs). Computations run on their own task so a caller giving up on its
//! wait does not cancel work another caller is still waiting for. When the
//! last waiter leaves, the computation is cancelled.
//!
//! Only successful computations are stored. Expiry is checked on read; a
//! background sweeper drops entries nobody reads again.

use crate::concepts::ConceptKind;
use crate::culture::CulturalCategory;
use crate::profile::Profile;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

const KEY_VERSION: &str = "v1";

/// Fingerprint of (normalized text, sorted profile categories, language).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(text: &str, profile: &Profile) -> Self {
        let categories = profile
            .sorted_categories()
            .iter()
            .map(|c| c.slug())
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(KEY_VERSION.as_bytes());
        hasher.update(b"|");
        hasher.update(profile.language().code().as_bytes());
        hasher.update(b"|");
        hasher.update(categories.as_bytes());
        hasher.update(b"|");
        hasher.update(normalize_text(text).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix used in logs.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

/// Line endings unified and surrounding whitespace trimmed. Inner whitespace
/// is left alone since it can be significant inside code.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// A stored localization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub localized_text: String,
    pub concepts_detected: Vec<ConceptKind>,
    pub metaphors_used: Vec<CulturalCategory>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(
        localized_text: String,
        concepts_detected: Vec<ConceptKind>,
        metaphors_used: Vec<CulturalCategory>,
        ttl: Duration,
    ) -> Self {
        Self {
            localized_text,
            concepts_detected,
            metaphors_used,
            created_at: Utc::now(),
            ttl,
        }
    }
}

/// How a `get_or_compute` call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A fresh stored entry
    Hit,
    /// This caller started the computation
    Computed,
    /// This caller waited on a computation someone else started
    Joined,
}

/// Why `get_or_compute` produced no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError<E> {
    /// The computation failed; every waiter sees the same error
    Compute(E),
    /// The computation ended without reporting (it panicked)
    Abandoned,
}

type Shared<E> = Option<Result<Arc<CacheEntry>, E>>;

enum Slot<E> {
    Ready {
        entry: Arc<CacheEntry>,
        expires_at: Instant,
    },
    Pending {
        rx: watch::Receiver<Shared<E>>,
        waiters: usize,
        generation: u64,
        cancel: Arc<Notify>,
    },
}

struct Inner<E> {
    slots: Mutex<HashMap<CacheKey, Slot<E>>>,
    next_generation: AtomicU64,
    ttl: Duration,
}

impl<E> Inner<E> {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot<E>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct ResultCache<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for ResultCache<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Registered interest in a pending computation.
struct WaiterGuard<E> {
    inner: Arc<Inner<E>>,
    key: CacheKey,
    generation: u64,
}

impl<E> Drop for WaiterGuard<E> {
    fn drop(&mut self) {
        let mut slots = self.inner.lock();
        let abandon = match slots.get_mut(&self.key) {
            Some(Slot::Pending {
                waiters,
                generation,
                cancel,
                ..
            }) if *generation == self.generation => {
                *waiters -= 1;
                (*waiters == 0).then(|| Arc::clone(cancel))
            }
            _ => None,
        };

        if let Some(cancel) = abandon {
            slots.remove(&self.key);
            cancel.notify_one();
            debug!("Cache {}: no waiters left, computation cancelled", self.key.short());
        }
    }
}

impl<E> ResultCache<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                ttl,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Keys currently stored or in flight.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh stored entry for `key`, without starting anything.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        match self.inner.lock().get(key) {
            Some(Slot::Ready { entry, expires_at }) if Instant::now() < *expires_at => {
                Some(Arc::clone(entry))
            }
            _ => None,
        }
    }

    /// Drop expired entries. Reads never depend on this.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.inner.lock();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready { expires_at, .. } => now < *expires_at,
            Slot::Pending { .. } => true,
        });
        before - slots.len()
    }

    /// Purge expired entries every `period` until the cache is dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    debug!("Cache dropped, sweeper stopping");
                    break;
                };
                let purged = ResultCache { inner }.purge_expired();
                if purged > 0 {
                    debug!("Cache sweep removed {} expired entries", purged);
                }
            }
        })
    }

    /// Return the entry for `key`, computing it at most once across
    /// concurrent callers.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<(Arc<CacheEntry>, CacheOutcome), CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheEntry, E>> + Send + 'static,
    {
        let (mut rx, generation, outcome) = {
            let mut slots = self.inner.lock();
            match slots.get_mut(key) {
                Some(Slot::Ready { entry, expires_at }) if Instant::now() < *expires_at => {
                    return Ok((Arc::clone(entry), CacheOutcome::Hit));
                }
                Some(Slot::Pending {
                    rx,
                    waiters,
                    generation,
                    ..
                }) => {
                    *waiters += 1;
                    (rx.clone(), *generation, CacheOutcome::Joined)
                }
                _ => {
                    // Missing or expired: start a computation
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    let cancel = Arc::new(Notify::new());
                    slots.insert(
                        key.clone(),
                        Slot::Pending {
                            rx: rx.clone(),
                            waiters: 1,
                            generation,
                            cancel: Arc::clone(&cancel),
                        },
                    );
                    self.spawn_compute(key.clone(), generation, tx, cancel, compute());
                    (rx, generation, CacheOutcome::Computed)
                }
            }
        };

        let _guard = WaiterGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            generation,
        };

        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(result) = current {
                return result
                    .map(|entry| (entry, outcome))
                    .map_err(CacheError::Compute);
            }
            if rx.changed().await.is_err() {
                return Err(CacheError::Abandoned);
            }
        }
    }

    fn spawn_compute<Fut>(
        &self,
        key: CacheKey,
        generation: u64,
        tx: watch::Sender<Shared<E>>,
        cancel: Arc<Notify>,
        compute: Fut,
    ) where
        Fut: Future<Output = Result<CacheEntry, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = tokio::select! {
                result = compute => result,
                _ = cancel.notified() => return,
            };
            let shared = result.map(Arc::new);

            // Store before publishing, so a waiter that wakes and leaves
            // cannot remove the slot ahead of the store
            {
                let mut slots = inner.lock();
                let ours = matches!(
                    slots.get(&key),
                    Some(Slot::Pending { generation: g, .. }) if *g == generation
                );
                if ours {
                    match &shared {
                        Ok(entry) => {
                            slots.insert(
                                key.clone(),
                                Slot::Ready {
                                    entry: Arc::clone(entry),
                                    expires_at: Instant::now() + inner.ttl,
                                },
                            );
                        }
                        Err(_) => {
                            slots.remove(&key);
                        }
                    }
                }
            }

            let _ = tx.send(Some(shared));
        });
    }
}
