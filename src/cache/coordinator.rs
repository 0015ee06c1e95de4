//! Query/mutation cache coordination.
//!
//! Single entry point for all server-state access: read-through with per-key
//! fetch dedup, invalidation, and optimistic mutations with rollback. Screens
//! never talk to the store or the flight gate directly.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::infra::error::RemoteError;

use super::config::CacheConfig;
use super::events::{CacheEvent, ChangeFeed, ChangeReason};
use super::flight::{FetchOutcome, FlightGate, FlightRole};
use super::keys::QueryKey;
use super::mutation::MutationContext;
use super::store::{CacheStore, Cacheable, CachedValue, ReadState};

const METRIC_CACHE_HIT: &str = "bookworm_cache_hit_total";
const METRIC_CACHE_MISS: &str = "bookworm_cache_miss_total";
const METRIC_CACHE_JOIN: &str = "bookworm_cache_join_total";
const METRIC_CACHE_FETCH_ERROR: &str = "bookworm_cache_fetch_error_total";
const METRIC_CACHE_OPTIMISTIC: &str = "bookworm_cache_optimistic_write_total";
const METRIC_CACHE_ROLLBACK: &str = "bookworm_cache_rollback_total";
const METRIC_CACHE_SUPERSEDED: &str = "bookworm_cache_superseded_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("remote operation failed: {0}")]
    Remote(Arc<RemoteError>),
    #[error("cached value for {key:?} has an unexpected shape")]
    Shape { key: QueryKey },
    #[error("read superseded by a newer write and the entry was evicted")]
    Superseded,
}

impl CacheError {
    /// The remote failure behind this error, when there is one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            CacheError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

/// Process-wide cache coordinator.
pub struct CacheCoordinator {
    store: Arc<CacheStore>,
    gate: Arc<FlightGate>,
    feed: Arc<ChangeFeed>,
}

impl CacheCoordinator {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            store: Arc::new(CacheStore::new(config)),
            gate: Arc::new(FlightGate::new()),
            feed: Arc::new(ChangeFeed::new(config.event_buffer_clamped())),
        }
    }

    /// Subscribe to cache change events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.feed.subscribe()
    }

    /// The underlying store, for state inspection.
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Last-known value for `key`, fresh or stale, without fetching.
    ///
    /// Optimistic mutators derive predicted values from this.
    pub fn peek<T: Cacheable>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.store.snapshot(key)?;
        T::from_cached(entry.value)
    }

    /// Read through the cache.
    ///
    /// Returns the cached value when fresh. Otherwise joins the in-flight
    /// fetch for the key if one exists, or spawns `fetch` as an abortable
    /// task; every waiter observes the same outcome. A fetch failure is the
    /// shared error state for all waiters and caches nothing.
    pub async fn read_through<T, F>(&self, key: QueryKey, fetch: F) -> Result<T, CacheError>
    where
        T: Cacheable,
        F: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        if let ReadState::Fresh(value) = self.store.read(&key) {
            counter!(METRIC_CACHE_HIT).increment(1);
            return T::from_cached(value).ok_or(CacheError::Shape { key });
        }
        counter!(METRIC_CACHE_MISS).increment(1);

        let role = self.gate.lead_or_join(&key, |generation| {
            let gate = Arc::clone(&self.gate);
            let store = Arc::clone(&self.store);
            let feed = Arc::clone(&self.feed);
            let key = key.clone();
            tokio::spawn(async move {
                let mut guard = FlightCleanup::armed(Arc::clone(&gate), key.clone(), generation);
                let result = fetch.await;
                guard.disarm();
                match result {
                    Ok(value) => {
                        let committed = gate.finish(&key, generation, || {
                            store.write(key.clone(), value.into_cached());
                            feed.publish(key.clone(), ChangeReason::Updated);
                        });
                        if !committed {
                            counter!(METRIC_CACHE_SUPERSEDED).increment(1);
                            debug!(key = ?key, "Fetch result discarded: flight superseded");
                        }
                    }
                    Err(err) => {
                        counter!(METRIC_CACHE_FETCH_ERROR).increment(1);
                        gate.fail(&key, generation, Arc::new(err));
                    }
                }
            })
            .abort_handle()
        });

        let mut outcome = match role {
            FlightRole::Led { outcome, .. } => outcome,
            FlightRole::Joined(outcome) => {
                counter!(METRIC_CACHE_JOIN).increment(1);
                outcome
            }
        };

        let settled = outcome
            .wait_for(FetchOutcome::is_settled)
            .await
            .map(|state| state.clone())
            .unwrap_or(FetchOutcome::Superseded);

        match settled {
            FetchOutcome::Failed(err) => Err(CacheError::Remote(err)),
            // Completed: the flight committed before retiring. Superseded: a
            // newer write retired it, and that write is the answer.
            FetchOutcome::Completed | FetchOutcome::Superseded => match self.store.read(&key) {
                ReadState::Fresh(value) | ReadState::Stale(value) => {
                    T::from_cached(value).ok_or(CacheError::Shape { key })
                }
                ReadState::Absent => Err(CacheError::Superseded),
            },
            FetchOutcome::Pending => unreachable!("wait_for returned an unsettled outcome"),
        }
    }

    /// Drop the entry for `key`; the next read refetches.
    ///
    /// A fetch already in flight is left to finish: its result is current
    /// enough for the waiters that started it.
    pub fn invalidate(&self, key: &QueryKey) {
        if self.store.invalidate(key) {
            self.feed.publish(key.clone(), ChangeReason::Invalidated);
        }
    }

    /// Store a backend-confirmed value outside a read.
    ///
    /// Used after a successful mutation returns the stored form. Any fetch
    /// in flight for the key predates the mutation and is superseded.
    pub fn write_confirmed<T: Cacheable>(&self, key: QueryKey, value: T) {
        let cached = value.into_cached();
        let aborted = self.gate.retire(&key, || {
            self.store.write(key.clone(), cached);
        });
        if aborted {
            counter!(METRIC_CACHE_SUPERSEDED).increment(1);
        }
        self.feed.publish(key, ChangeReason::Updated);
    }

    /// Drop every cached entry. Viewer-scoped data must not survive a
    /// sign-out.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Start an optimistic mutation.
    pub fn begin(&self) -> MutationContext {
        MutationContext::new()
    }

    /// Write a predicted value, recording the prior entry for rollback.
    ///
    /// Any fetch in flight for the key is aborted: its response would predate
    /// this write.
    pub fn apply<T: Cacheable>(&self, ctx: &mut MutationContext, key: QueryKey, value: T) {
        self.apply_cached(ctx, key, value.into_cached());
    }

    fn apply_cached(&self, ctx: &mut MutationContext, key: QueryKey, value: CachedValue) {
        // Snapshot and write inside the flight slot, so a concurrent fetch
        // either committed before the snapshot or never commits at all.
        let aborted = self.gate.retire(&key, || {
            let prior = self.store.snapshot(&key);
            ctx.record(key.clone(), prior);
            self.store.write(key.clone(), value);
        });
        if aborted {
            counter!(METRIC_CACHE_SUPERSEDED).increment(1);
            debug!(key = ?key, "In-flight fetch aborted by optimistic write");
        }
        counter!(METRIC_CACHE_OPTIMISTIC).increment(1);
        self.feed.publish(key, ChangeReason::Updated);
    }

    /// Discard the snapshot log after a confirmed mutation.
    pub fn settle(&self, mut ctx: MutationContext) {
        let settled = ctx.take_diffs();
        debug!(touched = settled.len(), "Mutation settled");
    }

    /// Restore every entry the mutation touched, newest write first.
    pub fn rollback(&self, mut ctx: MutationContext) {
        let diffs = ctx.take_diffs();
        counter!(METRIC_CACHE_ROLLBACK).increment(1);
        debug!(touched = diffs.len(), "Mutation rolled back");
        for diff in diffs.into_iter().rev() {
            self.store.restore(diff.key.clone(), diff.prior);
            self.feed.publish(diff.key, ChangeReason::RolledBack);
        }
    }

    /// Run a remote mutation with optimistic writes.
    ///
    /// Applies every write immediately, then awaits `op`; on failure the
    /// writes are rolled back and the error propagates to the caller.
    pub async fn mutate<R, F>(
        &self,
        writes: Vec<(QueryKey, CachedValue)>,
        op: F,
    ) -> Result<R, CacheError>
    where
        F: Future<Output = Result<R, RemoteError>>,
    {
        let mut ctx = self.begin();
        for (key, value) in writes {
            self.apply_cached(&mut ctx, key, value);
        }
        match op.await {
            Ok(result) => {
                self.settle(ctx);
                Ok(result)
            }
            Err(err) => {
                self.rollback(ctx);
                Err(CacheError::Remote(Arc::new(err)))
            }
        }
    }
}

/// Settles a flight whose task dies without reporting.
///
/// A fetch future that panics would otherwise leave its flight pending
/// forever, hanging every waiter and blocking later reads of the key.
struct FlightCleanup {
    gate: Arc<FlightGate>,
    key: QueryKey,
    generation: u64,
    armed: bool,
}

impl FlightCleanup {
    fn armed(gate: Arc<FlightGate>, key: QueryKey, generation: u64) -> Self {
        Self {
            gate,
            key,
            generation,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FlightCleanup {
    fn drop(&mut self) {
        if self.armed {
            self.gate
                .fail(&self.key, self.generation, Arc::new(RemoteError::Interrupted));
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::domain::entities::NotificationRecord;

    use super::*;

    #[tokio::test]
    async fn invalidate_absent_key_publishes_nothing() {
        let coordinator = CacheCoordinator::new(&CacheConfig::default());
        let mut rx = coordinator.subscribe();

        coordinator.invalidate(&QueryKey::Feed(Uuid::nil()));

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn settle_keeps_optimistic_values() {
        let coordinator = CacheCoordinator::new(&CacheConfig::default());
        let key = QueryKey::Notifications(Uuid::nil());

        let empty: Vec<NotificationRecord> = Vec::new();
        let mut ctx = coordinator.begin();
        coordinator.apply(&mut ctx, key.clone(), empty.clone());
        coordinator.settle(ctx);

        let cached: Option<Vec<NotificationRecord>> = coordinator.peek(&key);
        assert_eq!(cached, Some(empty));
    }
}
