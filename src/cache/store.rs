//! Keyed cache storage.
//!
//! One process-wide map from `QueryKey` to the last-known result, with LRU
//! eviction and a single freshness window. Entries are owned exclusively by
//! this store; mutation snapshots and restores go through it as well.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::warn;

use crate::domain::entities::{
    BookSummary, BookVolumeRecord, FollowEdgeRecord, NotificationRecord, PostRecord,
    ReadingSessionRecord, ShelfEntryRecord, UserRecord,
};

use super::config::CacheConfig;
use super::keys::QueryKey;

const SOURCE: &str = "cache::store";

/// Tagged union of every payload the store can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    User(UserRecord),
    Post(PostRecord),
    Posts(Vec<PostRecord>),
    ShelfEntries(Vec<ShelfEntryRecord>),
    FollowEdges(Vec<FollowEdgeRecord>),
    Notifications(Vec<NotificationRecord>),
    ReadingSessions(Vec<ReadingSessionRecord>),
    BookMatches(Vec<BookSummary>),
    BookVolume(BookVolumeRecord),
}

/// Payload types that can move in and out of the store.
pub trait Cacheable: Sized + Clone + Send + 'static {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(value: CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(UserRecord, User);
cacheable!(PostRecord, Post);
cacheable!(Vec<PostRecord>, Posts);
cacheable!(Vec<ShelfEntryRecord>, ShelfEntries);
cacheable!(Vec<FollowEdgeRecord>, FollowEdges);
cacheable!(Vec<NotificationRecord>, Notifications);
cacheable!(Vec<ReadingSessionRecord>, ReadingSessions);
cacheable!(Vec<BookSummary>, BookMatches);
cacheable!(BookVolumeRecord, BookVolume);

/// One stored result and the moment it was fetched or predicted.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub fetched_at: Instant,
}

impl CacheEntry {
    fn now(value: CachedValue) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, fresh_for: Duration) -> bool {
        self.fetched_at.elapsed() < fresh_for
    }
}

/// Result of a non-fetching store read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadState {
    Fresh(CachedValue),
    Stale(CachedValue),
    Absent,
}

/// Keyed entry store with LRU eviction.
pub struct CacheStore {
    entries: RwLock<LruCache<QueryKey, CacheEntry>>,
    fresh_for: Duration,
}

impl CacheStore {
    /// Create a store with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            fresh_for: config.fresh_for(),
        }
    }

    /// Read the entry for `key`, reporting its freshness.
    pub fn read(&self, key: &QueryKey) -> ReadState {
        let mut entries = rw_write(&self.entries, SOURCE, "read");
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.fresh_for) => ReadState::Fresh(entry.value.clone()),
            Some(entry) => ReadState::Stale(entry.value.clone()),
            None => ReadState::Absent,
        }
    }

    /// Write a freshly fetched or optimistically predicted value.
    pub fn write(&self, key: QueryKey, value: CachedValue) {
        rw_write(&self.entries, SOURCE, "write").put(key, CacheEntry::now(value));
    }

    /// Drop the entry for `key`. Returns true if one was present.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        rw_write(&self.entries, SOURCE, "invalidate")
            .pop(key)
            .is_some()
    }

    /// Capture the current entry for `key` without promoting it.
    pub fn snapshot(&self, key: &QueryKey) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "snapshot")
            .peek(key)
            .cloned()
    }

    /// Restore an entry captured by [`CacheStore::snapshot`], including its
    /// original fetch time; `None` restores prior absence.
    pub fn restore(&self, key: QueryKey, prior: Option<CacheEntry>) {
        let mut entries = rw_write(&self.entries, SOURCE, "restore");
        match prior {
            Some(entry) => {
                entries.put(key, entry);
            }
            None => {
                entries.pop(&key);
            }
        }
    }

    /// Clear all cached data.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::domain::types::PostVisibility;

    use super::*;

    fn sample_post(id: Uuid) -> PostRecord {
        PostRecord {
            id,
            author_id: Uuid::new_v4(),
            author_handle: "reader".to_string(),
            body: "Halfway through and hooked.".to_string(),
            volume_id: Some("vol-1".to_string()),
            image_paths: Vec::new(),
            visibility: PostVisibility::Public,
            like_count: 0,
            liked_by_viewer: false,
            comment_count: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn write_then_read_is_fresh() {
        let store = CacheStore::new(&CacheConfig::default());
        let id = Uuid::new_v4();

        assert_eq!(store.read(&QueryKey::Post(id)), ReadState::Absent);

        let post = sample_post(id);
        store.write(QueryKey::Post(id), post.clone().into_cached());

        match store.read(&QueryKey::Post(id)) {
            ReadState::Fresh(CachedValue::Post(cached)) => assert_eq!(cached, post),
            other => panic!("expected fresh post, got {other:?}"),
        }
    }

    #[test]
    fn zero_window_makes_entries_stale() {
        let config = CacheConfig {
            fresh_for_secs: 0,
            ..Default::default()
        };
        let store = CacheStore::new(&config);
        let id = Uuid::new_v4();

        store.write(QueryKey::Post(id), sample_post(id).into_cached());

        assert!(matches!(
            store.read(&QueryKey::Post(id)),
            ReadState::Stale(_)
        ));
    }

    #[test]
    fn invalidate_drops_entry() {
        let store = CacheStore::new(&CacheConfig::default());
        let id = Uuid::new_v4();

        store.write(QueryKey::Post(id), sample_post(id).into_cached());
        assert!(store.invalidate(&QueryKey::Post(id)));
        assert!(!store.invalidate(&QueryKey::Post(id)));
        assert_eq!(store.read(&QueryKey::Post(id)), ReadState::Absent);
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let store = CacheStore::new(&CacheConfig::default());
        let id = Uuid::new_v4();
        let key = QueryKey::Post(id);

        assert!(store.snapshot(&key).is_none());

        store.write(key.clone(), sample_post(id).into_cached());
        let prior = store.snapshot(&key);
        assert!(prior.is_some());

        let mut changed = sample_post(id);
        changed.like_count = 9;
        store.write(key.clone(), changed.into_cached());

        store.restore(key.clone(), prior.clone());
        assert_eq!(store.snapshot(&key), prior);

        store.restore(key.clone(), None);
        assert_eq!(store.read(&key), ReadState::Absent);
    }

    #[test]
    fn lru_evicts_least_recent() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let store = CacheStore::new(&config);

        let id1 = Uuid::new_v4();
        let id2 = Uuid::new_v4();
        let id3 = Uuid::new_v4();

        store.write(QueryKey::Post(id1), sample_post(id1).into_cached());
        store.write(QueryKey::Post(id2), sample_post(id2).into_cached());
        store.write(QueryKey::Post(id3), sample_post(id3).into_cached());

        assert_eq!(store.read(&QueryKey::Post(id1)), ReadState::Absent);
        assert!(matches!(
            store.read(&QueryKey::Post(id2)),
            ReadState::Fresh(_)
        ));
        assert!(matches!(
            store.read(&QueryKey::Post(id3)),
            ReadState::Fresh(_)
        ));
    }

    #[test]
    fn cacheable_rejects_mismatched_variant() {
        let value = sample_post(Uuid::new_v4()).into_cached();
        assert!(UserRecord::from_cached(value).is_none());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = CacheStore::new(&CacheConfig::default());
        let id = Uuid::new_v4();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.write(QueryKey::Post(id), sample_post(id).into_cached());
        assert!(matches!(
            store.read(&QueryKey::Post(id)),
            ReadState::Fresh(_)
        ));
    }
}
