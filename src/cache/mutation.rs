//! Mutation transaction log.
//!
//! Each optimistic write records a reversible diff; rollback replays the log
//! in reverse so multi-key mutations restore the exact pre-mutation state.

use tracing::warn;

use super::keys::QueryKey;
use super::store::CacheEntry;

/// One reversible cache write.
#[derive(Debug)]
pub struct MutationDiff {
    pub key: QueryKey,
    /// Entry before the write; `None` when the key was absent.
    pub prior: Option<CacheEntry>,
}

/// Transient record of an optimistic mutation's cache writes.
///
/// Created at mutation start, consumed at settlement. Dropping an unsettled
/// context is an invariant breach and is logged; the cache entries it touched
/// stay in their optimistic state until their next refetch.
#[derive(Debug, Default)]
pub struct MutationContext {
    diffs: Vec<MutationDiff>,
    settled: bool,
}

impl MutationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pre-write entry for `key`.
    pub fn record(&mut self, key: QueryKey, prior: Option<CacheEntry>) {
        self.diffs.push(MutationDiff { key, prior });
    }

    /// Consume the log for replay, marking the context settled.
    pub fn take_diffs(&mut self) -> Vec<MutationDiff> {
        self.settled = true;
        std::mem::take(&mut self.diffs)
    }

    /// Number of writes recorded so far.
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

impl Drop for MutationContext {
    fn drop(&mut self) {
        if !self.settled && !self.diffs.is_empty() {
            warn!(
                touched = self.diffs.len(),
                keys = ?self.diffs.iter().map(|diff| &diff.key).collect::<Vec<_>>(),
                "Mutation context dropped without settle or rollback"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn diffs_keep_application_order() {
        let mut ctx = MutationContext::new();
        let key1 = QueryKey::Post(Uuid::new_v4());
        let key2 = QueryKey::Feed(Uuid::new_v4());

        ctx.record(key1.clone(), None);
        ctx.record(key2.clone(), None);
        assert_eq!(ctx.len(), 2);

        let diffs = ctx.take_diffs();
        assert_eq!(diffs[0].key, key1);
        assert_eq!(diffs[1].key, key2);
    }

    #[test]
    fn take_diffs_settles_and_empties() {
        let mut ctx = MutationContext::new();
        ctx.record(QueryKey::Post(Uuid::new_v4()), None);

        let _ = ctx.take_diffs();
        assert!(ctx.is_empty());

        // Second take is harmless.
        assert!(ctx.take_diffs().is_empty());
    }

    #[test]
    fn empty_context_drops_silently() {
        let ctx = MutationContext::new();
        drop(ctx);
    }
}
