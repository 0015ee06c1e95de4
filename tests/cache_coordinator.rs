//! Coordinator-level guarantees: fetch dedup, shared error states,
//! staleness, optimistic rollback, and the supersede rule.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use bookworm_data::cache::{
    CacheConfig, CacheCoordinator, CacheError, Cacheable, ChangeReason, QueryKey,
};
use bookworm_data::domain::entities::UserRecord;
use bookworm_data::infra::error::RemoteError;

fn sample_user(id: Uuid, handle: &str) -> UserRecord {
    UserRecord {
        id,
        handle: handle.to_string(),
        display_name: handle.to_string(),
        bio: None,
        avatar_path: None,
        timezone: None,
        follower_count: 0,
        following_count: 0,
        created_at: OffsetDateTime::now_utc(),
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[tokio::test]
async fn concurrent_reads_share_one_fetch() {
    let coordinator = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let fetches = Arc::new(AtomicUsize::new(0));
    let user_id = Uuid::new_v4();

    let read = |coordinator: Arc<CacheCoordinator>, fetches: Arc<AtomicUsize>| async move {
        coordinator
            .read_through(QueryKey::User(user_id), async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(sample_user(user_id, "reader"))
            })
            .await
    };

    let (a, b, c) = tokio::join!(
        read(Arc::clone(&coordinator), Arc::clone(&fetches)),
        read(Arc::clone(&coordinator), Arc::clone(&fetches)),
        read(Arc::clone(&coordinator), Arc::clone(&fetches)),
    );

    assert_eq!(a.expect("fetch result").handle, "reader");
    assert_eq!(b.expect("fetch result").handle, "reader");
    assert_eq!(c.expect("fetch result").handle, "reader");
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fresh_hits_skip_the_fetch() {
    let coordinator = CacheCoordinator::new(&CacheConfig::default());
    let fetches = Arc::new(AtomicUsize::new(0));
    let user_id = Uuid::new_v4();

    for _ in 0..3 {
        let fetches = Arc::clone(&fetches);
        let user = coordinator
            .read_through(QueryKey::User(user_id), async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(sample_user(user_id, "reader"))
            })
            .await
            .expect("fetch result");
        assert_eq!(user.id, user_id);
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_entries_are_refetched() {
    let config = CacheConfig {
        fresh_for_secs: 0,
        ..Default::default()
    };
    let coordinator = CacheCoordinator::new(&config);
    let fetches = Arc::new(AtomicUsize::new(0));
    let user_id = Uuid::new_v4();

    for _ in 0..2 {
        let fetches = Arc::clone(&fetches);
        coordinator
            .read_through(QueryKey::User(user_id), async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(sample_user(user_id, "reader"))
            })
            .await
            .expect("fetch result");
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_fetch_is_shared_and_not_cached() {
    let coordinator = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let fetches = Arc::new(AtomicUsize::new(0));
    let user_id = Uuid::new_v4();

    let read = |coordinator: Arc<CacheCoordinator>, fetches: Arc<AtomicUsize>| async move {
        coordinator
            .read_through::<UserRecord, _>(QueryKey::User(user_id), async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(RemoteError::NotFound)
            })
            .await
    };

    let (a, b) = tokio::join!(
        read(Arc::clone(&coordinator), Arc::clone(&fetches)),
        read(Arc::clone(&coordinator), Arc::clone(&fetches)),
    );

    for result in [a, b] {
        match result {
            Err(CacheError::Remote(err)) => assert!(err.is_not_found()),
            other => panic!("expected shared remote error, got {other:?}"),
        }
    }
    // Both waiters observed one failed fetch; nothing was cached.
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert!(coordinator.store().is_empty());

    // The next read retries.
    let user = coordinator
        .read_through(QueryKey::User(user_id), {
            let fetches = Arc::clone(&fetches);
            async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(sample_user(user_id, "reader"))
            }
        })
        .await
        .expect("retry succeeds");
    assert_eq!(user.handle, "reader");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_mutation_restores_pre_mutation_state() {
    let coordinator = CacheCoordinator::new(&CacheConfig::default());
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    coordinator.write_confirmed(QueryKey::User(alice), sample_user(alice, "alice"));
    coordinator.write_confirmed(QueryKey::User(bob), sample_user(bob, "bob"));

    let before_alice = coordinator.store().snapshot(&QueryKey::User(alice));
    let before_bob = coordinator.store().snapshot(&QueryKey::User(bob));
    let absent_key = QueryKey::User(Uuid::new_v4());
    assert!(coordinator.store().snapshot(&absent_key).is_none());

    let mut changed_alice = sample_user(alice, "alice");
    changed_alice.following_count = 10;
    let mut changed_bob = sample_user(bob, "bob");
    changed_bob.follower_count = 10;

    let result: Result<(), CacheError> = coordinator
        .mutate(
            vec![
                (QueryKey::User(alice), changed_alice.into_cached()),
                (QueryKey::User(bob), changed_bob.into_cached()),
                (
                    absent_key.clone(),
                    sample_user(Uuid::new_v4(), "ghost").into_cached(),
                ),
            ],
            async {
                Err(RemoteError::Status {
                    status: 503,
                    body: String::new(),
                })
            },
        )
        .await;
    assert!(result.is_err());

    // Every touched entry is structurally equal to its pre-mutation state,
    // including the key that was absent.
    assert_eq!(coordinator.store().snapshot(&QueryKey::User(alice)), before_alice);
    assert_eq!(coordinator.store().snapshot(&QueryKey::User(bob)), before_bob);
    assert!(coordinator.store().snapshot(&absent_key).is_none());
}

#[tokio::test]
async fn successful_mutation_keeps_optimistic_state() {
    let coordinator = CacheCoordinator::new(&CacheConfig::default());
    let user_id = Uuid::new_v4();
    coordinator.write_confirmed(QueryKey::User(user_id), sample_user(user_id, "reader"));

    let mut changed = sample_user(user_id, "reader");
    changed.follower_count = 7;

    coordinator
        .mutate(
            vec![(QueryKey::User(user_id), changed.into_cached())],
            async { Ok(()) },
        )
        .await
        .expect("mutation succeeds");

    let cached: UserRecord = coordinator
        .peek(&QueryKey::User(user_id))
        .expect("cached user");
    assert_eq!(cached.follower_count, 7);
}

#[tokio::test]
async fn optimistic_write_supersedes_slow_fetch() {
    let coordinator = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let user_id = Uuid::new_v4();
    let key = QueryKey::User(user_id);

    // A slow fetch that would report zero followers.
    let reader = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        let key = key.clone();
        async move {
            coordinator
                .read_through(key, async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(sample_user(user_id, "stale"))
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // An optimistic write lands while the fetch is in flight.
    let mut optimistic = sample_user(user_id, "fresh");
    optimistic.follower_count = 42;
    let mut ctx = coordinator.begin();
    coordinator.apply(&mut ctx, key.clone(), optimistic);
    coordinator.settle(ctx);

    // The waiting reader observes the optimistic value, not the stale fetch.
    let read: UserRecord = reader
        .await
        .expect("reader task")
        .expect("read settles");
    assert_eq!(read.handle, "fresh");
    assert_eq!(read.follower_count, 42);

    // Long after the stale fetch would have resolved, the write still wins.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let cached: UserRecord = coordinator.peek(&key).expect("cached user");
    assert_eq!(cached.handle, "fresh");
    assert_eq!(cached.follower_count, 42);
}

#[tokio::test]
async fn invalidate_forces_refetch_and_notifies() {
    let coordinator = CacheCoordinator::new(&CacheConfig::default());
    let fetches = Arc::new(AtomicUsize::new(0));
    let user_id = Uuid::new_v4();
    let key = QueryKey::User(user_id);
    let mut events = coordinator.subscribe();

    for _ in 0..2 {
        let fetches = Arc::clone(&fetches);
        coordinator
            .read_through(key.clone(), async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(sample_user(user_id, "reader"))
            })
            .await
            .expect("fetch result");
        coordinator.invalidate(&key);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 2);

    let first = events.recv().await.expect("update event");
    assert_eq!(first.reason, ChangeReason::Updated);
    let second = events.recv().await.expect("invalidate event");
    assert_eq!(second.reason, ChangeReason::Invalidated);
    assert!(first.epoch < second.epoch);
}
