//! Service-level optimistic flows over stub remote sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use bookworm_data::application::error::AppError;
use bookworm_data::application::posts::PostsService;
use bookworm_data::application::reading::ReadingService;
use bookworm_data::application::session::{Session, SessionHandle};
use bookworm_data::application::sources::{
    AddShelfEntryParams, BlobKey, CreatePostParams, LogSessionParams, MediaSource, PostsSource,
    ReadingSource, ShelvesSource, StoredBlob,
};
use bookworm_data::cache::{CacheConfig, CacheCoordinator, QueryKey};
use bookworm_data::domain::entities::{PostRecord, ReadingSessionRecord, ShelfEntryRecord};
use bookworm_data::domain::types::{PostVisibility, ShelfKind};
use bookworm_data::infra::error::RemoteError;

fn signed_in_session(user_id: Uuid) -> Arc<SessionHandle> {
    let handle = SessionHandle::new();
    handle.sign_in(Session {
        user_id,
        email: "reader@example.org".to_string(),
        id_token: "id-token".to_string(),
        refresh_token: "refresh-token".to_string(),
        expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
    });
    Arc::new(handle)
}

fn sample_post(id: Uuid, author_id: Uuid, like_count: u64) -> PostRecord {
    PostRecord {
        id,
        author_id,
        author_handle: "reader".to_string(),
        body: "Chapter twelve twist!".to_string(),
        volume_id: None,
        image_paths: Vec::new(),
        visibility: PostVisibility::Public,
        like_count,
        liked_by_viewer: false,
        comment_count: 0,
        created_at: OffsetDateTime::now_utc(),
    }
}

fn sample_entry(id: Uuid, user_id: Uuid, bookmark: u32) -> ShelfEntryRecord {
    ShelfEntryRecord {
        id,
        user_id,
        volume_id: "vol-1".to_string(),
        shelf: ShelfKind::CurrentlyReading,
        bookmark_page: bookmark,
        total_pages: 300,
        added_at: OffsetDateTime::now_utc(),
        updated_at: OffsetDateTime::now_utc(),
    }
}

/// Posts backend that can be told to refuse like writes.
#[derive(Default)]
struct StubPosts {
    fail_likes: AtomicBool,
    like_calls: AtomicUsize,
}

#[async_trait]
impl PostsSource for StubPosts {
    async fn fetch_feed(&self, _viewer_id: Uuid) -> Result<Vec<PostRecord>, RemoteError> {
        unimplemented!("not exercised")
    }

    async fn fetch_user_posts(
        &self,
        _author_id: Uuid,
        _viewer_id: Uuid,
    ) -> Result<Vec<PostRecord>, RemoteError> {
        unimplemented!("not exercised")
    }

    async fn fetch_post(&self, _id: Uuid, _viewer_id: Uuid) -> Result<PostRecord, RemoteError> {
        unimplemented!("not exercised")
    }

    async fn create_post(&self, _params: CreatePostParams) -> Result<PostRecord, RemoteError> {
        unimplemented!("not exercised")
    }

    async fn delete_post(&self, _id: Uuid) -> Result<(), RemoteError> {
        unimplemented!("not exercised")
    }

    async fn set_like(
        &self,
        _post_id: Uuid,
        _viewer_id: Uuid,
        _liked: bool,
    ) -> Result<(), RemoteError> {
        self.like_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_likes.load(Ordering::SeqCst) {
            Err(RemoteError::Status {
                status: 503,
                body: String::new(),
            })
        } else {
            Ok(())
        }
    }
}

struct StubMedia;

#[async_trait]
impl MediaSource for StubMedia {
    async fn store_image(
        &self,
        key: &BlobKey,
        _payload: bytes::Bytes,
        _content_type: &str,
    ) -> Result<StoredBlob, RemoteError> {
        Ok(StoredBlob {
            path: key.path(),
            checksum: String::new(),
            size_bytes: 0,
        })
    }

    async fn fetch_image(&self, _path: &str) -> Result<bytes::Bytes, RemoteError> {
        unimplemented!("not exercised")
    }
}

/// Shelves backend returning one fixed entry; bookmark writes can fail.
struct StubShelves {
    entry: ShelfEntryRecord,
    fail_bookmark: AtomicBool,
}

#[async_trait]
impl ShelvesSource for StubShelves {
    async fn fetch_shelves(&self, _user_id: Uuid) -> Result<Vec<ShelfEntryRecord>, RemoteError> {
        Ok(vec![self.entry.clone()])
    }

    async fn fetch_shelf(
        &self,
        _user_id: Uuid,
        _kind: ShelfKind,
    ) -> Result<Vec<ShelfEntryRecord>, RemoteError> {
        Ok(vec![self.entry.clone()])
    }

    async fn add_entry(
        &self,
        _params: AddShelfEntryParams,
    ) -> Result<ShelfEntryRecord, RemoteError> {
        unimplemented!("not exercised")
    }

    async fn move_entry(
        &self,
        _entry_id: Uuid,
        _shelf: ShelfKind,
    ) -> Result<ShelfEntryRecord, RemoteError> {
        unimplemented!("not exercised")
    }

    async fn set_bookmark(
        &self,
        entry_id: Uuid,
        bookmark_page: u32,
    ) -> Result<ShelfEntryRecord, RemoteError> {
        if self.fail_bookmark.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                body: String::new(),
            });
        }
        let mut entry = self.entry.clone();
        entry.id = entry_id;
        entry.bookmark_page = bookmark_page;
        Ok(entry)
    }

    async fn remove_entry(&self, _entry_id: Uuid) -> Result<(), RemoteError> {
        unimplemented!("not exercised")
    }
}

struct StubReading;

#[async_trait]
impl ReadingSource for StubReading {
    async fn fetch_sessions(
        &self,
        _user_id: Uuid,
    ) -> Result<Vec<ReadingSessionRecord>, RemoteError> {
        Ok(Vec::new())
    }

    async fn log_session(
        &self,
        params: LogSessionParams,
    ) -> Result<ReadingSessionRecord, RemoteError> {
        Ok(ReadingSessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            volume_id: params.volume_id,
            pages_read: params.pages_read,
            ended_at: params.ended_at,
        })
    }
}

#[tokio::test]
async fn like_applies_optimistically_and_rolls_back_on_failure() {
    let viewer = Uuid::new_v4();
    let cache = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let posts = Arc::new(StubPosts::default());
    let service = PostsService::new(
        Arc::clone(&cache),
        posts.clone(),
        Arc::new(StubMedia),
        signed_in_session(viewer),
    );

    let post = sample_post(Uuid::new_v4(), viewer, 2);
    let post_key = QueryKey::Post(post.id);
    let feed_key = QueryKey::Feed(viewer);
    cache.write_confirmed(post_key.clone(), post.clone());
    cache.write_confirmed(feed_key.clone(), vec![post.clone()]);

    // Successful like lands in the post entry and the cached feed.
    service.set_like(post.id, true).await.expect("like succeeds");
    let cached: PostRecord = cache.peek(&post_key).expect("cached post");
    assert_eq!(cached.like_count, 3);
    assert!(cached.liked_by_viewer);
    let feed: Vec<PostRecord> = cache.peek(&feed_key).expect("cached feed");
    assert_eq!(feed[0].like_count, 3);

    // A refused unlike rolls both entries back.
    posts.fail_likes.store(true, Ordering::SeqCst);
    let before_post = cache.store().snapshot(&post_key);
    let before_feed = cache.store().snapshot(&feed_key);

    let err = service
        .set_like(post.id, false)
        .await
        .expect_err("unlike refused");
    assert!(matches!(err, AppError::Cache(_)));

    assert_eq!(cache.store().snapshot(&post_key), before_post);
    assert_eq!(cache.store().snapshot(&feed_key), before_feed);
    assert_eq!(posts.like_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn logged_sitting_updates_sessions_and_bookmark() {
    let viewer = Uuid::new_v4();
    let entry = sample_entry(Uuid::new_v4(), viewer, 40);
    let cache = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let shelves = Arc::new(StubShelves {
        entry: entry.clone(),
        fail_bookmark: AtomicBool::new(false),
    });
    let service = ReadingService::new(
        Arc::clone(&cache),
        Arc::new(StubReading),
        shelves,
        signed_in_session(viewer),
    );

    let logged = service
        .log_sitting(entry.id, 100)
        .await
        .expect("sitting logged");

    assert_eq!(logged.session.pages_read, 60);
    assert_eq!(logged.entry.bookmark_page, 100);
    let sum = logged.segments.previously_read
        + logged.segments.newly_read
        + logged.segments.remaining;
    assert_eq!(sum, 1.0);

    let entries: Vec<ShelfEntryRecord> = cache
        .peek(&QueryKey::Bookshelves(viewer))
        .expect("cached shelves");
    assert_eq!(entries[0].bookmark_page, 100);
}

#[tokio::test]
async fn failed_sitting_restores_sessions_and_shelves() {
    let viewer = Uuid::new_v4();
    let entry = sample_entry(Uuid::new_v4(), viewer, 40);
    let cache = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let shelves = Arc::new(StubShelves {
        entry: entry.clone(),
        fail_bookmark: AtomicBool::new(true),
    });
    let service = ReadingService::new(
        Arc::clone(&cache),
        Arc::new(StubReading),
        shelves,
        signed_in_session(viewer),
    );

    // Warm both lists so the optimistic writes have something to touch.
    service.sessions(viewer).await.expect("sessions load");
    let shelves_key = QueryKey::Bookshelves(viewer);
    let sessions_key = QueryKey::ReadingSessions(viewer);

    let err = service
        .log_sitting(entry.id, 100)
        .await
        .expect_err("bookmark write refused");
    assert!(matches!(err, AppError::Cache(_)));

    let entries: Vec<ShelfEntryRecord> = cache.peek(&shelves_key).expect("cached shelves");
    assert_eq!(entries[0].bookmark_page, 40);
    let sessions: Vec<ReadingSessionRecord> = cache.peek(&sessions_key).expect("cached sessions");
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn sitting_rejects_backwards_bookmark() {
    let viewer = Uuid::new_v4();
    let entry = sample_entry(Uuid::new_v4(), viewer, 120);
    let cache = Arc::new(CacheCoordinator::new(&CacheConfig::default()));
    let shelves = Arc::new(StubShelves {
        entry: entry.clone(),
        fail_bookmark: AtomicBool::new(false),
    });
    let service = ReadingService::new(
        Arc::clone(&cache),
        Arc::new(StubReading),
        shelves,
        signed_in_session(viewer),
    );

    let err = service
        .log_sitting(entry.id, 80)
        .await
        .expect_err("backwards bookmark");
    assert!(matches!(err, AppError::Domain(_)));
    assert!(!err.user_message().is_empty());
}
