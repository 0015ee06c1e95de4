//! Remote-source traits describing the backend adapters.
//!
//! Each method is a pure async fetch or mutate: typed input, typed domain
//! records out, `RemoteError` on failure. No cache interaction happens here;
//! all of it goes through the coordinator in the services.

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    BookSummary, BookVolumeRecord, FollowEdgeRecord, NotificationRecord, PostRecord,
    ReadingSessionRecord, ShelfEntryRecord, UserRecord,
};
use crate::domain::types::{PostVisibility, ShelfKind};
use crate::infra::error::RemoteError;

#[derive(Debug, Clone)]
pub struct CreateProfileParams {
    pub user_id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub timezone: Option<chrono_tz::Tz>,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileParams {
    pub user_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_path: Option<String>,
}

#[async_trait]
pub trait UsersSource: Send + Sync {
    async fn fetch_user(&self, id: Uuid) -> Result<UserRecord, RemoteError>;

    async fn create_profile(&self, params: CreateProfileParams) -> Result<UserRecord, RemoteError>;

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    /// Client-generated id, so images can be stored under the post's blob
    /// prefix before the document exists.
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_handle: String,
    pub body: String,
    pub volume_id: Option<String>,
    pub image_paths: Vec<String>,
    pub visibility: PostVisibility,
}

#[async_trait]
pub trait PostsSource: Send + Sync {
    /// Posts from the accounts the viewer follows, newest first.
    async fn fetch_feed(&self, viewer_id: Uuid) -> Result<Vec<PostRecord>, RemoteError>;

    async fn fetch_user_posts(
        &self,
        author_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<PostRecord>, RemoteError>;

    async fn fetch_post(&self, id: Uuid, viewer_id: Uuid) -> Result<PostRecord, RemoteError>;

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RemoteError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RemoteError>;

    async fn set_like(
        &self,
        post_id: Uuid,
        viewer_id: Uuid,
        liked: bool,
    ) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone)]
pub struct AddShelfEntryParams {
    pub user_id: Uuid,
    pub volume_id: String,
    pub shelf: ShelfKind,
    pub total_pages: u32,
}

#[async_trait]
pub trait ShelvesSource: Send + Sync {
    async fn fetch_shelves(&self, user_id: Uuid) -> Result<Vec<ShelfEntryRecord>, RemoteError>;

    async fn fetch_shelf(
        &self,
        user_id: Uuid,
        kind: ShelfKind,
    ) -> Result<Vec<ShelfEntryRecord>, RemoteError>;

    async fn add_entry(&self, params: AddShelfEntryParams)
    -> Result<ShelfEntryRecord, RemoteError>;

    async fn move_entry(
        &self,
        entry_id: Uuid,
        shelf: ShelfKind,
    ) -> Result<ShelfEntryRecord, RemoteError>;

    async fn set_bookmark(
        &self,
        entry_id: Uuid,
        bookmark_page: u32,
    ) -> Result<ShelfEntryRecord, RemoteError>;

    async fn remove_entry(&self, entry_id: Uuid) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait SocialSource: Send + Sync {
    async fn fetch_followers(&self, user_id: Uuid) -> Result<Vec<FollowEdgeRecord>, RemoteError>;

    async fn fetch_following(&self, user_id: Uuid) -> Result<Vec<FollowEdgeRecord>, RemoteError>;

    async fn follow(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<FollowEdgeRecord, RemoteError>;

    async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait NotificationsSource: Send + Sync {
    async fn fetch_notifications(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, RemoteError>;

    async fn mark_read(&self, id: Uuid) -> Result<(), RemoteError>;

    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone)]
pub struct LogSessionParams {
    pub user_id: Uuid,
    pub volume_id: String,
    pub pages_read: u32,
    pub ended_at: OffsetDateTime,
}

#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn fetch_sessions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ReadingSessionRecord>, RemoteError>;

    async fn log_session(
        &self,
        params: LogSessionParams,
    ) -> Result<ReadingSessionRecord, RemoteError>;
}

#[async_trait]
pub trait BooksSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<BookSummary>, RemoteError>;

    async fn volume(&self, volume_id: &str) -> Result<BookVolumeRecord, RemoteError>;
}

/// Address of one stored blob: `{entity-type}/{entity-id}/{index}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKey {
    pub entity_type: &'static str,
    pub entity_id: String,
    pub index: u32,
}

impl BlobKey {
    pub fn post_image(post_id: Uuid, index: u32) -> Self {
        Self {
            entity_type: "posts",
            entity_id: post_id.to_string(),
            index,
        }
    }

    pub fn avatar(user_id: Uuid) -> Self {
        Self {
            entity_type: "users",
            entity_id: user_id.to_string(),
            index: 0,
        }
    }

    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.entity_type, self.entity_id, self.index)
    }
}

/// Result of storing a blob.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn store_image(
        &self,
        key: &BlobKey,
        payload: Bytes,
        content_type: &str,
    ) -> Result<StoredBlob, RemoteError>;

    async fn fetch_image(&self, path: &str) -> Result<Bytes, RemoteError>;
}

/// Tokens minted by the auth provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTokens {
    pub user_id: Uuid,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in_secs: u64,
}

#[async_trait]
pub trait AuthSource: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, RemoteError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, RemoteError>;

    async fn sign_out(&self, refresh_token: &str) -> Result<(), RemoteError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_key_paths() {
        let post_id = Uuid::nil();
        let key = BlobKey::post_image(post_id, 2);
        assert_eq!(
            key.path(),
            "posts/00000000-0000-0000-0000-000000000000/2"
        );

        let avatar = BlobKey::avatar(post_id);
        assert_eq!(
            avatar.path(),
            "users/00000000-0000-0000-0000-000000000000/0"
        );
    }
}
