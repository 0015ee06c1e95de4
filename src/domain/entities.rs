//! Domain records mirrored from the hosted backend's collections.

use chrono_tz::Tz;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{NotificationKind, PostVisibility, ShelfKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_path: Option<String>,
    pub timezone: Option<Tz>,
    pub follower_count: u64,
    pub following_count: u64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Book metadata as returned by the public volumes API.
///
/// Not stored in the backend; cached verbatim so shelf and post views can
/// render without re-querying the metadata service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookVolumeRecord {
    pub volume_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub page_count: Option<u32>,
}

/// Abbreviated volume used in search result lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSummary {
    pub volume_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_handle: String,
    pub body: String,
    pub volume_id: Option<String>,
    pub image_paths: Vec<String>,
    pub visibility: PostVisibility,
    pub like_count: u64,
    pub liked_by_viewer: bool,
    pub comment_count: u64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShelfEntryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub volume_id: String,
    pub shelf: ShelfKind,
    pub bookmark_page: u32,
    pub total_pages: u32,
    pub added_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowEdgeRecord {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub followee_handle: String,
    pub followee_avatar_path: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub actor_handle: String,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub read: bool,
    pub created_at: OffsetDateTime,
}

/// One sitting recorded in the reading log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingSessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub volume_id: String,
    pub pages_read: u32,
    pub ended_at: OffsetDateTime,
}
