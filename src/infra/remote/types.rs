//! Wire documents and their translation into domain records.
//!
//! The backend stores ids as strings and instants as unix seconds; anything
//! that fails to translate is a malformed document, never a panic.

use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    FollowEdgeRecord, NotificationRecord, PostRecord, ReadingSessionRecord, ShelfEntryRecord,
    UserRecord,
};
use crate::domain::types::{NotificationKind, PostVisibility, ShelfKind};
use crate::infra::error::RemoteError;

pub(super) fn parse_id(field: &'static str, value: &str) -> Result<Uuid, RemoteError> {
    Uuid::parse_str(value)
        .map_err(|_| RemoteError::malformed(format!("field `{field}` is not a UUID: `{value}`")))
}

pub(super) fn parse_time(field: &'static str, unix_seconds: i64) -> Result<OffsetDateTime, RemoteError> {
    OffsetDateTime::from_unix_timestamp(unix_seconds).map_err(|_| {
        RemoteError::malformed(format!(
            "field `{field}` holds out-of-range timestamp {unix_seconds}"
        ))
    })
}

fn parse_timezone(value: Option<String>) -> Result<Option<chrono_tz::Tz>, RemoteError> {
    match value {
        None => Ok(None),
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(|_| RemoteError::malformed(format!("unknown timezone `{name}`"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct UserDoc {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_path: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<UserDoc> for UserRecord {
    type Error = RemoteError;

    fn try_from(doc: UserDoc) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            id: parse_id("id", &doc.id)?,
            handle: doc.handle,
            display_name: doc.display_name,
            bio: doc.bio,
            avatar_path: doc.avatar_path,
            timezone: parse_timezone(doc.timezone)?,
            follower_count: doc.follower_count,
            following_count: doc.following_count,
            created_at: parse_time("created_at", doc.created_at)?,
            updated_at: parse_time("updated_at", doc.updated_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PostDoc {
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub body: String,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    pub visibility: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub liked_by_viewer: bool,
    #[serde(default)]
    pub comment_count: u64,
    pub created_at: i64,
}

impl TryFrom<PostDoc> for PostRecord {
    type Error = RemoteError;

    fn try_from(doc: PostDoc) -> Result<Self, Self::Error> {
        let visibility = PostVisibility::try_from(doc.visibility.as_str()).map_err(|()| {
            RemoteError::malformed(format!("unknown post visibility `{}`", doc.visibility))
        })?;
        Ok(PostRecord {
            id: parse_id("id", &doc.id)?,
            author_id: parse_id("author_id", &doc.author_id)?,
            author_handle: doc.author_handle,
            body: doc.body,
            volume_id: doc.volume_id,
            image_paths: doc.image_paths,
            visibility,
            like_count: doc.like_count,
            liked_by_viewer: doc.liked_by_viewer,
            comment_count: doc.comment_count,
            created_at: parse_time("created_at", doc.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ShelfEntryDoc {
    pub id: String,
    pub user_id: String,
    pub volume_id: String,
    pub shelf: String,
    #[serde(default)]
    pub bookmark_page: u32,
    pub total_pages: u32,
    pub added_at: i64,
    pub updated_at: i64,
}

impl TryFrom<ShelfEntryDoc> for ShelfEntryRecord {
    type Error = RemoteError;

    fn try_from(doc: ShelfEntryDoc) -> Result<Self, Self::Error> {
        let shelf = ShelfKind::try_from(doc.shelf.as_str())
            .map_err(|()| RemoteError::malformed(format!("unknown shelf `{}`", doc.shelf)))?;
        Ok(ShelfEntryRecord {
            id: parse_id("id", &doc.id)?,
            user_id: parse_id("user_id", &doc.user_id)?,
            volume_id: doc.volume_id,
            shelf,
            bookmark_page: doc.bookmark_page,
            total_pages: doc.total_pages,
            added_at: parse_time("added_at", doc.added_at)?,
            updated_at: parse_time("updated_at", doc.updated_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FollowEdgeDoc {
    pub follower_id: String,
    pub followee_id: String,
    pub followee_handle: String,
    #[serde(default)]
    pub followee_avatar_path: Option<String>,
    pub created_at: i64,
}

impl TryFrom<FollowEdgeDoc> for FollowEdgeRecord {
    type Error = RemoteError;

    fn try_from(doc: FollowEdgeDoc) -> Result<Self, Self::Error> {
        Ok(FollowEdgeRecord {
            follower_id: parse_id("follower_id", &doc.follower_id)?,
            followee_id: parse_id("followee_id", &doc.followee_id)?,
            followee_handle: doc.followee_handle,
            followee_avatar_path: doc.followee_avatar_path,
            created_at: parse_time("created_at", doc.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationDoc {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: String,
    pub actor_handle: String,
    pub kind: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: i64,
}

impl TryFrom<NotificationDoc> for NotificationRecord {
    type Error = RemoteError;

    fn try_from(doc: NotificationDoc) -> Result<Self, Self::Error> {
        let kind = NotificationKind::try_from(doc.kind.as_str())
            .map_err(|()| RemoteError::malformed(format!("unknown notification kind `{}`", doc.kind)))?;
        let post_id = match doc.post_id {
            Some(raw) => Some(parse_id("post_id", &raw)?),
            None => None,
        };
        Ok(NotificationRecord {
            id: parse_id("id", &doc.id)?,
            recipient_id: parse_id("recipient_id", &doc.recipient_id)?,
            actor_id: parse_id("actor_id", &doc.actor_id)?,
            actor_handle: doc.actor_handle,
            kind,
            post_id,
            read: doc.read,
            created_at: parse_time("created_at", doc.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadingSessionDoc {
    pub id: String,
    pub user_id: String,
    pub volume_id: String,
    pub pages_read: u32,
    pub ended_at: i64,
}

impl TryFrom<ReadingSessionDoc> for ReadingSessionRecord {
    type Error = RemoteError;

    fn try_from(doc: ReadingSessionDoc) -> Result<Self, Self::Error> {
        Ok(ReadingSessionRecord {
            id: parse_id("id", &doc.id)?,
            user_id: parse_id("user_id", &doc.user_id)?,
            volume_id: doc.volume_id,
            pages_read: doc.pages_read,
            ended_at: parse_time("ended_at", doc.ended_at)?,
        })
    }
}

/// Translate a batch of documents, failing on the first malformed one.
pub(super) fn collect_records<D, R>(docs: Vec<D>) -> Result<Vec<R>, RemoteError>
where
    R: TryFrom<D, Error = RemoteError>,
{
    docs.into_iter().map(R::try_from).collect()
}
