//! Shared domain enumerations aligned with the backend's stored string values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShelfKind {
    CurrentlyReading,
    WantToRead,
    Finished,
}

impl ShelfKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShelfKind::CurrentlyReading => "currently_reading",
            ShelfKind::WantToRead => "want_to_read",
            ShelfKind::Finished => "finished",
        }
    }
}

impl TryFrom<&str> for ShelfKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "currently_reading" => Ok(ShelfKind::CurrentlyReading),
            "want_to_read" => Ok(ShelfKind::WantToRead),
            "finished" => Ok(ShelfKind::Finished),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Like,
    Comment,
    ShelfActivity,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::ShelfActivity => "shelf_activity",
        }
    }
}

impl TryFrom<&str> for NotificationKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "follow" => Ok(NotificationKind::Follow),
            "like" => Ok(NotificationKind::Like),
            "comment" => Ok(NotificationKind::Comment),
            "shelf_activity" => Ok(NotificationKind::ShelfActivity),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostVisibility {
    Public,
    FollowersOnly,
}

impl PostVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            PostVisibility::Public => "public",
            PostVisibility::FollowersOnly => "followers_only",
        }
    }
}

impl TryFrom<&str> for PostVisibility {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "public" => Ok(PostVisibility::Public),
            "followers_only" => Ok(PostVisibility::FollowersOnly),
            _ => Err(()),
        }
    }
}
