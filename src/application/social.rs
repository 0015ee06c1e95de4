//! Follow graph queries and the follow/unfollow mutation.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::{CacheCoordinator, Cacheable, QueryKey};
use crate::domain::entities::{FollowEdgeRecord, UserRecord};
use crate::domain::error::DomainError;

use super::error::AppError;
use super::session::SessionHandle;
use super::sources::SocialSource;

pub struct SocialService {
    cache: Arc<CacheCoordinator>,
    social: Arc<dyn SocialSource>,
    session: Arc<SessionHandle>,
}

impl SocialService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        social: Arc<dyn SocialSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            social,
            session,
        }
    }

    /// Accounts following a user, cached.
    pub async fn followers(&self, user_id: Uuid) -> Result<Vec<FollowEdgeRecord>, AppError> {
        let source = Arc::clone(&self.social);
        Ok(self
            .cache
            .read_through(QueryKey::Followers(user_id), async move {
                source.fetch_followers(user_id).await
            })
            .await?)
    }

    /// Accounts a user follows, cached.
    pub async fn following(&self, user_id: Uuid) -> Result<Vec<FollowEdgeRecord>, AppError> {
        let source = Arc::clone(&self.social);
        Ok(self
            .cache
            .read_through(QueryKey::Following(user_id), async move {
                source.fetch_following(user_id).await
            })
            .await?)
    }

    /// Whether the signed-in user follows `user_id`, judged from the cached
    /// following list.
    pub async fn is_following(&self, user_id: Uuid) -> Result<bool, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        let edges = self.following(viewer).await?;
        Ok(edges.iter().any(|edge| edge.followee_id == user_id))
    }

    /// Follow another account.
    ///
    /// The edge and both follower counts update optimistically; everything
    /// rolls back if the backend rejects the follow.
    pub async fn follow(&self, followee_id: Uuid) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        if viewer == followee_id {
            return Err(DomainError::validation("you cannot follow yourself").into());
        }

        let mut writes = Vec::new();

        let following_key = QueryKey::Following(viewer);
        if let Some(mut edges) = self.cache.peek::<Vec<FollowEdgeRecord>>(&following_key) {
            if edges.iter().any(|edge| edge.followee_id == followee_id) {
                return Ok(());
            }
            let followee = self.cache.peek::<UserRecord>(&QueryKey::User(followee_id));
            edges.insert(
                0,
                FollowEdgeRecord {
                    follower_id: viewer,
                    followee_id,
                    followee_handle: followee
                        .as_ref()
                        .map(|user| user.handle.clone())
                        .unwrap_or_default(),
                    followee_avatar_path: followee.and_then(|user| user.avatar_path),
                    created_at: OffsetDateTime::now_utc(),
                },
            );
            writes.push((following_key, edges.into_cached()));
        }

        self.adjust_counts(&mut writes, viewer, followee_id, 1);

        let source = Arc::clone(&self.social);
        let edge = self
            .cache
            .mutate(writes, async move {
                source.follow(viewer, followee_id).await
            })
            .await?;

        // Replace the predicted edge with the stored one.
        let key = QueryKey::Following(viewer);
        if let Some(mut edges) = self.cache.peek::<Vec<FollowEdgeRecord>>(&key) {
            for slot in edges
                .iter_mut()
                .filter(|e| e.followee_id == edge.followee_id)
            {
                *slot = edge.clone();
            }
            self.cache.write_confirmed(key, edges);
        }
        Ok(())
    }

    /// Stop following an account.
    pub async fn unfollow(&self, followee_id: Uuid) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();

        let following_key = QueryKey::Following(viewer);
        if let Some(edges) = self.cache.peek::<Vec<FollowEdgeRecord>>(&following_key) {
            if edges.iter().any(|edge| edge.followee_id == followee_id) {
                let remaining: Vec<FollowEdgeRecord> = edges
                    .into_iter()
                    .filter(|edge| edge.followee_id != followee_id)
                    .collect();
                writes.push((following_key, remaining.into_cached()));
            }
        }

        self.adjust_counts(&mut writes, viewer, followee_id, -1);

        let source = Arc::clone(&self.social);
        self.cache
            .mutate(writes, async move {
                source.unfollow(viewer, followee_id).await
            })
            .await?;
        Ok(())
    }

    fn adjust_counts(
        &self,
        writes: &mut Vec<(QueryKey, crate::cache::CachedValue)>,
        viewer: Uuid,
        followee_id: Uuid,
        delta: i64,
    ) {
        let viewer_key = QueryKey::User(viewer);
        if let Some(mut user) = self.cache.peek::<UserRecord>(&viewer_key) {
            user.following_count = adjusted(user.following_count, delta);
            writes.push((viewer_key, user.into_cached()));
        }

        let followee_key = QueryKey::User(followee_id);
        if let Some(mut user) = self.cache.peek::<UserRecord>(&followee_key) {
            user.follower_count = adjusted(user.follower_count, delta);
            writes.push((followee_key, user.into_cached()));
        }
    }
}

fn adjusted(count: u64, delta: i64) -> u64 {
    if delta >= 0 {
        count.saturating_add(delta as u64)
    } else {
        count.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_adjustment_saturates() {
        assert_eq!(adjusted(0, -1), 0);
        assert_eq!(adjusted(3, -1), 2);
        assert_eq!(adjusted(3, 1), 4);
        assert_eq!(adjusted(u64::MAX, 1), u64::MAX);
    }
}
