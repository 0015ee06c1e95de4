//! Profile queries and mutations.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::cache::{CacheCoordinator, QueryKey};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::infra::remote::storage::content_type_for;

use super::error::AppError;
use super::session::SessionHandle;
use super::sources::{BlobKey, MediaSource, UpdateProfileParams, UsersSource};

const MAX_DISPLAY_NAME_LEN: usize = 64;
const MAX_BIO_LEN: usize = 400;

pub struct UsersService {
    cache: Arc<CacheCoordinator>,
    users: Arc<dyn UsersSource>,
    media: Arc<dyn MediaSource>,
    session: Arc<SessionHandle>,
}

impl UsersService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        users: Arc<dyn UsersSource>,
        media: Arc<dyn MediaSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            users,
            media,
            session,
        }
    }

    /// A user's profile, cached.
    pub async fn profile(&self, user_id: Uuid) -> Result<UserRecord, AppError> {
        let source = Arc::clone(&self.users);
        Ok(self
            .cache
            .read_through(QueryKey::User(user_id), async move {
                source.fetch_user(user_id).await
            })
            .await?)
    }

    /// Update the signed-in user's display name and bio.
    ///
    /// The profile entry is patched optimistically and rolled back if the
    /// backend rejects the write.
    pub async fn update_profile(
        &self,
        display_name: &str,
        bio: Option<String>,
    ) -> Result<UserRecord, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name must not be empty").into());
        }
        if display_name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(DomainError::validation(format!(
                "display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
            ))
            .into());
        }
        if bio.as_deref().is_some_and(|b| b.len() > MAX_BIO_LEN) {
            return Err(DomainError::validation(format!(
                "bio must be at most {MAX_BIO_LEN} characters"
            ))
            .into());
        }

        let key = QueryKey::User(viewer);
        let mut ctx = self.cache.begin();
        if let Some(mut user) = self.cache.peek::<UserRecord>(&key) {
            user.display_name = display_name.to_string();
            user.bio = bio.clone();
            self.cache.apply(&mut ctx, key.clone(), user);
        }

        let params = UpdateProfileParams {
            user_id: viewer,
            display_name: display_name.to_string(),
            bio,
            avatar_path: None,
        };
        match self.users.update_profile(params).await {
            Ok(record) => {
                self.cache.settle(ctx);
                self.cache.write_confirmed(key, record.clone());
                Ok(record)
            }
            Err(err) => {
                self.cache.rollback(ctx);
                Err(err.into())
            }
        }
    }

    /// Upload a new avatar and point the profile at it.
    pub async fn update_avatar(
        &self,
        filename: &str,
        payload: Bytes,
    ) -> Result<UserRecord, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let stored = self
            .media
            .store_image(
                &BlobKey::avatar(viewer),
                payload,
                &content_type_for(filename),
            )
            .await?;

        let current = self.profile(viewer).await?;
        let params = UpdateProfileParams {
            user_id: viewer,
            display_name: current.display_name,
            bio: current.bio,
            avatar_path: Some(stored.path),
        };
        let record = self.users.update_profile(params).await?;
        self.cache
            .write_confirmed(QueryKey::User(viewer), record.clone());
        Ok(record)
    }
}
