//! Notification queries and read-state mutations.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{CacheCoordinator, Cacheable, QueryKey};
use crate::domain::entities::NotificationRecord;

use super::error::AppError;
use super::session::SessionHandle;
use super::sources::NotificationsSource;

pub struct NotificationsService {
    cache: Arc<CacheCoordinator>,
    notifications: Arc<dyn NotificationsSource>,
    session: Arc<SessionHandle>,
}

impl NotificationsService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        notifications: Arc<dyn NotificationsSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            notifications,
            session,
        }
    }

    /// The signed-in user's notifications, newest first, cached.
    pub async fn list(&self) -> Result<Vec<NotificationRecord>, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        let source = Arc::clone(&self.notifications);
        Ok(self
            .cache
            .read_through(QueryKey::Notifications(viewer), async move {
                source.fetch_notifications(viewer).await
            })
            .await?)
    }

    /// Number of unread notifications, for the tab badge.
    pub async fn unread_count(&self) -> Result<usize, AppError> {
        let list = self.list().await?;
        Ok(list.iter().filter(|n| !n.read).count())
    }

    /// Mark one notification as read.
    pub async fn mark_read(&self, id: Uuid) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();
        let key = QueryKey::Notifications(viewer);
        if let Some(mut list) = self.cache.peek::<Vec<NotificationRecord>>(&key) {
            let mut touched = false;
            for item in list.iter_mut().filter(|n| n.id == id && !n.read) {
                item.read = true;
                touched = true;
            }
            if touched {
                writes.push((key, list.into_cached()));
            }
        }

        let source = Arc::clone(&self.notifications);
        self.cache
            .mutate(writes, async move { source.mark_read(id).await })
            .await?;
        Ok(())
    }

    /// Mark every notification as read.
    pub async fn mark_all_read(&self) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();
        let key = QueryKey::Notifications(viewer);
        if let Some(mut list) = self.cache.peek::<Vec<NotificationRecord>>(&key) {
            if list.iter().any(|n| !n.read) {
                for item in list.iter_mut() {
                    item.read = true;
                }
                writes.push((key, list.into_cached()));
            }
        }

        let source = Arc::clone(&self.notifications);
        self.cache
            .mutate(writes, async move { source.mark_all_read(viewer).await })
            .await?;
        Ok(())
    }
}
