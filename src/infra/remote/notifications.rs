use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::application::sources::NotificationsSource;
use crate::domain::entities::NotificationRecord;
use crate::infra::error::RemoteError;

use super::BackendCollections;
use super::documents::{SortOrder, eq};
use super::types::{NotificationDoc, collect_records};

const COLLECTION: &str = "notifications";
const PAGE_LIMIT: u32 = 100;

#[async_trait]
impl NotificationsSource for BackendCollections {
    async fn fetch_notifications(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, RemoteError> {
        let docs: Vec<NotificationDoc> = self
            .docs
            .query(
                COLLECTION,
                &[eq("recipient_id", recipient_id.to_string())],
                Some(("created_at", SortOrder::Descending)),
                Some(PAGE_LIMIT),
            )
            .await?;
        collect_records(docs)
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), RemoteError> {
        self.docs
            .patch_unit(COLLECTION, &id.to_string(), json!({ "read": true }))
            .await
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<(), RemoteError> {
        self.docs
            .action_unit(
                COLLECTION,
                "markAllRead",
                json!({ "recipient_id": recipient_id.to_string() }),
            )
            .await
    }
}
