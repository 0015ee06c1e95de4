use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::application::sources::{LogSessionParams, ReadingSource};
use crate::domain::entities::ReadingSessionRecord;
use crate::infra::error::RemoteError;

use super::BackendCollections;
use super::documents::{SortOrder, eq};
use super::types::{ReadingSessionDoc, collect_records};

const COLLECTION: &str = "reading_sessions";

#[async_trait]
impl ReadingSource for BackendCollections {
    async fn fetch_sessions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ReadingSessionRecord>, RemoteError> {
        let docs: Vec<ReadingSessionDoc> = self
            .docs
            .query(
                COLLECTION,
                &[eq("user_id", user_id.to_string())],
                Some(("ended_at", SortOrder::Ascending)),
                None,
            )
            .await?;
        collect_records(docs)
    }

    async fn log_session(
        &self,
        params: LogSessionParams,
    ) -> Result<ReadingSessionRecord, RemoteError> {
        let doc: ReadingSessionDoc = self
            .docs
            .create(
                COLLECTION,
                json!({
                    "user_id": params.user_id.to_string(),
                    "volume_id": params.volume_id,
                    "pages_read": params.pages_read,
                    "ended_at": params.ended_at.unix_timestamp(),
                }),
            )
            .await?;
        ReadingSessionRecord::try_from(doc)
    }
}
