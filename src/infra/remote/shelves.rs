use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::application::sources::{AddShelfEntryParams, ShelvesSource};
use crate::domain::entities::ShelfEntryRecord;
use crate::domain::types::ShelfKind;
use crate::infra::error::RemoteError;

use super::BackendCollections;
use super::documents::{SortOrder, eq};
use super::types::{ShelfEntryDoc, collect_records};

const COLLECTION: &str = "shelf_entries";

#[async_trait]
impl ShelvesSource for BackendCollections {
    async fn fetch_shelves(&self, user_id: Uuid) -> Result<Vec<ShelfEntryRecord>, RemoteError> {
        let docs: Vec<ShelfEntryDoc> = self
            .docs
            .query(
                COLLECTION,
                &[eq("user_id", user_id.to_string())],
                Some(("added_at", SortOrder::Descending)),
                None,
            )
            .await?;
        collect_records(docs)
    }

    async fn fetch_shelf(
        &self,
        user_id: Uuid,
        kind: ShelfKind,
    ) -> Result<Vec<ShelfEntryRecord>, RemoteError> {
        let docs: Vec<ShelfEntryDoc> = self
            .docs
            .query(
                COLLECTION,
                &[
                    eq("user_id", user_id.to_string()),
                    eq("shelf", kind.as_str()),
                ],
                Some(("added_at", SortOrder::Descending)),
                None,
            )
            .await?;
        collect_records(docs)
    }

    async fn add_entry(
        &self,
        params: AddShelfEntryParams,
    ) -> Result<ShelfEntryRecord, RemoteError> {
        let doc: ShelfEntryDoc = self
            .docs
            .create(
                COLLECTION,
                json!({
                    "user_id": params.user_id.to_string(),
                    "volume_id": params.volume_id,
                    "shelf": params.shelf.as_str(),
                    "total_pages": params.total_pages,
                }),
            )
            .await?;
        ShelfEntryRecord::try_from(doc)
    }

    async fn move_entry(
        &self,
        entry_id: Uuid,
        shelf: ShelfKind,
    ) -> Result<ShelfEntryRecord, RemoteError> {
        let doc: ShelfEntryDoc = self
            .docs
            .patch(
                COLLECTION,
                &entry_id.to_string(),
                json!({ "shelf": shelf.as_str() }),
            )
            .await?;
        ShelfEntryRecord::try_from(doc)
    }

    async fn set_bookmark(
        &self,
        entry_id: Uuid,
        bookmark_page: u32,
    ) -> Result<ShelfEntryRecord, RemoteError> {
        let doc: ShelfEntryDoc = self
            .docs
            .patch(
                COLLECTION,
                &entry_id.to_string(),
                json!({ "bookmark_page": bookmark_page }),
            )
            .await?;
        ShelfEntryRecord::try_from(doc)
    }

    async fn remove_entry(&self, entry_id: Uuid) -> Result<(), RemoteError> {
        self.docs.delete(COLLECTION, &entry_id.to_string()).await
    }
}
