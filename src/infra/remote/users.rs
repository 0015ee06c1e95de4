use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::application::sources::{CreateProfileParams, UpdateProfileParams, UsersSource};
use crate::domain::entities::UserRecord;
use crate::infra::error::RemoteError;

use super::BackendCollections;
use super::types::UserDoc;

const COLLECTION: &str = "users";

#[async_trait]
impl UsersSource for BackendCollections {
    async fn fetch_user(&self, id: Uuid) -> Result<UserRecord, RemoteError> {
        let doc: UserDoc = self.docs.get(COLLECTION, &id.to_string()).await?;
        UserRecord::try_from(doc)
    }

    async fn create_profile(&self, params: CreateProfileParams) -> Result<UserRecord, RemoteError> {
        let doc: UserDoc = self
            .docs
            .create(
                COLLECTION,
                json!({
                    "id": params.user_id.to_string(),
                    "handle": params.handle,
                    "display_name": params.display_name,
                    "timezone": params.timezone.map(|tz| tz.name().to_string()),
                }),
            )
            .await?;
        UserRecord::try_from(doc)
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RemoteError> {
        // Absent avatar_path leaves the stored avatar untouched; a patch
        // with an explicit null would clear it.
        let mut fields = serde_json::Map::new();
        fields.insert("display_name".to_string(), json!(params.display_name));
        fields.insert("bio".to_string(), json!(params.bio));
        if let Some(path) = params.avatar_path {
            fields.insert("avatar_path".to_string(), json!(path));
        }

        let doc: UserDoc = self
            .docs
            .patch(
                COLLECTION,
                &params.user_id.to_string(),
                serde_json::Value::Object(fields),
            )
            .await?;
        UserRecord::try_from(doc)
    }
}
