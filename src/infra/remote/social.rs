use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::application::sources::SocialSource;
use crate::domain::entities::FollowEdgeRecord;
use crate::infra::error::RemoteError;

use super::BackendCollections;
use super::documents::{SortOrder, eq};
use super::types::{FollowEdgeDoc, collect_records};

const COLLECTION: &str = "follows";

fn edge_id(follower_id: Uuid, followee_id: Uuid) -> String {
    format!("{follower_id}_{followee_id}")
}

#[async_trait]
impl SocialSource for BackendCollections {
    async fn fetch_followers(&self, user_id: Uuid) -> Result<Vec<FollowEdgeRecord>, RemoteError> {
        let docs: Vec<FollowEdgeDoc> = self
            .docs
            .query(
                COLLECTION,
                &[eq("followee_id", user_id.to_string())],
                Some(("created_at", SortOrder::Descending)),
                None,
            )
            .await?;
        collect_records(docs)
    }

    async fn fetch_following(&self, user_id: Uuid) -> Result<Vec<FollowEdgeRecord>, RemoteError> {
        let docs: Vec<FollowEdgeDoc> = self
            .docs
            .query(
                COLLECTION,
                &[eq("follower_id", user_id.to_string())],
                Some(("created_at", SortOrder::Descending)),
                None,
            )
            .await?;
        collect_records(docs)
    }

    async fn follow(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<FollowEdgeRecord, RemoteError> {
        let doc: FollowEdgeDoc = self
            .docs
            .action(
                COLLECTION,
                "put",
                json!({
                    "id": edge_id(follower_id, followee_id),
                    "follower_id": follower_id.to_string(),
                    "followee_id": followee_id.to_string(),
                }),
            )
            .await?;
        FollowEdgeRecord::try_from(doc)
    }

    async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<(), RemoteError> {
        self.docs
            .delete(COLLECTION, &edge_id(follower_id, followee_id))
            .await
    }
}
