use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::application::sources::{CreatePostParams, PostsSource};
use crate::domain::entities::PostRecord;
use crate::infra::error::RemoteError;

use super::BackendCollections;
use super::documents::{SortOrder, eq};
use super::types::{PostDoc, collect_records};

const COLLECTION: &str = "posts";
const LIKES_COLLECTION: &str = "post_likes";
const FEED_LIMIT: u32 = 50;

fn like_id(post_id: Uuid, viewer_id: Uuid) -> String {
    format!("{post_id}_{viewer_id}")
}

#[async_trait]
impl PostsSource for BackendCollections {
    async fn fetch_feed(&self, viewer_id: Uuid) -> Result<Vec<PostRecord>, RemoteError> {
        // `feed_of` is a backend-computed filter: posts authored by accounts
        // the given user follows, plus their own.
        let docs: Vec<PostDoc> = self
            .docs
            .query(
                COLLECTION,
                &[eq("feed_of", viewer_id.to_string())],
                Some(("created_at", SortOrder::Descending)),
                Some(FEED_LIMIT),
            )
            .await?;
        collect_records(docs)
    }

    async fn fetch_user_posts(
        &self,
        author_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<PostRecord>, RemoteError> {
        let docs: Vec<PostDoc> = self
            .docs
            .query(
                COLLECTION,
                &[
                    eq("author_id", author_id.to_string()),
                    eq("viewer_id", viewer_id.to_string()),
                ],
                Some(("created_at", SortOrder::Descending)),
                Some(FEED_LIMIT),
            )
            .await?;
        collect_records(docs)
    }

    async fn fetch_post(&self, id: Uuid, viewer_id: Uuid) -> Result<PostRecord, RemoteError> {
        let docs: Vec<PostDoc> = self
            .docs
            .query(
                COLLECTION,
                &[
                    eq("id", id.to_string()),
                    eq("viewer_id", viewer_id.to_string()),
                ],
                None,
                Some(1),
            )
            .await?;
        let doc = docs.into_iter().next().ok_or(RemoteError::NotFound)?;
        PostRecord::try_from(doc)
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RemoteError> {
        let doc: PostDoc = self
            .docs
            .create(
                COLLECTION,
                json!({
                    "id": params.post_id.to_string(),
                    "author_id": params.author_id.to_string(),
                    "author_handle": params.author_handle,
                    "body": params.body,
                    "volume_id": params.volume_id,
                    "image_paths": params.image_paths,
                    "visibility": params.visibility.as_str(),
                }),
            )
            .await?;
        PostRecord::try_from(doc)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RemoteError> {
        self.docs.delete(COLLECTION, &id.to_string()).await
    }

    async fn set_like(
        &self,
        post_id: Uuid,
        viewer_id: Uuid,
        liked: bool,
    ) -> Result<(), RemoteError> {
        if liked {
            self.docs
                .action_unit(
                    LIKES_COLLECTION,
                    "put",
                    json!({
                        "id": like_id(post_id, viewer_id),
                        "post_id": post_id.to_string(),
                        "user_id": viewer_id.to_string(),
                    }),
                )
                .await
        } else {
            self.docs
                .delete(LIKES_COLLECTION, &like_id(post_id, viewer_id))
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_ids_are_stable() {
        let post = Uuid::nil();
        let viewer = Uuid::nil();
        assert_eq!(like_id(post, viewer), like_id(post, viewer));
    }
}
