//! Feed and post queries, post creation, and the like/unlike mutation.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::cache::{CacheCoordinator, Cacheable, QueryKey};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::types::PostVisibility;
use crate::infra::remote::storage::content_type_for;

use super::error::AppError;
use super::session::SessionHandle;
use super::sources::{BlobKey, CreatePostParams, MediaSource, PostsSource};

const MAX_POST_LEN: usize = 2000;
const MAX_POST_IMAGES: usize = 4;

/// Input for a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub body: String,
    pub volume_id: Option<String>,
    pub images: Vec<NewPostImage>,
    pub visibility: PostVisibility,
}

#[derive(Debug, Clone)]
pub struct NewPostImage {
    pub filename: String,
    pub payload: Bytes,
}

pub struct PostsService {
    cache: Arc<CacheCoordinator>,
    posts: Arc<dyn PostsSource>,
    media: Arc<dyn MediaSource>,
    session: Arc<SessionHandle>,
}

impl PostsService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        posts: Arc<dyn PostsSource>,
        media: Arc<dyn MediaSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            posts,
            media,
            session,
        }
    }

    /// The signed-in user's home feed, cached.
    pub async fn feed(&self) -> Result<Vec<PostRecord>, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        let source = Arc::clone(&self.posts);
        Ok(self
            .cache
            .read_through(QueryKey::Feed(viewer), async move {
                source.fetch_feed(viewer).await
            })
            .await?)
    }

    /// Posts authored by one user, cached.
    pub async fn user_posts(&self, author_id: Uuid) -> Result<Vec<PostRecord>, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        let source = Arc::clone(&self.posts);
        Ok(self
            .cache
            .read_through(QueryKey::UserPosts(author_id), async move {
                source.fetch_user_posts(author_id, viewer).await
            })
            .await?)
    }

    /// A single post, cached. Not-found surfaces as the screen's fallback.
    pub async fn post(&self, id: Uuid) -> Result<PostRecord, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;
        let source = Arc::clone(&self.posts);
        Ok(self
            .cache
            .read_through(QueryKey::Post(id), async move {
                source.fetch_post(id, viewer).await
            })
            .await?)
    }

    /// Publish a post, uploading its images first.
    pub async fn create_post(&self, input: NewPost) -> Result<PostRecord, AppError> {
        let session = self.session.current().ok_or(AppError::SignedOut)?;
        let viewer = session.user_id;
        let body = input.body.trim();
        if body.is_empty() {
            return Err(DomainError::validation("post body must not be empty").into());
        }
        if body.len() > MAX_POST_LEN {
            return Err(DomainError::validation(format!(
                "post body must be at most {MAX_POST_LEN} characters"
            ))
            .into());
        }
        if input.images.len() > MAX_POST_IMAGES {
            return Err(DomainError::validation(format!(
                "a post can carry at most {MAX_POST_IMAGES} images"
            ))
            .into());
        }

        let post_id = Uuid::new_v4();
        let mut image_paths = Vec::with_capacity(input.images.len());
        for (index, image) in input.images.iter().enumerate() {
            let stored = self
                .media
                .store_image(
                    &BlobKey::post_image(post_id, index as u32),
                    image.payload.clone(),
                    &content_type_for(&image.filename),
                )
                .await?;
            image_paths.push(stored.path);
        }

        let author_handle = self
            .cache
            .peek::<crate::domain::entities::UserRecord>(&QueryKey::User(viewer))
            .map(|user| user.handle)
            .unwrap_or_default();

        let record = self
            .posts
            .create_post(CreatePostParams {
                post_id,
                author_id: viewer,
                author_handle,
                body: body.to_string(),
                volume_id: input.volume_id,
                image_paths,
                visibility: input.visibility,
            })
            .await?;

        self.cache
            .write_confirmed(QueryKey::Post(record.id), record.clone());
        self.prepend_to_cached_list(QueryKey::Feed(viewer), &record);
        self.prepend_to_cached_list(QueryKey::UserPosts(viewer), &record);
        Ok(record)
    }

    /// Delete the signed-in user's post.
    ///
    /// The post is removed from cached lists optimistically; the entries
    /// come back on rollback if the backend refuses.
    pub async fn delete_post(&self, id: Uuid) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();
        for key in [QueryKey::Feed(viewer), QueryKey::UserPosts(viewer)] {
            if let Some(posts) = self.cache.peek::<Vec<PostRecord>>(&key) {
                if posts.iter().any(|post| post.id == id) {
                    let remaining: Vec<PostRecord> =
                        posts.into_iter().filter(|post| post.id != id).collect();
                    writes.push((key, remaining.into_cached()));
                }
            }
        }

        let source = Arc::clone(&self.posts);
        self.cache
            .mutate(writes, async move { source.delete_post(id).await })
            .await?;
        self.cache.invalidate(&QueryKey::Post(id));
        Ok(())
    }

    /// Like or unlike a post.
    ///
    /// The post entry and any cached list containing it are updated
    /// immediately; a backend failure rolls every touched entry back.
    pub async fn set_like(&self, post_id: Uuid, liked: bool) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();

        let post_key = QueryKey::Post(post_id);
        if let Some(mut post) = self.cache.peek::<PostRecord>(&post_key) {
            if post.liked_by_viewer != liked {
                apply_like(&mut post, liked);
                writes.push((post_key, post.into_cached()));
            }
        }

        for key in [QueryKey::Feed(viewer), QueryKey::UserPosts(viewer)] {
            if let Some(mut posts) = self.cache.peek::<Vec<PostRecord>>(&key) {
                let mut touched = false;
                for post in posts.iter_mut().filter(|post| post.id == post_id) {
                    if post.liked_by_viewer != liked {
                        apply_like(post, liked);
                        touched = true;
                    }
                }
                if touched {
                    writes.push((key, posts.into_cached()));
                }
            }
        }

        let source = Arc::clone(&self.posts);
        self.cache
            .mutate(writes, async move {
                source.set_like(post_id, viewer, liked).await
            })
            .await?;
        Ok(())
    }

    fn prepend_to_cached_list(&self, key: QueryKey, record: &PostRecord) {
        if let Some(mut posts) = self.cache.peek::<Vec<PostRecord>>(&key) {
            posts.insert(0, record.clone());
            self.cache.write_confirmed(key, posts);
        }
    }
}

fn apply_like(post: &mut PostRecord, liked: bool) {
    if liked {
        post.like_count += 1;
    } else {
        post.like_count = post.like_count.saturating_sub(1);
    }
    post.liked_by_viewer = liked;
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn sample_post() -> PostRecord {
        PostRecord {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author_handle: "reader".to_string(),
            body: "Finished part one.".to_string(),
            volume_id: None,
            image_paths: Vec::new(),
            visibility: PostVisibility::Public,
            like_count: 2,
            liked_by_viewer: false,
            comment_count: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn like_adjusts_count_and_flag() {
        let mut post = sample_post();
        apply_like(&mut post, true);
        assert_eq!(post.like_count, 3);
        assert!(post.liked_by_viewer);

        apply_like(&mut post, false);
        assert_eq!(post.like_count, 2);
        assert!(!post.liked_by_viewer);
    }

    #[test]
    fn unlike_never_underflows() {
        let mut post = sample_post();
        post.like_count = 0;
        apply_like(&mut post, false);
        assert_eq!(post.like_count, 0);
    }
}
