//! Book-metadata queries against the public volumes API.

use std::sync::Arc;

use crate::cache::{CacheCoordinator, QueryKey};
use crate::domain::entities::{BookSummary, BookVolumeRecord};
use crate::domain::error::DomainError;

use super::error::AppError;
use super::sources::BooksSource;

pub struct BooksService {
    cache: Arc<CacheCoordinator>,
    books: Arc<dyn BooksSource>,
}

impl BooksService {
    pub fn new(cache: Arc<CacheCoordinator>, books: Arc<dyn BooksSource>) -> Self {
        Self { cache, books }
    }

    /// Free-text volume search, cached per normalized query.
    pub async fn search(&self, query: &str) -> Result<Vec<BookSummary>, AppError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("search query must not be empty").into());
        }

        let source = Arc::clone(&self.books);
        let owned = trimmed.to_string();
        Ok(self
            .cache
            .read_through(QueryKey::book_search(trimmed), async move {
                source.search(&owned).await
            })
            .await?)
    }

    /// Full volume metadata by id, cached.
    pub async fn volume(&self, volume_id: &str) -> Result<BookVolumeRecord, AppError> {
        let source = Arc::clone(&self.books);
        let owned = volume_id.to_string();
        Ok(self
            .cache
            .read_through(QueryKey::BookVolume(volume_id.to_string()), async move {
                source.volume(&owned).await
            })
            .await?)
    }
}
