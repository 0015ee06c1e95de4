//! Bookshelf queries and optimistic shelf mutations.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::{CacheCoordinator, Cacheable, QueryKey};
use crate::domain::entities::{BookVolumeRecord, ShelfEntryRecord};
use crate::domain::error::DomainError;
use crate::domain::types::ShelfKind;

use super::error::AppError;
use super::session::SessionHandle;
use super::sources::{AddShelfEntryParams, ShelvesSource};

pub struct ShelvesService {
    cache: Arc<CacheCoordinator>,
    shelves: Arc<dyn ShelvesSource>,
    session: Arc<SessionHandle>,
}

impl ShelvesService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        shelves: Arc<dyn ShelvesSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            shelves,
            session,
        }
    }

    /// Every shelf entry for a user, cached.
    pub async fn shelves(&self, user_id: Uuid) -> Result<Vec<ShelfEntryRecord>, AppError> {
        let source = Arc::clone(&self.shelves);
        Ok(self
            .cache
            .read_through(QueryKey::Bookshelves(user_id), async move {
                source.fetch_shelves(user_id).await
            })
            .await?)
    }

    /// One shelf of a user, cached independently of the full list.
    pub async fn shelf(
        &self,
        user_id: Uuid,
        kind: ShelfKind,
    ) -> Result<Vec<ShelfEntryRecord>, AppError> {
        let source = Arc::clone(&self.shelves);
        Ok(self
            .cache
            .read_through(QueryKey::Shelf { user_id, kind }, async move {
                source.fetch_shelf(user_id, kind).await
            })
            .await?)
    }

    /// Put a book on one of the signed-in user's shelves.
    ///
    /// A predicted entry appears in the cached lists immediately; once the
    /// backend assigns the real record it replaces the prediction.
    pub async fn add_book(
        &self,
        volume: &BookVolumeRecord,
        kind: ShelfKind,
    ) -> Result<ShelfEntryRecord, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let now = OffsetDateTime::now_utc();
        let predicted = ShelfEntryRecord {
            id: Uuid::new_v4(),
            user_id: viewer,
            volume_id: volume.volume_id.clone(),
            shelf: kind,
            bookmark_page: 0,
            total_pages: volume.page_count.unwrap_or(0),
            added_at: now,
            updated_at: now,
        };

        let mut writes = Vec::new();
        for key in [
            QueryKey::Bookshelves(viewer),
            QueryKey::Shelf {
                user_id: viewer,
                kind,
            },
        ] {
            if let Some(mut entries) = self.cache.peek::<Vec<ShelfEntryRecord>>(&key) {
                if entries.iter().any(|e| e.volume_id == predicted.volume_id) {
                    return Err(
                        DomainError::validation("this book is already on a shelf").into(),
                    );
                }
                entries.insert(0, predicted.clone());
                writes.push((key, entries.into_cached()));
            }
        }

        let source = Arc::clone(&self.shelves);
        let params = AddShelfEntryParams {
            user_id: viewer,
            volume_id: predicted.volume_id.clone(),
            shelf: kind,
            total_pages: predicted.total_pages,
        };
        let record = self
            .cache
            .mutate(writes, async move { source.add_entry(params).await })
            .await?;

        self.replace_in_cached_lists(viewer, predicted.id, &record);
        Ok(record)
    }

    /// Move an entry to another shelf.
    pub async fn move_book(&self, entry_id: Uuid, to: ShelfKind) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();
        let mut from_kind = None;

        let all_key = QueryKey::Bookshelves(viewer);
        if let Some(mut entries) = self.cache.peek::<Vec<ShelfEntryRecord>>(&all_key) {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
                from_kind = Some(entry.shelf);
                entry.shelf = to;
                entry.updated_at = OffsetDateTime::now_utc();
                let moved = entry.clone();
                writes.push((all_key, entries.into_cached()));

                if let Some(from) = from_kind.filter(|from| *from != to) {
                    let from_key = QueryKey::Shelf {
                        user_id: viewer,
                        kind: from,
                    };
                    if let Some(mut shelf) = self.cache.peek::<Vec<ShelfEntryRecord>>(&from_key) {
                        shelf.retain(|e| e.id != entry_id);
                        writes.push((from_key, shelf.into_cached()));
                    }
                    let to_key = QueryKey::Shelf {
                        user_id: viewer,
                        kind: to,
                    };
                    if let Some(mut shelf) = self.cache.peek::<Vec<ShelfEntryRecord>>(&to_key) {
                        shelf.insert(0, moved);
                        writes.push((to_key, shelf.into_cached()));
                    }
                }
            }
        }

        let source = Arc::clone(&self.shelves);
        let record = self
            .cache
            .mutate(writes, async move { source.move_entry(entry_id, to).await })
            .await?;
        self.replace_in_cached_lists(viewer, entry_id, &record);
        Ok(())
    }

    /// Take a book off its shelf.
    pub async fn remove_book(&self, entry_id: Uuid) -> Result<(), AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        let mut writes = Vec::new();
        for key in self.viewer_list_keys(viewer) {
            if let Some(entries) = self.cache.peek::<Vec<ShelfEntryRecord>>(&key) {
                if entries.iter().any(|e| e.id == entry_id) {
                    let remaining: Vec<ShelfEntryRecord> =
                        entries.into_iter().filter(|e| e.id != entry_id).collect();
                    writes.push((key, remaining.into_cached()));
                }
            }
        }

        let source = Arc::clone(&self.shelves);
        self.cache
            .mutate(writes, async move { source.remove_entry(entry_id).await })
            .await?;
        Ok(())
    }

    /// Move the bookmark of one entry forward.
    pub async fn set_bookmark(
        &self,
        entry_id: Uuid,
        bookmark_page: u32,
    ) -> Result<ShelfEntryRecord, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        if let Some(entries) = self
            .cache
            .peek::<Vec<ShelfEntryRecord>>(&QueryKey::Bookshelves(viewer))
        {
            if let Some(entry) = entries.iter().find(|e| e.id == entry_id) {
                if entry.total_pages > 0 && bookmark_page > entry.total_pages {
                    return Err(DomainError::validation(format!(
                        "bookmark {bookmark_page} is past the last page ({})",
                        entry.total_pages
                    ))
                    .into());
                }
            }
        }

        let mut writes = Vec::new();
        for key in self.viewer_list_keys(viewer) {
            if let Some(mut entries) = self.cache.peek::<Vec<ShelfEntryRecord>>(&key) {
                let mut touched = false;
                for entry in entries.iter_mut().filter(|e| e.id == entry_id) {
                    entry.bookmark_page = bookmark_page;
                    entry.updated_at = OffsetDateTime::now_utc();
                    touched = true;
                }
                if touched {
                    writes.push((key, entries.into_cached()));
                }
            }
        }

        let source = Arc::clone(&self.shelves);
        let record = self
            .cache
            .mutate(writes, async move {
                source.set_bookmark(entry_id, bookmark_page).await
            })
            .await?;
        self.replace_in_cached_lists(viewer, entry_id, &record);
        Ok(record)
    }

    fn viewer_list_keys(&self, viewer: Uuid) -> Vec<QueryKey> {
        let mut keys = vec![QueryKey::Bookshelves(viewer)];
        for kind in [
            ShelfKind::CurrentlyReading,
            ShelfKind::WantToRead,
            ShelfKind::Finished,
        ] {
            keys.push(QueryKey::Shelf {
                user_id: viewer,
                kind,
            });
        }
        keys
    }

    /// Swap a predicted or stale entry for the backend-confirmed record in
    /// every cached list that holds it.
    fn replace_in_cached_lists(&self, viewer: Uuid, old_id: Uuid, record: &ShelfEntryRecord) {
        for key in self.viewer_list_keys(viewer) {
            if let Some(mut entries) = self.cache.peek::<Vec<ShelfEntryRecord>>(&key) {
                let mut touched = false;
                for entry in entries
                    .iter_mut()
                    .filter(|e| e.id == old_id || e.id == record.id)
                {
                    *entry = record.clone();
                    touched = true;
                }
                if touched {
                    self.cache.write_confirmed(key, entries);
                }
            }
        }
    }
}
