//! Reading-log queries, sitting capture, and the weekly chart series.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::{CacheCoordinator, Cacheable, QueryKey};
use crate::domain::entities::{ReadingSessionRecord, ShelfEntryRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::reading::{ProgressSegments, WeekBucket, progress_segments, weekly_totals};

use super::error::AppError;
use super::session::SessionHandle;
use super::sources::{LogSessionParams, ReadingSource, ShelvesSource};

/// Outcome of logging one sitting.
#[derive(Debug, Clone)]
pub struct LoggedSitting {
    pub session: ReadingSessionRecord,
    pub entry: ShelfEntryRecord,
    /// Progress-bar split for the sitting that was just captured.
    pub segments: ProgressSegments,
}

pub struct ReadingService {
    cache: Arc<CacheCoordinator>,
    reading: Arc<dyn ReadingSource>,
    shelves: Arc<dyn ShelvesSource>,
    session: Arc<SessionHandle>,
}

impl ReadingService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        reading: Arc<dyn ReadingSource>,
        shelves: Arc<dyn ShelvesSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            reading,
            shelves,
            session,
        }
    }

    /// A user's reading sessions, oldest first, cached.
    pub async fn sessions(&self, user_id: Uuid) -> Result<Vec<ReadingSessionRecord>, AppError> {
        let source = Arc::clone(&self.reading);
        Ok(self
            .cache
            .read_through(QueryKey::ReadingSessions(user_id), async move {
                source.fetch_sessions(user_id).await
            })
            .await?)
    }

    /// Pages read per week, for the profile chart.
    ///
    /// Weeks start on Sunday in the user's profile timezone; UTC when the
    /// profile has none or is not cached.
    pub async fn weekly_chart(&self, user_id: Uuid) -> Result<Vec<WeekBucket>, AppError> {
        let sessions = self.sessions(user_id).await?;
        let tz = self
            .cache
            .peek::<UserRecord>(&QueryKey::User(user_id))
            .and_then(|user| user.timezone)
            .unwrap_or(chrono_tz::Tz::UTC);

        let points: Vec<(i64, u32)> = sessions
            .iter()
            .map(|s| (s.ended_at.unix_timestamp(), s.pages_read))
            .collect();
        Ok(weekly_totals(&points, tz)?)
    }

    /// Capture a sitting: append a session and advance the entry's bookmark.
    ///
    /// Both the session list and the shelf entry are updated optimistically;
    /// if either backend write fails, all of it rolls back.
    pub async fn log_sitting(
        &self,
        entry_id: Uuid,
        new_bookmark: u32,
    ) -> Result<LoggedSitting, AppError> {
        let viewer = self.session.user_id().ok_or(AppError::SignedOut)?;

        // The sitting is derived from the entry's current state, so make
        // sure the shelves are loaded before predicting anything.
        let shelves_source = Arc::clone(&self.shelves);
        let entries = self
            .cache
            .read_through(QueryKey::Bookshelves(viewer), async move {
                shelves_source.fetch_shelves(viewer).await
            })
            .await?;
        let entry = entries
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or(DomainError::not_found("shelf entry"))?
            .clone();

        let segments = progress_segments(entry.bookmark_page, new_bookmark, entry.total_pages)?;
        let pages_read = new_bookmark - entry.bookmark_page;
        let now = OffsetDateTime::now_utc();

        let predicted_session = ReadingSessionRecord {
            id: Uuid::new_v4(),
            user_id: viewer,
            volume_id: entry.volume_id.clone(),
            pages_read,
            ended_at: now,
        };

        let mut writes = Vec::new();

        let sessions_key = QueryKey::ReadingSessions(viewer);
        if let Some(mut sessions) = self.cache.peek::<Vec<ReadingSessionRecord>>(&sessions_key) {
            sessions.push(predicted_session.clone());
            writes.push((sessions_key, sessions.into_cached()));
        }

        let shelves_key = QueryKey::Bookshelves(viewer);
        if let Some(mut entries) = self.cache.peek::<Vec<ShelfEntryRecord>>(&shelves_key) {
            for slot in entries.iter_mut().filter(|e| e.id == entry_id) {
                slot.bookmark_page = new_bookmark;
                slot.updated_at = now;
            }
            writes.push((shelves_key, entries.into_cached()));
        }
        let shelf_key = QueryKey::Shelf {
            user_id: viewer,
            kind: entry.shelf,
        };
        if let Some(mut shelf) = self.cache.peek::<Vec<ShelfEntryRecord>>(&shelf_key) {
            let mut touched = false;
            for slot in shelf.iter_mut().filter(|e| e.id == entry_id) {
                slot.bookmark_page = new_bookmark;
                slot.updated_at = now;
                touched = true;
            }
            if touched {
                writes.push((shelf_key, shelf.into_cached()));
            }
        }

        let reading = Arc::clone(&self.reading);
        let shelves = Arc::clone(&self.shelves);
        let params = LogSessionParams {
            user_id: viewer,
            volume_id: entry.volume_id.clone(),
            pages_read,
            ended_at: now,
        };
        let (session, updated_entry) = self
            .cache
            .mutate(writes, async move {
                let session = reading.log_session(params).await?;
                let updated = shelves.set_bookmark(entry_id, new_bookmark).await?;
                Ok((session, updated))
            })
            .await?;

        // Swap the predicted session for the stored one.
        if let Some(mut sessions) = self
            .cache
            .peek::<Vec<ReadingSessionRecord>>(&QueryKey::ReadingSessions(viewer))
        {
            for slot in sessions
                .iter_mut()
                .filter(|s| s.id == predicted_session.id)
            {
                *slot = session.clone();
            }
            self.cache
                .write_confirmed(QueryKey::ReadingSessions(viewer), sessions);
        }

        Ok(LoggedSitting {
            session,
            entry: updated_entry,
            segments,
        })
    }
}
