//! Wired data layer: one constructor from settings to ready services.

use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::books::BooksService;
use crate::application::error::AppError;
use crate::application::notifications::NotificationsService;
use crate::application::posts::PostsService;
use crate::application::reading::ReadingService;
use crate::application::session::SessionHandle;
use crate::application::shelves::ShelvesService;
use crate::application::social::SocialService;
use crate::application::users::UsersService;
use crate::cache::{CacheCoordinator, CacheConfig};
use crate::config::Settings;
use crate::infra::remote::auth::AuthClient;
use crate::infra::remote::books::BooksClient;
use crate::infra::remote::storage::BlobStorage;
use crate::infra::remote::{BackendClient, BackendCollections};

/// The assembled client data layer.
///
/// One of these per app process: it owns the session, the cache
/// coordinator, and a service per screen domain. The view layer subscribes
/// to `cache` events and `session` changes and calls the services.
pub struct DataLayer {
    pub session: Arc<SessionHandle>,
    pub cache: Arc<CacheCoordinator>,
    pub auth: AuthService,
    pub users: UsersService,
    pub posts: PostsService,
    pub shelves: ShelvesService,
    pub social: SocialService,
    pub notifications: NotificationsService,
    pub reading: ReadingService,
    pub books: BooksService,
}

impl DataLayer {
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let session = Arc::new(SessionHandle::new());
        let cache = Arc::new(CacheCoordinator::new(&CacheConfig::from(&settings.cache)));

        let backend = BackendClient::new(
            &settings.backend.base_url,
            settings.backend.api_key.clone(),
            Arc::clone(&session),
        )?;
        let collections = Arc::new(BackendCollections::new(backend));
        let media = Arc::new(BlobStorage::new(
            &settings.storage.base_url,
            settings.backend.api_key.clone(),
            Arc::clone(&session),
        )?);
        let books_client = Arc::new(BooksClient::new(&settings.books.base_url)?);
        let auth_client = Arc::new(AuthClient::new(
            &settings.auth.base_url,
            settings.backend.api_key.clone(),
        )?);

        Ok(Self {
            auth: AuthService::new(
                Arc::clone(&cache),
                auth_client,
                collections.clone(),
                Arc::clone(&session),
            ),
            users: UsersService::new(
                Arc::clone(&cache),
                collections.clone(),
                media.clone(),
                Arc::clone(&session),
            ),
            posts: PostsService::new(
                Arc::clone(&cache),
                collections.clone(),
                media.clone(),
                Arc::clone(&session),
            ),
            shelves: ShelvesService::new(
                Arc::clone(&cache),
                collections.clone(),
                Arc::clone(&session),
            ),
            social: SocialService::new(
                Arc::clone(&cache),
                collections.clone(),
                Arc::clone(&session),
            ),
            notifications: NotificationsService::new(
                Arc::clone(&cache),
                collections.clone(),
                Arc::clone(&session),
            ),
            reading: ReadingService::new(
                Arc::clone(&cache),
                collections.clone(),
                collections.clone(),
                Arc::clone(&session),
            ),
            books: BooksService::new(Arc::clone(&cache), books_client),
            session,
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_from_default_settings() {
        let settings = Settings::default();
        let layer = DataLayer::from_settings(&settings).expect("wired data layer");
        assert!(layer.session.current().is_none());
        assert!(layer.cache.store().is_empty());
    }
}
