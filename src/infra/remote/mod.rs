//! Remote adapters: fetcher/mutator implementations over the hosted backend,
//! the book-metadata API, blob storage, and the auth provider.

pub mod auth;
pub mod books;
mod client;
mod documents;
pub mod storage;
mod types;

mod notifications;
mod posts;
mod reading;
mod shelves;
mod social;
mod users;

pub use client::BackendClient;
pub use documents::{DocumentStore, Filter, FilterOp, SortOrder, eq};

/// Document-database adapters behind every collection-backed source trait.
///
/// One struct implements `UsersSource`, `PostsSource`, `ShelvesSource`,
/// `SocialSource`, `NotificationsSource`, and `ReadingSource`; the impls
/// live in per-collection modules.
#[derive(Clone)]
pub struct BackendCollections {
    docs: DocumentStore,
}

impl BackendCollections {
    pub fn new(client: BackendClient) -> Self {
        Self {
            docs: DocumentStore::new(client),
        }
    }
}
