//! Cache key definitions.
//!
//! Every server-state slice a screen can subscribe to is identified by one
//! `QueryKey` variant; equality is structural.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::domain::types::ShelfKind;

/// Identifies one cached server-state slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    // Profiles
    /// A user profile by id.
    User(Uuid),

    // Posts
    /// Home feed for the viewing user.
    Feed(Uuid),
    /// A single post by id.
    Post(Uuid),
    /// Posts authored by one user.
    UserPosts(Uuid),

    // Bookshelves
    /// All shelf entries for a user.
    Bookshelves(Uuid),
    /// One shelf of a user.
    Shelf { user_id: Uuid, kind: ShelfKind },

    // Social graph
    Followers(Uuid),
    Following(Uuid),

    // Notifications
    Notifications(Uuid),

    // Reading log
    ReadingSessions(Uuid),

    // Book metadata (high cardinality, keyed by normalized-query hash)
    BookSearch { query_hash: u64 },
    BookVolume(String),
}

impl QueryKey {
    /// Key for a free-text volume search, normalized so trivially different
    /// queries share a cache entry.
    pub fn book_search(query: &str) -> Self {
        Self::BookSearch {
            query_hash: hash_search_query(query),
        }
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a free-text search query after trimming and case-folding.
pub fn hash_search_query(query: &str) -> u64 {
    hash_value(&query.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_key_equality_is_structural() {
        let key1 = QueryKey::User(Uuid::nil());
        let key2 = QueryKey::User(Uuid::nil());
        assert_eq!(key1, key2);

        let key3 = QueryKey::Shelf {
            user_id: Uuid::nil(),
            kind: ShelfKind::Finished,
        };
        let key4 = QueryKey::Shelf {
            user_id: Uuid::nil(),
            kind: ShelfKind::Finished,
        };
        assert_eq!(key3, key4);

        assert_ne!(key1, QueryKey::Followers(Uuid::nil()));
        assert_ne!(
            key3,
            QueryKey::Shelf {
                user_id: Uuid::nil(),
                kind: ShelfKind::WantToRead,
            }
        );
    }

    #[test]
    fn search_key_normalizes_query() {
        assert_eq!(
            QueryKey::book_search("  Dune  "),
            QueryKey::book_search("dune")
        );
        assert_ne!(
            QueryKey::book_search("dune"),
            QueryKey::book_search("dune messiah")
        );
    }

    #[test]
    fn key_hash_consistency() {
        let key1 = QueryKey::BookVolume("abc123".to_string());
        let key2 = QueryKey::BookVolume("abc123".to_string());
        assert_eq!(hash_value(&key1), hash_value(&key2));
    }
}
