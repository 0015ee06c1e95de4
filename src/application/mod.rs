//! Application services: every screen's queries and mutations, wired
//! through the cache coordinator.

pub mod auth;
pub mod books;
pub mod error;
pub mod notifications;
pub mod posts;
pub mod reading;
pub mod session;
pub mod shelves;
pub mod social;
pub mod sources;
pub mod users;
