//! BookWorm client data layer.
//!
//! Everything between the screens and the hosted backend of the BookWorm
//! reading tracker: typed remote adapters for the document database, blob
//! storage, auth provider and book-metadata API; a process-wide cache
//! coordinator with per-key fetch dedup and optimistic mutations; and the
//! small domain arithmetic the screens render (progress segments, weekly
//! reading totals).
//!
//! The view layer and the backends themselves live elsewhere. Construct a
//! [`app::DataLayer`] from [`config::Settings`], hand its services to the
//! screens, and subscribe to cache and session changes for re-render.

pub mod app;
pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;

pub use app::DataLayer;
