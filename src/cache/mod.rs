//! BookWorm cache subsystem.
//!
//! Process-wide coordination of server-state reads and optimistic writes:
//!
//! - **Store**: one keyed map of last-known results with LRU eviction and a
//!   single freshness window
//! - **Flight gate**: at most one in-flight fetch per query key; later
//!   readers join, optimistic writes abort
//! - **Mutation log**: reversible diffs, replayed in reverse on rollback
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `bookworm.toml`:
//!
//! ```toml
//! [cache]
//! capacity = 512
//! fresh_for_secs = 60
//! event_buffer = 64
//! ```

mod config;
mod coordinator;
mod events;
mod flight;
mod keys;
mod mutation;
mod store;

pub use config::CacheConfig;
pub use coordinator::{CacheCoordinator, CacheError};
pub use events::{CacheEvent, ChangeFeed, ChangeReason, Epoch};
pub use flight::{FetchOutcome, FlightGate, FlightRole};
pub use keys::{QueryKey, hash_search_query, hash_value};
pub use mutation::{MutationContext, MutationDiff};
pub use store::{CacheEntry, CacheStore, Cacheable, CachedValue, ReadState};
