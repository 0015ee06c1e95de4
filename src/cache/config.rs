//! Cache tuning knobs.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 512;
const DEFAULT_FRESH_FOR_SECS: u64 = 60;
const DEFAULT_EVENT_BUFFER: usize = 64;

/// Cache configuration from `bookworm.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached query results.
    pub capacity: usize,
    /// How long an entry is served without a refetch.
    pub fresh_for_secs: u64,
    /// Ring size of the change-event broadcast channel.
    pub event_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            fresh_for_secs: DEFAULT_FRESH_FOR_SECS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.capacity,
            fresh_for_secs: settings.fresh_for_secs,
            event_buffer: settings.event_buffer,
        }
    }
}

impl CacheConfig {
    /// Returns the entry capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Freshness window as a duration.
    pub fn fresh_for(&self) -> Duration {
        Duration::from_secs(self.fresh_for_secs)
    }

    /// Broadcast buffer, clamped to at least one slot.
    pub fn event_buffer_clamped(&self) -> usize {
        self.event_buffer.max(1)
    }
}
