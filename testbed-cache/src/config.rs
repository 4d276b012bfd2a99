use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Eviction settings for a [`ResultCache`](crate::ResultCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Idle time after which an entry is evicted.
    pub ttl: Duration,
    pub gc_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            gc_interval: DEFAULT_GC_INTERVAL,
        }
    }
}
