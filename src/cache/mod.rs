//! Cache Module
//!
//! Short-TTL in-memory cache used by the authentication path and permission checks.

mod clock;
mod entry;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::Identity;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::CacheStore;

/// Store shared between handlers. The mutex is the single per-store lock and
/// is only held for the in-memory operation.
pub type SharedCache<V, C = SystemClock> = Arc<Mutex<CacheStore<V, C>>>;

// == Cached Value ==
/// Values the service keeps in its cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// A verified identity, keyed by token
    Identity(Identity),
    /// A yes/no permission answer, keyed by email
    Flag(bool),
}

/// Wraps a store for sharing across tasks.
pub fn shared<V: Clone, C: Clock>(store: CacheStore<V, C>) -> SharedCache<V, C> {
    Arc::new(Mutex::new(store))
}
