//! In-memory cache of server resources.
//!
//! Entries are keyed by [`QueryKey`] and carry their own freshness metadata:
//! - Every key belongs to a [`ResourceClass`] that fixes its staleness window
//! - Stale entries keep their value, so views render old data while a
//!   revalidation runs
//! - Concurrent requests for one key share a single fetch
//! - Entries nobody subscribes to are evicted after a GC window

mod entry;
mod key;
mod store;

pub use entry::{CacheEvent, CacheStatus};
pub use key::{KeyPrefix, QueryKey, ResourceClass};
pub use store::{CacheStore, DEFAULT_GC_WINDOW};
