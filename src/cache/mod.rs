//! Generic query cache for data fetched from a remote store.
//!
//! This module is independent of the product catalog. It provides:
//! - A keyed store of fetched values with stale-time based freshness
//! - At most one in-flight fetch per key; concurrent readers share its result
//! - Invalidation that marks entries stale without fetching
//! - Per-key loading and error state, and change notifications for views
//! - Opt-in bounded retry of failed fetches

mod layer;
mod retry;
mod traits;

pub use layer::QueryCache;
pub use retry::RetryPolicy;
pub use traits::{CacheEvent, CacheEventKind, FetchError, QueryKey};
