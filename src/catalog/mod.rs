//! Product catalog data access: the product type, the remote store client,
//! and the cached client views read through.

pub mod cache;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod store;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use cache::{ProductCache, ProductKey, ProductsKey};
pub use cached_client::CachedProductClient;
pub use client::ProductClient;
pub use error::ApiError;
pub use store::ProductStore;
pub use types::Product;

use tracing::debug;

use crate::config::Config;

/// The cached client as wired up by the application.
pub type Catalog = CachedProductClient<ProductClient>;

/// Build the HTTP client and the process-wide cache from configuration.
pub fn connect(config: &Config) -> color_eyre::Result<Catalog> {
  let client = ProductClient::new(config)?;
  let retry = config.cache.retry_policy();
  debug!(
    stale_secs = config.cache.stale_time_secs,
    max_retries = retry.max_retries(),
    "configuring product cache"
  );
  let cache = ProductCache::new()
    .with_stale_time(config.cache.stale_time())
    .with_retry(retry);
  Ok(CachedProductClient::new(client, cache))
}
