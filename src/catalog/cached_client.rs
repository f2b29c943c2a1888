//! Product client that reads through the query cache and invalidates it after writes.

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::cache::{ProductCache, ProductKey, ProductsKey};
use super::error::ApiError;
use super::store::ProductStore;
use super::types::Product;

/// Product store access with transparent caching.
///
/// Reads go through the shared [`ProductCache`]. Writes always reach the
/// store and, once the store acknowledges them, invalidate the entries they
/// affect:
///
/// | write  | `products`  | `product:<id>` |
/// |--------|-------------|----------------|
/// | create | invalidated | untouched      |
/// | update | invalidated | invalidated    |
/// | delete | invalidated | removed        |
///
/// Each write runs on its own task, so dropping the caller never cancels a
/// write that has already been sent.
#[derive(Clone)]
pub struct CachedProductClient<S: ProductStore> {
  store: S,
  cache: ProductCache,
}

impl<S: ProductStore> CachedProductClient<S> {
  pub fn new(store: S, cache: ProductCache) -> Self {
    Self { store, cache }
  }

  pub fn cache(&self) -> &ProductCache {
    &self.cache
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
    let store = self.store.clone();
    self
      .cache
      .fetch(&ProductsKey, move || {
        let store = store.clone();
        async move { store.list_products().await }
      })
      .await
  }

  pub async fn get_product(&self, id: i64) -> Result<Product, ApiError> {
    let store = self.store.clone();
    self
      .cache
      .fetch(&ProductKey(id), move || {
        let store = store.clone();
        async move { store.get_product(id).await }
      })
      .await
  }

  pub async fn create_product(&self, draft: Product) -> Result<Product, ApiError> {
    if !draft.is_draft() {
      return Err(ApiError::Validation(
        "a new product must not carry an id".to_string(),
      ));
    }
    draft.validate()?;

    let store = self.store.clone();
    let cache = self.cache.clone();
    join_write(tokio::spawn(async move {
      let created = store.create_product(&draft).await?;
      info!(id = ?created.id, name = %created.name, "product created");
      cache.invalidate(&ProductsKey);
      Ok::<_, ApiError>(created)
    }))
    .await
  }

  pub async fn update_product(&self, id: i64, product: Product) -> Result<Product, ApiError> {
    if product.id.is_some_and(|existing| existing != id) {
      return Err(ApiError::Validation(format!(
        "product id {} cannot be changed to {}",
        id,
        product.id.unwrap_or_default()
      )));
    }
    product.validate()?;

    let store = self.store.clone();
    let cache = self.cache.clone();
    join_write(tokio::spawn(async move {
      let updated = store.update_product(id, &product).await?;
      info!(id, name = %updated.name, "product updated");
      cache.invalidate(&ProductsKey);
      cache.invalidate(&ProductKey(id));
      Ok::<_, ApiError>(updated)
    }))
    .await
  }

  pub async fn delete_product(&self, id: i64) -> Result<(), ApiError> {
    let store = self.store.clone();
    let cache = self.cache.clone();
    join_write(tokio::spawn(async move {
      store.delete_product(id).await?;
      info!(id, "product deleted");
      cache.invalidate(&ProductsKey);
      cache.remove(&ProductKey(id));
      Ok::<_, ApiError>(())
    }))
    .await
  }
}

async fn join_write<T>(task: JoinHandle<Result<T, ApiError>>) -> Result<T, ApiError> {
  match task.await {
    Ok(result) => {
      if let Err(e) = &result {
        debug!(error = %e, "write failed, cache left untouched");
      }
      result
    }
    Err(e) => Err(ApiError::Aborted(e.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheEventKind;
  use crate::catalog::testing::InMemoryStore;
  use rust_decimal::Decimal;

  fn product(name: &str) -> Product {
    Product::draft(name, format!("{} description", name), Decimal::new(1999, 2), 10, 1, 1)
  }

  fn client(store: InMemoryStore) -> CachedProductClient<InMemoryStore> {
    CachedProductClient::new(store, ProductCache::new())
  }

  #[tokio::test]
  async fn test_empty_store_lists_nothing() {
    let client = client(InMemoryStore::new());

    assert_eq!(client.list_products().await, Ok(Vec::new()));
    let snapshot = client.cache().snapshot(&ProductsKey).unwrap();
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.data, Some(Vec::new()));
  }

  #[tokio::test]
  async fn test_concurrent_list_reads_issue_one_request() {
    let (store, gate) = InMemoryStore::with_products([product("Lamp")]).gated();
    let client = client(store.clone());

    let first = tokio::spawn({
      let client = client.clone();
      async move { client.list_products().await }
    });
    let second = tokio::spawn({
      let client = client.clone();
      async move { client.list_products().await }
    });
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    gate.add_permits(1);
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(store.calls("list"), 1);
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
  }

  #[tokio::test]
  async fn test_cached_reads_skip_the_store() {
    let store = InMemoryStore::with_products([product("Lamp")]);
    let client = client(store.clone());

    client.list_products().await.unwrap();
    client.list_products().await.unwrap();
    client.get_product(1).await.unwrap();
    client.get_product(1).await.unwrap();

    assert_eq!(store.calls("list"), 1);
    assert_eq!(store.calls("get"), 1);
  }

  #[tokio::test]
  async fn test_create_is_visible_in_next_list() {
    let store = InMemoryStore::new();
    let client = client(store.clone());
    assert!(client.list_products().await.unwrap().is_empty());

    let created = client.create_product(product("Desk")).await.unwrap();
    let id = created.id.unwrap();

    let listed = client.list_products().await.unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert_eq!(store.calls("list"), 2);

    // The assigned id is stable across get and update
    assert_eq!(client.get_product(id).await.unwrap().id, Some(id));
    let updated = client.update_product(id, product("Standing desk")).await.unwrap();
    assert_eq!(updated.id, Some(id));
  }

  #[tokio::test]
  async fn test_update_round_trip() {
    let store = InMemoryStore::with_products([product("Chair")]);
    let client = client(store.clone());
    assert_eq!(client.get_product(1).await.unwrap().name, "Chair");

    let mut changed = product("Armchair");
    changed.stock = 3;
    client.update_product(1, changed.clone()).await.unwrap();

    let fetched = client.get_product(1).await.unwrap();
    assert_eq!(fetched, changed.with_id(1));
    assert_eq!(store.calls("get"), 2);
  }

  #[tokio::test]
  async fn test_update_invalidates_list_and_item() {
    let store = InMemoryStore::with_products([product("Chair")]);
    let client = client(store);
    client.list_products().await.unwrap();
    client.get_product(1).await.unwrap();

    client.update_product(1, product("Stool")).await.unwrap();

    let cache = client.cache();
    assert!(cache.snapshot(&ProductsKey).unwrap().is_stale);
    assert!(cache.snapshot(&ProductKey(1)).unwrap().is_stale);
  }

  #[tokio::test]
  async fn test_delete_then_get_is_not_found() {
    let store = InMemoryStore::with_products([product("Lamp"), product("Rug")]);
    let client = client(store);
    client.list_products().await.unwrap();
    client.get_product(1).await.unwrap();

    client.delete_product(1).await.unwrap();
    assert!(client.cache().snapshot(&ProductKey(1)).is_none());

    assert_eq!(
      client.get_product(1).await,
      Err(ApiError::NotFound { id: 1 })
    );
    let listed = client.list_products().await.unwrap();
    assert!(listed.iter().all(|p| p.id != Some(1)));
    assert_eq!(listed.len(), 1);
  }

  #[tokio::test]
  async fn test_missing_product_records_error() {
    let client = client(InMemoryStore::new());

    assert_eq!(
      client.get_product(42).await,
      Err(ApiError::NotFound { id: 42 })
    );

    let snapshot = client.cache().snapshot(&ProductKey(42)).unwrap();
    assert_eq!(snapshot.error, Some(ApiError::NotFound { id: 42 }));
    assert!(snapshot.data.is_none());
    assert!(!snapshot.is_loading);
  }

  #[tokio::test]
  async fn test_failed_write_leaves_cache_untouched() {
    let store = InMemoryStore::with_products([product("Lamp")]);
    let client = client(store.clone());
    client.list_products().await.unwrap();

    assert_eq!(
      client.delete_product(99).await,
      Err(ApiError::NotFound { id: 99 })
    );
    assert!(!client.cache().snapshot(&ProductsKey).unwrap().is_stale);

    store.set_unreachable(true);
    let result = client.create_product(product("Vase")).await;
    assert!(matches!(result, Err(ApiError::Transport(_))));
    assert!(!client.cache().snapshot(&ProductsKey).unwrap().is_stale);
  }

  #[tokio::test]
  async fn test_invalid_drafts_never_reach_the_store() {
    let store = InMemoryStore::new();
    let client = client(store.clone());

    let mut nameless = product("x");
    nameless.name.clear();
    assert!(matches!(
      client.create_product(nameless).await,
      Err(ApiError::Validation(_))
    ));

    let persisted = product("Lamp").with_id(5);
    assert!(matches!(
      client.create_product(persisted).await,
      Err(ApiError::Validation(_))
    ));

    assert!(matches!(
      client.update_product(1, product("Lamp").with_id(2)).await,
      Err(ApiError::Validation(_))
    ));

    assert_eq!(store.calls("create"), 0);
    assert_eq!(store.calls("update"), 0);
  }

  #[tokio::test]
  async fn test_write_completes_when_caller_is_dropped() {
    let store = InMemoryStore::new();
    let client = client(store.clone());
    let mut events = client.cache().subscribe();
    client.list_products().await.unwrap();

    // Poll the create once so its write task is spawned, then drop the caller
    {
      let create = client.create_product(product("Clock"));
      tokio::pin!(create);
      let _ = futures::poll!(create.as_mut());
    }

    loop {
      let event = events.recv().await.unwrap();
      if event.is_for(&ProductsKey) && event.kind == CacheEventKind::Invalidated {
        break;
      }
    }
    assert_eq!(store.calls("create"), 1);
    assert_eq!(client.list_products().await.unwrap().len(), 1);
  }
}
