use std::future::Future;

use super::error::ApiError;
use super::types::Product;

/// Remote product store operations.
///
/// Implementations translate each call into one request against the store
/// and never touch the query cache; cache orchestration belongs to
/// [`CachedProductClient`](super::CachedProductClient).
pub trait ProductStore: Clone + Send + Sync + 'static {
  /// All products, in the order the store returns them.
  fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, ApiError>> + Send;

  fn get_product(&self, id: i64) -> impl Future<Output = Result<Product, ApiError>> + Send;

  /// Persist a draft. The returned product carries its assigned id.
  fn create_product(
    &self,
    draft: &Product,
  ) -> impl Future<Output = Result<Product, ApiError>> + Send;

  /// Replace the product with the given id as a whole.
  fn update_product(
    &self,
    id: i64,
    product: &Product,
  ) -> impl Future<Output = Result<Product, ApiError>> + Send;

  fn delete_product(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;
}
