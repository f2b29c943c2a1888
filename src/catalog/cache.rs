//! Cache keys and error integration for catalog queries.

use crate::cache::{FetchError, QueryCache, QueryKey};

use super::error::ApiError;
use super::types::Product;

/// The query cache as used by the catalog.
pub type ProductCache = QueryCache<ApiError>;

/// The full product list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductsKey;

/// A single product by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductKey(pub i64);

impl QueryKey for ProductsKey {
  type Value = Vec<Product>;

  fn cache_key(&self) -> String {
    "products".to_string()
  }

  fn description(&self) -> String {
    "all products".to_string()
  }
}

impl QueryKey for ProductKey {
  type Value = Product;

  fn cache_key(&self) -> String {
    format!("product:{}", self.0)
  }

  fn description(&self) -> String {
    format!("product #{}", self.0)
  }
}

impl FetchError for ApiError {
  fn is_retryable(&self) -> bool {
    ApiError::is_retryable(self)
  }

  fn clears_data(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }

  fn aborted(reason: String) -> Self {
    ApiError::Aborted(reason)
  }
}
