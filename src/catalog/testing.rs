//! In-memory product store for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::error::ApiError;
use super::store::ProductStore;
use super::types::Product;

#[derive(Default)]
struct State {
  products: BTreeMap<i64, Product>,
  next_id: i64,
  calls: HashMap<&'static str, usize>,
  unreachable: bool,
}

/// Product store backed by a map, counting calls per operation.
///
/// Reads can be held in flight by closing the gate; they complete once
/// permits are added.
#[derive(Clone)]
pub struct InMemoryStore {
  state: Arc<Mutex<State>>,
  read_gate: Option<Arc<Semaphore>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(State {
        next_id: 1,
        ..State::default()
      })),
      read_gate: None,
    }
  }

  pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
    let store = Self::new();
    {
      let mut state = store.state.lock().unwrap();
      for product in products {
        let id = state.next_id;
        state.next_id += 1;
        state.products.insert(id, product.with_id(id));
      }
    }
    store
  }

  /// Hold every read until permits are added to the returned gate.
  pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    self.read_gate = Some(gate.clone());
    (self, gate)
  }

  /// Make every call fail with a transport error.
  pub fn set_unreachable(&self, unreachable: bool) {
    self.state.lock().unwrap().unreachable = unreachable;
  }

  pub fn calls(&self, op: &str) -> usize {
    self.state.lock().unwrap().calls.get(op).copied().unwrap_or(0)
  }

  fn record(&self, op: &'static str) -> Result<(), ApiError> {
    let mut state = self.state.lock().unwrap();
    *state.calls.entry(op).or_default() += 1;
    if state.unreachable {
      return Err(ApiError::Transport("connection refused".to_string()));
    }
    Ok(())
  }

  async fn wait_for_gate(&self) {
    if let Some(gate) = &self.read_gate {
      let _permit = gate.acquire().await;
    }
  }
}

impl ProductStore for InMemoryStore {
  async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
    self.record("list")?;
    self.wait_for_gate().await;
    Ok(self.state.lock().unwrap().products.values().cloned().collect())
  }

  async fn get_product(&self, id: i64) -> Result<Product, ApiError> {
    self.record("get")?;
    self.wait_for_gate().await;
    self
      .state
      .lock()
      .unwrap()
      .products
      .get(&id)
      .cloned()
      .ok_or(ApiError::NotFound { id })
  }

  async fn create_product(&self, draft: &Product) -> Result<Product, ApiError> {
    self.record("create")?;
    let mut state = self.state.lock().unwrap();
    let id = state.next_id;
    state.next_id += 1;
    let created = draft.clone().with_id(id);
    state.products.insert(id, created.clone());
    Ok(created)
  }

  async fn update_product(&self, id: i64, product: &Product) -> Result<Product, ApiError> {
    self.record("update")?;
    let mut state = self.state.lock().unwrap();
    let slot = state
      .products
      .get_mut(&id)
      .ok_or(ApiError::NotFound { id })?;
    *slot = product.clone().with_id(id);
    Ok(slot.clone())
  }

  async fn delete_product(&self, id: i64) -> Result<(), ApiError> {
    self.record("delete")?;
    self
      .state
      .lock()
      .unwrap()
      .products
      .remove(&id)
      .map(|_| ())
      .ok_or(ApiError::NotFound { id })
  }
}
