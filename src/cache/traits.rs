//! Core traits and types for the query cache.

use chrono::{DateTime, Utc};
use std::fmt::Display;

/// Logical identity of a cached query.
///
/// The key type fixes the type of value stored under it, so two readers of
/// the same key always agree on what they get back.
pub trait QueryKey {
  type Value: Clone + Send + Sync + 'static;

  /// Stable string identity (e.g., "products", "product:42")
  fn cache_key(&self) -> String;

  /// Human readable description for logs
  fn description(&self) -> String {
    self.cache_key()
  }
}

/// Errors that can be recorded against a cache entry.
pub trait FetchError: Clone + Send + Sync + Display + 'static {
  /// Whether a retry policy may repeat the fetch after this error.
  fn is_retryable(&self) -> bool;

  /// Whether this error means the previously cached value no longer exists.
  fn clears_data(&self) -> bool;

  /// Error handed to waiters when the fetch task never produced a result.
  fn aborted(reason: String) -> Self;
}

/// Notification sent to subscribers whenever an entry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
  pub key: String,
  pub kind: CacheEventKind,
}

impl CacheEvent {
  #[allow(dead_code)]
  pub fn is_for(&self, key: &impl QueryKey) -> bool {
    self.key == key.cache_key()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
  /// A fetch was dispatched
  Loading,
  /// A fetch succeeded and the entry holds new data
  Updated,
  /// A fetch failed and the entry holds the error
  Failed,
  /// The entry was marked stale; the next read refetches
  Invalidated,
  /// The entry was dropped from the cache
  Removed,
}

/// Point-in-time view of a cache entry.
#[derive(Debug, Clone)]
pub struct EntrySnapshot<T, E> {
  /// Last successfully fetched value, if any
  pub data: Option<T>,
  /// True while a fetch for this key is in flight
  pub is_loading: bool,
  /// Most recent failure, cleared by the next successful fetch
  pub error: Option<E>,
  /// True when the next read will go to the network
  pub is_stale: bool,
  /// When `data` was fetched
  pub fetched_at: Option<DateTime<Utc>>,
}
