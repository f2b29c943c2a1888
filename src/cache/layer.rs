//! Keyed query cache with request coalescing and invalidation.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use super::retry::RetryPolicy;
use super::traits::{CacheEvent, CacheEventKind, EntrySnapshot, FetchError, QueryKey};

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch<E> = Shared<BoxFuture<'static, Result<AnyValue, E>>>;

/// Capacity of the change notification channel.
const EVENT_CAPACITY: usize = 64;

struct InFlight<E> {
  id: u64,
  fetch: SharedFetch<E>,
}

struct Entry<E> {
  value: Option<AnyValue>,
  error: Option<E>,
  fetched_at: Option<DateTime<Utc>>,
  invalidated: bool,
  in_flight: Option<InFlight<E>>,
}

impl<E> Default for Entry<E> {
  fn default() -> Self {
    Self {
      value: None,
      error: None,
      fetched_at: None,
      invalidated: false,
      in_flight: None,
    }
  }
}

struct Inner<E> {
  entries: HashMap<String, Entry<E>>,
  next_fetch_id: u64,
}

/// Process-wide store of query results.
///
/// Cloning is cheap and every clone shares the same entries, so one cache is
/// built at startup and handed to every consumer.
///
/// - A fresh entry is returned without touching the network.
/// - A stale or missing entry starts exactly one fetch; concurrent readers of
///   the same key wait on that fetch and get the same result.
/// - Invalidation only marks entries stale and never fetches by itself.
pub struct QueryCache<E: FetchError> {
  inner: Arc<Mutex<Inner<E>>>,
  events: broadcast::Sender<CacheEvent>,
  /// How long fetched data counts as fresh
  stale_time: Duration,
  retry: RetryPolicy,
}

impl<E: FetchError> QueryCache<E> {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        next_fetch_id: 0,
      })),
      events,
      stale_time: Duration::minutes(5),
      retry: RetryPolicy::none(),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Subscribe to entry change notifications.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.events.subscribe()
  }

  /// Read through the cache.
  ///
  /// The fetcher runs on a spawned task, so the fetch completes and lands in
  /// the cache even if every caller stops waiting for it.
  pub async fn fetch<K, F, Fut>(&self, key: &K, fetcher: F) -> Result<K::Value, E>
  where
    K: QueryKey,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<K::Value, E>> + Send + 'static,
  {
    let cache_key = key.cache_key();

    let pending = {
      let mut inner = self.lock();
      let next_id = inner.next_fetch_id;
      let entry = inner.entries.entry(cache_key.clone()).or_default();

      if !self.is_stale(entry) {
        if let Some(value) = entry.value.as_ref().and_then(|v| v.downcast_ref::<K::Value>()) {
          trace!(key = %cache_key, "cache hit");
          return Ok(value.clone());
        }
      }

      match &entry.in_flight {
        Some(in_flight) => {
          debug!(key = %cache_key, "joining in-flight fetch");
          in_flight.fetch.clone()
        }
        None => {
          debug!(key = %cache_key, query = %key.description(), "dispatching fetch");
          let fetch = self.dispatch(cache_key.clone(), next_id, fetcher);
          entry.in_flight = Some(InFlight {
            id: next_id,
            fetch: fetch.clone(),
          });
          inner.next_fetch_id += 1;
          self.notify(&cache_key, CacheEventKind::Loading);
          fetch
        }
      }
    };

    let value = pending.await?;
    value
      .downcast_ref::<K::Value>()
      .cloned()
      .ok_or_else(|| E::aborted(format!("value cached under {} has another type", cache_key)))
  }

  /// Current state of an entry, or `None` if the key was never read.
  #[allow(dead_code)]
  pub fn snapshot<K: QueryKey>(&self, key: &K) -> Option<EntrySnapshot<K::Value, E>> {
    let inner = self.lock();
    let entry = inner.entries.get(&key.cache_key())?;

    Some(EntrySnapshot {
      data: entry
        .value
        .as_ref()
        .and_then(|v| v.downcast_ref::<K::Value>())
        .cloned(),
      is_loading: entry.in_flight.is_some(),
      error: entry.error.clone(),
      is_stale: self.is_stale(entry),
      fetched_at: entry.fetched_at,
    })
  }

  /// Mark an entry stale so the next read refetches.
  ///
  /// A fetch already in flight for the key is detached: its waiters still get
  /// its result, but that result is not written back into the entry.
  pub fn invalidate<K: QueryKey>(&self, key: &K) {
    let cache_key = key.cache_key();
    let mut inner = self.lock();
    let Some(entry) = inner.entries.get_mut(&cache_key) else {
      return;
    };

    entry.invalidated = true;
    if entry.in_flight.take().is_some() {
      debug!(key = %cache_key, "detached in-flight fetch");
    }
    debug!(key = %cache_key, "invalidated");
    self.notify(&cache_key, CacheEventKind::Invalidated);
  }

  /// Drop an entry entirely.
  pub fn remove<K: QueryKey>(&self, key: &K) {
    let cache_key = key.cache_key();
    if self.lock().entries.remove(&cache_key).is_some() {
      debug!(key = %cache_key, "removed");
      self.notify(&cache_key, CacheEventKind::Removed);
    }
  }

  /// Drop every entry.
  #[allow(dead_code)]
  pub fn clear(&self) {
    let keys: Vec<String> = self.lock().entries.drain().map(|(k, _)| k).collect();
    for key in keys {
      self.notify(&key, CacheEventKind::Removed);
    }
  }

  #[allow(dead_code)]
  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn is_stale(&self, entry: &Entry<E>) -> bool {
    if entry.invalidated || entry.value.is_none() || entry.error.is_some() {
      return true;
    }
    match entry.fetched_at {
      Some(fetched_at) => Utc::now() - fetched_at >= self.stale_time,
      None => true,
    }
  }

  fn lock(&self) -> MutexGuard<'_, Inner<E>> {
    // Entries stay consistent under every early return, so a poisoned lock is safe to reuse
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn notify(&self, key: &str, kind: CacheEventKind) {
    // No subscribers is fine
    let _ = self.events.send(CacheEvent {
      key: key.to_string(),
      kind,
    });
  }

  fn dispatch<T, F, Fut>(&self, key: String, id: u64, fetcher: F) -> SharedFetch<E>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let cache = self.clone();
    let retry = self.retry;

    let task_cache = cache.clone();
    let task_key = key.clone();
    let task = tokio::spawn(async move {
      let result = match AssertUnwindSafe(retry.run(&task_key, &fetcher))
        .catch_unwind()
        .await
      {
        Ok(result) => result.map(|value| Arc::new(value) as AnyValue),
        Err(panic) => Err(E::aborted(format!(
          "fetch panicked: {}",
          panic_message(panic.as_ref())
        ))),
      };
      task_cache.complete(&task_key, id, &result);
      result
    });

    async move {
      match task.await {
        Ok(result) => result,
        Err(e) => {
          // Cancelled before it could record anything; release the key
          let result = Err(E::aborted(e.to_string()));
          cache.complete(&key, id, &result);
          result
        }
      }
    }
    .boxed()
    .shared()
  }

  /// Record the outcome of fetch `id`, unless it was detached meanwhile.
  fn complete(&self, key: &str, id: u64, result: &Result<AnyValue, E>) {
    let mut inner = self.lock();
    let Some(entry) = inner.entries.get_mut(key) else {
      debug!(key, "entry removed before fetch completed");
      return;
    };
    if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
      debug!(key, "discarding result of detached fetch");
      return;
    }
    entry.in_flight = None;

    match result {
      Ok(value) => {
        entry.value = Some(Arc::clone(value));
        entry.error = None;
        entry.fetched_at = Some(Utc::now());
        entry.invalidated = false;
        drop(inner);
        self.notify(key, CacheEventKind::Updated);
      }
      Err(e) => {
        warn!(key, error = %e, "fetch failed");
        if e.clears_data() {
          entry.value = None;
          entry.fetched_at = None;
        }
        entry.error = Some(e.clone());
        drop(inner);
        self.notify(key, CacheEventKind::Failed);
      }
    }
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
  panic
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("unknown cause")
}

impl<E: FetchError> Default for QueryCache<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: FetchError> Clone for QueryCache<E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      events: self.events.clone(),
      stale_time: self.stale_time,
      retry: self.retry,
    }
  }
}
