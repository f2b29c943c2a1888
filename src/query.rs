//! View-side handles for reads and writes.
//!
//! A view owns a `Query<T>` per read it displays and a `Mutation<T>` per
//! write it can trigger. Both run their future on a spawned task and hand the
//! result back through a channel that the view polls on each tick. Dropping
//! the handle drops the receiving end, so a result that arrives after the
//! view is gone is never applied to it.
//!
//! # Example
//!
//! ```ignore
//! let catalog = catalog.clone();
//! let mut query = Query::new(move || {
//!     let catalog = catalog.clone();
//!     async move { catalog.list_products().await }
//! })
//! .watching(catalog.cache(), &ProductsKey);
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading(_) => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::cache::{CacheEvent, CacheEventKind, FetchError, QueryCache, QueryKey};
use crate::catalog::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is fetching; holds the previous data while refetching
  Loading(Option<T>),
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  /// Current data, including data kept visible during a refetch.
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) | QueryState::Loading(Some(data)) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, ApiError>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Cache key a query follows for invalidation.
struct Watch {
  key: String,
  events: broadcast::Receiver<CacheEvent>,
}

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states
/// - Async result handling via channels
/// - Optional refetch when its cache entry is invalidated
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
  watch: Option<Watch>,
}

impl<T: Clone + Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      watch: None,
    }
  }

  /// Refetch whenever `key` is invalidated or removed in `cache`.
  ///
  /// This is the eager-refetch policy: a view showing an entry reloads it
  /// as soon as a write makes it stale.
  pub fn watching<E: FetchError, K: QueryKey>(mut self, cache: &QueryCache<E>, key: &K) -> Self {
    self.watch = Some(Watch {
      key: key.cache_key(),
      events: cache.subscribe(),
    });
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query has any.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error if the query failed.
  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  ///
  /// This is a no-op if the query is already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already loading or data exists.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch and for invalidations.
  ///
  /// Returns `true` if the state changed (data arrived, error occurred or a
  /// refetch started). Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    if self.take_invalidation() {
      self.refetch();
      changed = true;
    }

    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return changed,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => changed,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error(ApiError::Aborted("query was cancelled".to_string()));
        self.receiver = None;
        true
      }
    }
  }

  /// Drain pending cache events, reporting whether the watched key went stale.
  fn take_invalidation(&mut self) -> bool {
    let Some(watch) = &mut self.watch else {
      return false;
    };

    let mut invalidated = false;
    loop {
      match watch.events.try_recv() {
        Ok(event) => {
          if event.key == watch.key
            && matches!(
              event.kind,
              CacheEventKind::Invalidated | CacheEventKind::Removed
            )
          {
            invalidated = true;
          }
        }
        // Missed events may have included ours
        Err(broadcast::error::TryRecvError::Lagged(_)) => invalidated = true,
        Err(_) => break,
      }
    }
    invalidated
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    let previous = self.state.data().cloned();
    self.state = QueryState::Loading(previous);

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

// Query is not Clone because the fetcher is boxed and receiver is owned.

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("watching", &self.watch.as_ref().map(|w| &w.key))
      .finish_non_exhaustive()
  }
}

/// The state of a write
#[derive(Debug, Clone)]
pub enum MutationState<T> {
  Idle,
  Pending,
  Done(T),
  Failed(ApiError),
}

/// Handle for a single write triggered from a view.
///
/// The write itself keeps running if the view is dropped; only the
/// notification back to the view is lost.
pub struct Mutation<T> {
  state: MutationState<T>,
  receiver: Option<oneshot::Receiver<Result<T, ApiError>>>,
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self {
      state: MutationState::Idle,
      receiver: None,
    }
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, MutationState::Pending)
  }

  /// Start a write. Ignored while a previous write is still pending.
  pub fn mutate<Fut>(&mut self, write: Fut)
  where
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if self.is_pending() {
      return;
    }

    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;
    tokio::spawn(async move {
      let _ = tx.send(write.await);
    });
  }

  /// Poll for the write's outcome. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(value)) => self.state = MutationState::Done(value),
      Ok(Err(error)) => self.state = MutationState::Failed(error),
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = MutationState::Failed(ApiError::Aborted("write task was dropped".to_string()))
      }
    }
    self.receiver = None;
    true
  }

  /// Take the outcome of a finished write, returning the handle to idle.
  pub fn take_outcome(&mut self) -> Option<Result<T, ApiError>> {
    match std::mem::replace(&mut self.state, MutationState::Idle) {
      MutationState::Done(value) => Some(Ok(value)),
      MutationState::Failed(error) => Some(Err(error)),
      other => {
        self.state = other;
        None
      }
    }
  }
}

impl<T: Send + 'static> Default for Mutation<T> {
  fn default() -> Self {
    Self::new()
  }
}
