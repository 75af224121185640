//! Keyed, observable cache of remote-read data.
//!
//! Every [`RequestKey`] owns one [`CacheEntry`]. The only writer of an entry is
//! the fetch routine for that key; everything else reads snapshots or
//! subscribes to changes through a `watch` channel.
//!
//! Fetches carry a generation number. A response only replaces `data` if it
//! belongs to a newer generation than the last applied success, and each caller
//! of [`Query::wait_fresh_response`] is settled by the fetch it started.

use crate::client::Transport;
use crate::error::ChainError;
use crate::query::key::{QueryRequest, RequestKey};
use futures::future::{BoxFuture, join_all};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tokio::sync::watch;

/// A fetch failure as stored on a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }
}

impl From<&ChainError> for ErrorInfo {
    fn from(e: &ChainError) -> Self {
        let status = match e {
            ChainError::Status { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            message: e.to_string(),
            status,
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Cached state for one request key.
#[derive(Debug)]
pub struct CacheEntry<T> {
    /// Last successfully decoded response.
    pub data: Option<Arc<T>>,
    /// Last fetch error; cleared by the next success.
    pub error: Option<ErrorInfo>,
    /// True while at least one fetch for this key is outstanding.
    pub is_fetching: bool,
    pub last_fetched_at: Option<SystemTime>,
    /// Bumped every time `data` is replaced.
    pub version: u64,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            last_fetched_at: self.last_fetched_at,
            version: self.version,
        }
    }
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            last_fetched_at: None,
            version: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Flight {
    next_generation: u64,
    /// Generation of the last response that replaced `data`.
    applied_generation: u64,
    outstanding: usize,
}

struct Slot<T> {
    request: QueryRequest,
    key: RequestKey,
    state: watch::Sender<CacheEntry<T>>,
    flight: Mutex<Flight>,
}

impl<T> Slot<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn new(request: QueryRequest) -> Self {
        let key = request.key();
        Self {
            request,
            key,
            state: watch::Sender::new(CacheEntry::default()),
            flight: Mutex::new(Flight::default()),
        }
    }

    fn flight(&self) -> MutexGuard<'_, Flight> {
        // A poisoned lock only means another fetch panicked mid-update; the counters are still usable.
        self.flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new generation unless another fetch is outstanding.
    fn try_begin(&self) -> Option<u64> {
        let mut flight = self.flight();
        if flight.outstanding > 0 {
            return None;
        }
        Some(self.start_generation(&mut flight))
    }

    /// Start a new generation even if other fetches are outstanding.
    fn begin_forced(&self) -> u64 {
        let mut flight = self.flight();
        self.start_generation(&mut flight)
    }

    fn start_generation(&self, flight: &mut Flight) -> u64 {
        flight.next_generation += 1;
        flight.outstanding += 1;
        self.state.send_modify(|entry| entry.is_fetching = true);
        flight.next_generation
    }

    async fn run(
        self: Arc<Self>,
        transport: Arc<dyn Transport>,
        generation: u64,
    ) -> Result<Arc<T>, ErrorInfo> {
        tracing::debug!("Fetching {} (generation {})", self.key, generation);
        let result = match transport.get_json(&self.request.url()).await {
            Ok(body) => serde_json::from_value::<T>(body).map_err(ChainError::from),
            Err(e) => Err(e),
        };
        self.complete(generation, result)
    }

    fn complete(
        &self,
        generation: u64,
        result: Result<T, ChainError>,
    ) -> Result<Arc<T>, ErrorInfo> {
        let mut flight = self.flight();
        flight.outstanding = flight.outstanding.saturating_sub(1);
        let still_fetching = flight.outstanding > 0;
        let newest = generation > flight.applied_generation;

        let outcome = match result {
            Ok(value) => {
                let data = Arc::new(value);
                if newest {
                    flight.applied_generation = generation;
                    let applied = data.clone();
                    self.state.send_modify(|entry| {
                        entry.data = Some(applied);
                        entry.error = None;
                        entry.last_fetched_at = Some(SystemTime::now());
                        entry.version += 1;
                    });
                } else {
                    tracing::debug!(
                        "Discarding superseded response for {} (generation {} <= {})",
                        self.key,
                        generation,
                        flight.applied_generation
                    );
                }
                Ok(data)
            }
            Err(e) => {
                let info = ErrorInfo::from(&e);
                tracing::warn!("Fetch failed for {}: {}", self.key, info);
                if newest {
                    // Stale data stays; only the error is recorded.
                    let recorded = info.clone();
                    self.state.send_modify(|entry| entry.error = Some(recorded));
                }
                Err(info)
            }
        };

        self.state.send_if_modified(|entry| {
            let changed = entry.is_fetching != still_fetching;
            entry.is_fetching = still_fetching;
            changed
        });
        outcome
    }
}

/// Type-erased view of a slot, used for prefix invalidation.
trait ErasedSlot: Send + Sync {
    fn key(&self) -> &RequestKey;
    fn refetch(self: Arc<Self>, transport: Arc<dyn Transport>) -> bool;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> ErasedSlot for Slot<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn key(&self) -> &RequestKey {
        &self.key
    }

    fn refetch(self: Arc<Self>, transport: Arc<dyn Transport>) -> bool {
        spawn_if_idle(self, transport)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn spawn_if_idle<T>(slot: Arc<Slot<T>>, transport: Arc<dyn Transport>) -> bool
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    if !slot.request.can_fetch() {
        return false;
    }
    let Some(generation) = slot.try_begin() else {
        tracing::trace!("Fetch already in flight for {}", slot.key);
        return false;
    };
    tokio::spawn(async move {
        // The outcome is recorded on the entry; nobody awaits it here.
        let _ = slot.run(transport, generation).await;
    });
    true
}

struct CacheInner {
    transport: Arc<dyn Transport>,
    slots: Mutex<HashMap<(RequestKey, TypeId), Arc<dyn ErasedSlot>>>,
}

/// Process-wide query cache. Cloning is cheap and all clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                transport,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<(RequestKey, TypeId), Arc<dyn ErasedSlot>>> {
        self.inner.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the typed handle for a request, creating an empty entry if absent.
    ///
    /// Never fetches by itself.
    pub fn query<T>(&self, request: QueryRequest) -> Query<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let key = request.key();
        let mut slots = self.slots();
        let erased = slots
            .entry((key, TypeId::of::<T>()))
            .or_insert_with(|| Arc::new(Slot::<T>::new(request)) as Arc<dyn ErasedSlot>)
            .clone();
        drop(slots);

        let slot = match erased.into_any().downcast::<Slot<T>>() {
            Ok(slot) => slot,
            // Keyed by TypeId, so the downcast always matches.
            Err(_) => unreachable!("cache slot type mismatch"),
        };

        Query {
            slot,
            transport: self.inner.transport.clone(),
        }
    }

    /// Number of entries created so far.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a background refresh of every entry whose key starts with `prefix`.
    ///
    /// Returns the number of fetches started.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let matching: Vec<Arc<dyn ErasedSlot>> = self
            .slots()
            .values()
            .filter(|slot| slot.key().starts_with(prefix))
            .cloned()
            .collect();

        let started = matching
            .into_iter()
            .filter(|slot| slot.clone().refetch(self.inner.transport.clone()))
            .count();
        tracing::debug!("Invalidated {} entries under {}", started, prefix);
        started
    }
}

/// Typed handle on one cache entry.
pub struct Query<T> {
    slot: Arc<Slot<T>>,
    transport: Arc<dyn Transport>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T> Query<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn key(&self) -> &RequestKey {
        &self.slot.key
    }

    pub fn request(&self) -> &QueryRequest {
        &self.slot.request
    }

    /// Snapshot of the entry.
    pub fn entry(&self) -> CacheEntry<T> {
        self.slot.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.slot.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.slot.state.borrow().error.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.slot.state.borrow().is_fetching
    }

    pub fn version(&self) -> u64 {
        self.slot.state.borrow().version
    }

    /// Subscribe to entry changes.
    pub fn subscribe(&self) -> watch::Receiver<CacheEntry<T>> {
        self.slot.state.subscribe()
    }

    /// Start a fetch unless one is already in flight or the request lacks required params.
    ///
    /// Returns whether a fetch was started. Fire-and-forget: the result lands on the entry.
    pub fn ensure_fetched(&self) -> bool {
        spawn_if_idle(self.slot.clone(), self.transport.clone())
    }

    /// Force a new fetch and wait for that fetch specifically.
    ///
    /// Dropping the returned future does not cancel the fetch; its result is still applied.
    pub async fn wait_fresh_response(&self) -> Result<Arc<T>, ErrorInfo> {
        if !self.slot.request.can_fetch() {
            return Err(ErrorInfo::new(format!(
                "Missing required parameters for {}",
                self.slot.key
            )));
        }
        let generation = self.slot.begin_forced();
        let slot = self.slot.clone();
        let transport = self.transport.clone();
        tokio::spawn(slot.run(transport, generation))
            .await
            .map_err(|e| ErrorInfo::new(format!("Fetch task failed: {}", e)))?
    }
}

/// A cache entry a derived view can depend on.
pub trait Dependency: Send + Sync {
    /// Data version; changes whenever the underlying data is replaced.
    fn version(&self) -> u64;
    /// Resolves on the next published change.
    fn changed(&self) -> BoxFuture<'static, ()>;
}

impl<T> Dependency for Query<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn version(&self) -> u64 {
        Query::version(self)
    }

    fn changed(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.subscribe();
        Box::pin(async move {
            let _ = rx.changed().await;
        })
    }
}

/// Object-safe handle for joining refreshes of differently typed queries.
pub trait Refreshable: Send + Sync {
    fn refresh(&self) -> BoxFuture<'static, Result<(), ErrorInfo>>;
}

impl<T> Refreshable for Query<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn refresh(&self) -> BoxFuture<'static, Result<(), ErrorInfo>> {
        let query = self.clone();
        Box::pin(async move { query.wait_fresh_response().await.map(|_| ()) })
    }
}

/// Refresh several queries together (pull-to-refresh).
///
/// Every query is refreshed even if some fail; the first error is returned.
pub async fn refresh_all(queries: &[&dyn Refreshable]) -> Result<(), ErrorInfo> {
    let results = join_all(queries.iter().map(|q| q.refresh())).await;
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    fn request() -> QueryRequest {
        QueryRequest::new("https://api", "/payload")
            .param("address", "astra1x")
            .require("address")
    }

    #[tokio::test]
    async fn test_get_creates_empty_entry_without_fetching() {
        let transport = Arc::new(MockTransport::new());
        let cache = QueryCache::new(transport.clone());

        let query = cache.query::<Payload>(request());
        let entry = query.entry();
        assert!(entry.data.is_none());
        assert!(entry.error.is_none());
        assert!(!entry.is_fetching);
        assert!(entry.last_fetched_at.is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(transport.calls(&request().url()), 0);
    }

    #[tokio::test]
    async fn test_same_request_shares_entry() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&request().url(), json!({"value": 7}));
        let cache = QueryCache::new(transport);

        let a = cache.query::<Payload>(request());
        a.wait_fresh_response().await.unwrap();

        let b = cache.query::<Payload>(request());
        assert_eq!(b.data().map(|d| d.value), Some(7));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let transport = Arc::new(MockTransport::new());
        let release = transport.respond_gated(&request().url());
        let cache = QueryCache::new(transport.clone());
        let query = cache.query::<Payload>(request());
        let mut rx = query.subscribe();

        assert!(query.ensure_fetched());
        for _ in 0..9 {
            assert!(!query.ensure_fetched());
        }
        assert!(query.is_fetching());

        release.send(Ok(json!({"value": 1}))).unwrap();
        while rx.borrow_and_update().is_fetching {
            rx.changed().await.unwrap();
        }

        assert_eq!(transport.calls(&request().url()), 1);
        assert_eq!(query.data().map(|d| d.value), Some(1));
    }

    #[tokio::test]
    async fn test_ensure_fetched_respects_can_fetch() {
        let transport = Arc::new(MockTransport::new());
        let cache = QueryCache::new(transport.clone());
        let empty = QueryRequest::new("https://api", "/payload")
            .param("address", "")
            .require("address");
        let query = cache.query::<Payload>(empty.clone());

        assert!(!query.ensure_fetched());
        assert!(query.wait_fresh_response().await.is_err());
        assert_eq!(transport.calls(&empty.url()), 0);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&request().url(), json!({"value": 5}));
        transport.fail(&request().url(), ChainError::Status { status: 503, url: request().url() });
        let cache = QueryCache::new(transport);
        let query = cache.query::<Payload>(request());

        query.wait_fresh_response().await.unwrap();
        let err = query.wait_fresh_response().await.unwrap_err();
        assert_eq!(err.status, Some(503));

        let entry = query.entry();
        assert_eq!(entry.data.map(|d| d.value), Some(5));
        assert!(entry.error.is_some());
        assert!(!entry.is_fetching);
    }

    #[tokio::test]
    async fn test_success_clears_error() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(&request().url(), ChainError::Transport("timeout".into()));
        transport.respond(&request().url(), json!({"value": 9}));
        let cache = QueryCache::new(transport);
        let query = cache.query::<Payload>(request());

        assert!(query.wait_fresh_response().await.is_err());
        assert!(query.error().is_some());
        query.wait_fresh_response().await.unwrap();
        assert!(query.error().is_none());
        assert_eq!(query.version(), 1);
    }

    #[tokio::test]
    async fn test_decode_error_is_recorded() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&request().url(), json!({"unexpected": true}));
        let cache = QueryCache::new(transport);
        let query = cache.query::<Payload>(request());

        let err = query.wait_fresh_response().await.unwrap_err();
        assert!(err.message.contains("Decode"));
        assert!(query.data().is_none());
    }

    #[tokio::test]
    async fn test_fresh_response_is_not_satisfied_by_older_fetch() {
        let transport = Arc::new(MockTransport::new());
        let release_a = transport.respond_gated(&request().url());
        let release_b = transport.respond_gated(&request().url());
        let cache = QueryCache::new(transport.clone());
        let query = cache.query::<Payload>(request());

        // Fetch A: ambient.
        assert!(query.ensure_fetched());
        // Fetch B: forced, issued while A is outstanding.
        let waiter = {
            let query = query.clone();
            tokio::spawn(async move { query.wait_fresh_response().await })
        };
        while transport.calls(&request().url()) < 2 {
            tokio::task::yield_now().await;
        }

        // B completes first, then A.
        release_b.send(Ok(json!({"value": 2}))).unwrap();
        let fresh = waiter.await.unwrap().unwrap();
        assert_eq!(fresh.value, 2);

        let mut rx = query.subscribe();
        release_a.send(Ok(json!({"value": 1}))).unwrap();
        while rx.borrow_and_update().is_fetching {
            rx.changed().await.unwrap();
        }

        // The older response did not overwrite the newer data.
        assert_eq!(query.data().map(|d| d.value), Some(2));
        assert_eq!(query.version(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&request().url(), json!({"value": 3}));
        let cache = QueryCache::new(transport);
        let query = cache.query::<Payload>(request());
        let mut rx = query.subscribe();

        query.wait_fresh_response().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().data.as_ref().map(|d| d.value), Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_refetches() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_always(&request().url(), json!({"value": 4}));
        let other = QueryRequest::new("https://other", "/payload");
        transport.respond_always(&other.url(), json!({"value": 8}));
        let cache = QueryCache::new(transport.clone());
        let query = cache.query::<Payload>(request());
        let _other = cache.query::<Payload>(other.clone());

        assert_eq!(cache.invalidate("https://api/"), 1);
        let mut rx = query.subscribe();
        while rx.borrow_and_update().data.is_none() {
            rx.changed().await.unwrap();
        }
        assert_eq!(transport.calls(&request().url()), 1);
        assert_eq!(transport.calls(&other.url()), 0);
    }

    #[tokio::test]
    async fn test_refresh_all_joins() {
        let transport = Arc::new(MockTransport::new());
        let other = QueryRequest::new("https://api", "/other");
        transport.respond(&request().url(), json!({"value": 1}));
        transport.respond(&other.url(), json!({"value": 2}));
        let cache = QueryCache::new(transport);
        let a = cache.query::<Payload>(request());
        let b = cache.query::<Payload>(other);

        refresh_all(&[&a, &b]).await.unwrap();
        assert_eq!(a.data().map(|d| d.value), Some(1));
        assert_eq!(b.data().map(|d| d.value), Some(2));
    }
}
