use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyParam {
    Null,
    Int(i64),
    Text(String),
}

impl From<i32> for KeyParam {
    fn from(v: i32) -> Self {
        KeyParam::Int(v as i64)
    }
}

impl From<u32> for KeyParam {
    fn from(v: u32) -> Self {
        KeyParam::Int(v as i64)
    }
}

impl From<&str> for KeyParam {
    fn from(v: &str) -> Self {
        KeyParam::Text(v.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(v: String) -> Self {
        KeyParam::Text(v)
    }
}

impl<T: Into<KeyParam>> From<Option<T>> for KeyParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(KeyParam::Null)
    }
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParam::Null => f.write_str("null"),
            KeyParam::Int(v) => write!(f, "{v}"),
            KeyParam::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Identity of a cache slot: a resource name plus ordered parameters.
/// Equal tuples share a slot; anything else is a separate slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: &'static str,
    params: Vec<KeyParam>,
}

impl QueryKey {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    pub fn with(mut self, param: impl Into<KeyParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn params(&self) -> &[KeyParam] {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, "[{}]", params.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a successful result is served without a network call.
    pub stale_time: Duration,
    /// A disabled query never fetches and reports no data.
    pub enabled: bool,
}

impl QueryOptions {
    pub fn stale_after(stale_time: Duration) -> Self {
        Self {
            stale_time,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::stale_after(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First load or revalidation of the whole value.
    Refresh,
    /// Appending the next page of an infinite list.
    NextPage,
}

/// Snapshot of one cache slot.
#[derive(Debug)]
pub struct QueryState<V> {
    pub data: Option<Arc<V>>,
    pub error: Option<ApiError>,
    pub fetching: Option<FetchKind>,
    pub updated_at: Option<Instant>,
}

impl<V> QueryState<V> {
    /// Nothing to show yet and a fetch is under way. Stale data never counts
    /// as loading.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.fetching.is_some()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.is_some()
    }

    pub fn is_fetching_next_page(&self) -> bool {
        self.fetching == Some(FetchKind::NextPage)
    }

    pub fn is_idle(&self) -> bool {
        self.data.is_none() && self.error.is_none() && self.fetching.is_none()
    }

    pub fn data(&self) -> Option<&V> {
        self.data.as_deref()
    }
}

impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            fetching: self.fetching,
            updated_at: self.updated_at,
        }
    }
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            fetching: None,
            updated_at: None,
        }
    }
}

struct Slot<V> {
    tx: watch::Sender<QueryState<V>>,
    invalidated: bool,
}

impl<V> Slot<V> {
    fn new() -> Self {
        let (tx, _) = watch::channel(QueryState::default());
        Self {
            tx,
            invalidated: false,
        }
    }

    fn snapshot(&self) -> QueryState<V> {
        self.tx.borrow().clone()
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .tx
                .borrow()
                .updated_at
                .is_some_and(|t| t.elapsed() < stale_time)
    }
}

type Slots<V> = Arc<Mutex<HashMap<QueryKey, Slot<V>>>>;

/// Keyed store of fetched values with in-flight deduplication and
/// stale-while-revalidate reads. Cloning yields another handle to the same
/// store.
pub struct QueryCache<V> {
    slots: Slots<V>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<V: Send + Sync + 'static> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send + Sync + 'static> QueryCache<V> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot<V>>> {
        lock_slots(&self.slots)
    }

    /// Load `key` through `fetcher` unless a fresh value is cached.
    ///
    /// Disabled queries return an idle state without touching the slot. A
    /// stale value is returned at once while a background refetch runs; with
    /// no value at all this waits for the (possibly shared) fetch to finish.
    pub async fn query<F, Fut>(&self, key: QueryKey, options: QueryOptions, fetcher: F) -> QueryState<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        self.run(key, options, move |_| fetcher()).await
    }

    /// Fetch `key` now, ignoring staleness, unless a fetch is already in
    /// flight (in which case that one is awaited).
    pub async fn refetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryState<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let rx = if self.observe(&key).is_fetching() {
            self.subscribe(&key)
        } else {
            self.start(&key, FetchKind::Refresh, fetcher())
                .unwrap_or_else(|| self.subscribe(&key))
        };
        self.settle(&key, rx).await
    }

    pub(crate) async fn run<F, Fut>(&self, key: QueryKey, options: QueryOptions, job: F) -> QueryState<V>
    where
        F: FnOnce(Option<Arc<V>>) -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        if !options.enabled {
            return QueryState::default();
        }
        let current = {
            let mut slots = self.lock();
            let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
            let current = slot.snapshot();
            if !current.is_fetching() && slot.is_fresh(options.stale_time) {
                return current;
            }
            current
        };
        let rx = if current.is_fetching() {
            debug!("Joining in-flight fetch for {}", key);
            self.subscribe(&key)
        } else {
            // Fetchers are built outside the slot lock, so they may read this
            // cache.
            let fut = job(current.data);
            self.start(&key, FetchKind::Refresh, fut)
                .unwrap_or_else(|| self.subscribe(&key))
        };
        let state = rx.borrow().clone();
        if state.data.is_some() {
            return state;
        }
        self.settle(&key, rx).await
    }

    /// Start a fetch planned from the current state, unless one is already in
    /// flight or `plan` declines. Returns the state once the fetch settles.
    pub(crate) async fn run_if<F, Fut>(&self, key: QueryKey, kind: FetchKind, plan: F) -> QueryState<V>
    where
        F: FnOnce(&QueryState<V>) -> Option<Fut>,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let current = {
            let slots = self.lock();
            match slots.get(&key) {
                Some(slot) => slot.snapshot(),
                None => return QueryState::default(),
            }
        };
        if current.is_fetching() {
            return current;
        }
        let Some(fut) = plan(&current) else {
            return current;
        };
        match self.start(&key, kind, fut) {
            Some(rx) => self.settle(&key, rx).await,
            None => self.observe(&key),
        }
    }

    /// Claim the slot for `fut` and spawn it. Returns `None`, dropping `fut`
    /// unpolled, when another fetch claimed the slot first.
    fn start<Fut>(&self, key: &QueryKey, kind: FetchKind, fut: Fut) -> Option<watch::Receiver<QueryState<V>>>
    where
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
        if slot.snapshot().is_fetching() {
            return None;
        }
        spawn_fetch(&self.slots, slot, key, kind, fut);
        Some(slot.tx.subscribe())
    }

    async fn settle(&self, key: &QueryKey, mut rx: watch::Receiver<QueryState<V>>) -> QueryState<V> {
        let settled = rx
            .wait_for(|s| !s.is_fetching())
            .await
            .map(|s| s.clone());
        settled.unwrap_or_else(|_| self.observe(key))
    }

    /// Current state of `key` without fetching.
    pub fn observe(&self, key: &QueryKey) -> QueryState<V> {
        self.lock()
            .get(key)
            .map(Slot::snapshot)
            .unwrap_or_default()
    }

    /// Live view of `key`. Dropping the receiver detaches the observer; any
    /// fetch it was waiting on still completes into the cache.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState<V>> {
        self.lock()
            .entry(key.clone())
            .or_insert_with(Slot::new)
            .tx
            .subscribe()
    }

    /// Mark `key` stale so the next read revalidates regardless of age.
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(slot) = self.lock().get_mut(key) {
            slot.invalidated = true;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn lock_slots<V>(slots: &Slots<V>) -> MutexGuard<'_, HashMap<QueryKey, Slot<V>>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_fetch<V, Fut>(slots: &Slots<V>, slot: &mut Slot<V>, key: &QueryKey, kind: FetchKind, fut: Fut)
where
    V: Send + Sync + 'static,
    Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
{
    slot.tx.send_modify(|s| s.fetching = Some(kind));
    debug!("Fetching {} ({:?})", key, kind);

    let slots = Arc::clone(slots);
    let key = key.clone();
    tokio::spawn(async move {
        let result = match tokio::spawn(fut).await {
            Ok(result) => result,
            Err(e) => Err(ApiError::Transport(format!("fetch task aborted: {e}"))),
        };
        let mut guard = lock_slots(&slots);
        let Some(slot) = guard.get_mut(&key) else {
            return;
        };
        // A failed fetch leaves an invalidated slot stale.
        if result.is_ok() {
            slot.invalidated = false;
        }
        slot.tx.send_modify(|s| {
            s.fetching = None;
            match result {
                Ok(value) => {
                    s.data = Some(Arc::new(value));
                    s.error = None;
                    s.updated_at = Some(Instant::now());
                }
                Err(e) => {
                    warn!("Fetch for {} failed: {}", key, e);
                    s.error = Some(e);
                }
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_structurally() {
        let a = QueryKey::new("discoverMovies").with(Some(28));
        let b = QueryKey::new("discoverMovies").with(Some(28));
        let c = QueryKey::new("discoverMovies").with(Some(35));
        let none = QueryKey::new("discoverMovies").with(None::<i32>);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, none);
        assert_eq!(none.params(), &[KeyParam::Null]);
    }

    #[test]
    fn key_display_lists_params() {
        let key = QueryKey::new("searchMovies").with("alien");
        assert_eq!(key.to_string(), r#"searchMovies["alien"]"#);
        assert_eq!(QueryKey::new("genres").to_string(), "genres");
    }

    #[test]
    fn loading_only_without_data() {
        let mut state = QueryState::<u32> {
            fetching: Some(FetchKind::Refresh),
            ..Default::default()
        };
        assert!(state.is_loading());
        state.data = Some(Arc::new(1));
        assert!(!state.is_loading());
        assert!(state.is_fetching());
        assert!(!state.is_fetching_next_page());
    }
}
