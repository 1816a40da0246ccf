use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kubedeck_transport::ApiError;

use crate::query::{Query, QueryStatus};
use crate::{CachePolicies, InvalidationPolicy, KeyPattern, QueryKey, ResourceClass, StalenessPolicy};

pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyData, ApiError>> + Send + Sync>;

/// What subscribers of an entry observe
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub status: QueryStatus,
    pub is_fetching: bool,
    pub data: Option<AnyData>,
    pub error: Option<Arc<ApiError>>,
    pub updated_at: Option<Instant>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            is_fetching: false,
            data: None,
            error: None,
            updated_at: None,
        }
    }
}

#[derive(Default)]
struct EntryState {
    subscribers: usize,
    in_flight: bool,

    /// Another fetch was requested while one was running
    refetch_pending: bool,

    /// Marked stale by an invalidation
    invalidated: bool,

    /// When data last arrived; errors leave it unset
    data_updated_at: Option<Instant>,

    interval_started: bool,
}

/// One cache slot
pub(crate) struct Entry {
    pub key: QueryKey,
    policy: StalenessPolicy,
    fetcher: Fetcher,
    state: Mutex<EntryState>,
    tx: watch::Sender<Snapshot>,
    cancel: CancellationToken,
}

impl Entry {
    fn new(key: QueryKey, policy: StalenessPolicy, fetcher: Fetcher) -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            key,
            policy,
            fetcher,
            state: Mutex::new(EntryState::default()),
            tx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    fn is_stale(&self, state: &EntryState) -> bool {
        state.invalidated
            || state
                .data_updated_at
                .is_none_or(|at| at.elapsed() >= self.policy.stale_time)
    }

    /// Start a fetch unless one is running; a running one is followed by
    /// another when `force` is set
    fn fetch(self: &Arc<Self>, force: bool) {
        if self.cancel.is_cancelled() {
            return;
        }

        {
            let mut state = self.state.lock();
            if state.in_flight {
                state.refetch_pending |= force;
                return;
            }
            state.in_flight = true;
        }

        self.tx.send_modify(|snap| {
            snap.is_fetching = true;
            if snap.status == QueryStatus::Idle {
                snap.status = QueryStatus::Loading;
            }
        });

        debug!(key = %self.key, "fetching");
        let entry = Arc::clone(self);
        tokio::spawn(async move {
            let result = (entry.fetcher)().await;
            entry.finish(result);
        });
    }

    fn finish(self: &Arc<Self>, result: Result<AnyData, ApiError>) {
        if self.cancel.is_cancelled() {
            debug!(key = %self.key, "dropping result of discarded query");
            return;
        }

        let now = Instant::now();
        let refetch = {
            let mut state = self.state.lock();
            state.in_flight = false;
            state.invalidated = false;
            state.data_updated_at = result.is_ok().then_some(now);
            std::mem::take(&mut state.refetch_pending)
        };

        match result {
            Ok(data) => {
                debug!(key = %self.key, "fetch succeeded");
                self.tx.send_modify(|snap| {
                    snap.status = QueryStatus::Success;
                    snap.data = Some(data);
                    snap.error = None;
                    snap.is_fetching = refetch;
                    snap.updated_at = Some(now);
                });
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "fetch failed");
                self.tx.send_modify(|snap| {
                    snap.status = QueryStatus::Error;
                    snap.data = None;
                    snap.error = Some(Arc::new(err));
                    snap.is_fetching = refetch;
                    snap.updated_at = Some(now);
                });
            }
        }

        if refetch {
            self.fetch(false);
        }
    }

    fn start_interval(self: &Arc<Self>, period: Duration) {
        let weak: Weak<Entry> = Arc::downgrade(self);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,

                    _ = ticker.tick() => {
                        let Some(entry) = weak.upgrade() else { break };
                        debug!(key = %entry.key, "interval refetch");
                        entry.fetch(true);
                    }
                }
            }
        });
    }
}

struct Inner {
    entries: RwLock<HashMap<QueryKey, Arc<Entry>>>,
    policies: CachePolicies,
}

/// Shared cache of query results
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(policies: CachePolicies) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                policies,
            }),
        }
    }

    pub fn policies(&self) -> &CachePolicies {
        &self.inner.policies
    }

    /// Subscribe to a key, fetching with `fetch` when nothing fresh is cached
    ///
    /// The first subscriber creates the entry and its fetcher; later
    /// subscribers share both. Must be called inside a tokio runtime.
    pub fn subscribe<T, F, Fut>(&self, key: QueryKey, class: ResourceClass, fetch: F) -> Query<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let policy = self.inner.policies.for_class(class);

        let (entry, created) = {
            let mut entries = self.inner.entries.write();
            let mut created = false;
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| {
                    created = true;
                    let fetcher: Fetcher = Arc::new(move || {
                        let fut = fetch();
                        async move { fut.await.map(|data| Arc::new(data) as AnyData) }.boxed()
                    });
                    Arc::new(Entry::new(key, policy, fetcher))
                })
                .clone();
            entry.state.lock().subscribers += 1;
            (entry, created)
        };

        if created {
            debug!(key = %entry.key, "created query");
        }

        // Subscribe before fetching so the receiver sees every transition
        let query = Query::new(self.clone(), Arc::clone(&entry));

        let (stale, start_interval) = {
            let mut state = entry.state.lock();
            let stale = !state.in_flight && entry.is_stale(&state);
            let start_interval =
                entry.policy.refetch_interval.is_some() && !state.interval_started;
            state.interval_started = true;
            (stale, start_interval)
        };

        if stale {
            entry.fetch(false);
        }
        if let (true, Some(period)) = (start_interval, entry.policy.refetch_interval) {
            entry.start_interval(period);
        }

        query
    }

    /// Force a refetch of one entry
    pub(crate) fn refetch(&self, entry: &Arc<Entry>) {
        entry.fetch(true);
    }

    /// Drop one subscription; the last one discards the entry
    pub(crate) fn release(&self, entry: &Arc<Entry>) {
        let mut entries = self.inner.entries.write();
        let remaining = {
            let mut state = entry.state.lock();
            state.subscribers = state.subscribers.saturating_sub(1);
            state.subscribers
        };

        if remaining == 0 {
            if entries
                .get(&entry.key)
                .is_some_and(|current| Arc::ptr_eq(current, entry))
            {
                entries.remove(&entry.key);
            }
            entry.cancel.cancel();
            debug!(key = %entry.key, "discarded query");
        }
    }

    /// Mark every matching entry stale and refetch it
    ///
    /// Returns the number of entries matched.
    pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let matched: Vec<Arc<Entry>> = self
            .inner
            .entries
            .read()
            .values()
            .filter(|entry| pattern.matches(&entry.key))
            .cloned()
            .collect();

        for entry in &matched {
            entry.state.lock().invalidated = true;
            entry.fetch(true);
        }

        info!(pattern = %pattern, matched = matched.len(), "invalidated queries");
        matched.len()
    }

    /// Apply a mutation's invalidation policy
    pub fn apply(&self, policy: &InvalidationPolicy) -> usize {
        policy
            .patterns()
            .iter()
            .map(|pattern| self.invalidate(pattern))
            .sum()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(CachePolicies::default())
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.len())
            .field("policies", &self.inner.policies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyScope;
    use kubedeck_k8s::Verb;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(kind: &str) -> QueryKey {
        QueryKey::new(kind, Verb::List, KeyScope::Namespace("default".to_string()))
    }

    /// A fetcher that counts calls and returns the call number
    fn counting(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(n) })
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_is_shared() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut first = client.subscribe(key("ConfigMap"), ResourceClass::Standard, counting(&calls));
        let state = first.settled().await;
        assert_eq!(state.status, QueryStatus::Success);

        let second = client.subscribe(key("ConfigMap"), ResourceClass::Standard, counting(&calls));
        assert!(Arc::ptr_eq(&first.data().unwrap(), &second.data().unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_subscribers_share_one_fetch() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut a = client.subscribe(key("Secret"), ResourceClass::Standard, counting(&calls));
        let mut b = client.subscribe(key("Secret"), ResourceClass::Standard, counting(&calls));
        a.settled().await;
        b.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*a.data().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_release_discards_entry() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut a = client.subscribe(key("Pod"), ResourceClass::Standard, counting(&calls));
        a.settled().await;
        let b = client.subscribe(key("Pod"), ResourceClass::Standard, counting(&calls));

        drop(a);
        assert!(client.contains(&key("Pod")));
        drop(b);
        assert!(!client.contains(&key("Pod")));

        // A new subscriber starts from scratch
        let mut c = client.subscribe(key("Pod"), ResourceClass::Standard, counting(&calls));
        c.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_clears_data_and_stays_stale() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if n == 0 {
                        Ok::<_, ApiError>("first".to_string())
                    } else {
                        Err(ApiError::from_response(500, b""))
                    }
                }) as BoxFuture<'static, Result<String, ApiError>>
            }
        };

        let mut query = client.subscribe(key("Node"), ResourceClass::Standard, fail);
        assert_eq!(query.settled().await.data.as_deref().map(String::as_str), Some("first"));

        query.refetch();
        let state = query.settled().await;
        assert_eq!(state.status, QueryStatus::Error);
        assert!(state.data.is_none());
        assert_eq!(state.error.unwrap().status(), Some(500));
    }

    #[tokio::test]
    async fn test_invalidate_refetches_matching_only() {
        let client = QueryClient::default();
        let cm_calls = Arc::new(AtomicUsize::new(0));
        let secret_calls = Arc::new(AtomicUsize::new(0));

        let mut cms = client.subscribe(key("ConfigMap"), ResourceClass::Standard, counting(&cm_calls));
        let mut secrets = client.subscribe(key("Secret"), ResourceClass::Standard, counting(&secret_calls));
        cms.settled().await;
        secrets.settled().await;

        assert_eq!(client.apply(&InvalidationPolicy::kind("ConfigMap")), 1);
        cms.changed().await;
        let state = cms.settled().await;
        assert_eq!(*state.data.unwrap(), 2);
        assert_eq!(*secrets.data().unwrap(), 1);
        assert_eq!(secret_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidations_during_fetch_queue_one_refetch() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = Arc::new(parking_lot::Mutex::new(Some(gate)));
        let gated = {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let gate = gate.lock().take();
                Box::pin(async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    Ok::<_, ApiError>(n)
                }) as BoxFuture<'static, Result<usize, ApiError>>
            }
        };

        let mut query = client.subscribe(key("ConfigMap"), ResourceClass::Standard, gated);
        assert!(query.state().is_fetching);

        assert_eq!(client.apply(&InvalidationPolicy::kind("ConfigMap")), 1);
        assert_eq!(client.apply(&InvalidationPolicy::kind("ConfigMap")), 1);
        release.send(()).unwrap();

        let state = query.settled().await;
        assert_eq!(*state.data.unwrap(), 2);
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!query.state().is_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_refetch_stops_on_discard() {
        let policies = CachePolicies {
            standard: StalenessPolicy::new(Duration::from_secs(30)),
            status: StalenessPolicy::new(Duration::ZERO).with_interval(Duration::from_secs(20)),
        };
        let client = QueryClient::new(policies);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut health = client.subscribe(key("ClusterHealth"), ResourceClass::Status, counting(&calls));
        health.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(21)).await;
        health.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(20)).await;
        health.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        drop(health);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standard_entries_age_out() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut first = client.subscribe(key("Service"), ResourceClass::Standard, counting(&calls));
        first.settled().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut second = client.subscribe(key("Service"), ResourceClass::Standard, counting(&calls));
        second.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(25)).await;
        let mut third = client.subscribe(key("Service"), ResourceClass::Standard, counting(&calls));
        let state = third.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*state.data.unwrap(), 2);
    }
}
