use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use kubedeck_transport::ApiError;

use crate::cache::{Entry, Snapshot};
use crate::{QueryClient, QueryKey};

/// Lifecycle of a cached read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing requested yet
    Idle,
    /// First fetch in progress, no result yet
    Loading,
    Success,
    Error,
}

/// Point-in-time view of a query
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,

    /// Last successful result; cleared by a failed fetch
    pub data: Option<Arc<T>>,

    pub error: Option<Arc<ApiError>>,

    /// A fetch is running, including background refetches
    pub is_fetching: bool,

    /// When the last fetch finished
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    /// No fetch is running and at least one has finished
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && matches!(self.status, QueryStatus::Success | QueryStatus::Error)
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// A live subscription to one cache entry
///
/// Dropping the last `Query` for a key discards the entry and any
/// background refresh attached to it.
pub struct Query<T> {
    client: QueryClient,
    entry: Arc<Entry>,
    rx: watch::Receiver<Snapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Query<T> {
    pub(crate) fn new(client: QueryClient, entry: Arc<Entry>) -> Self {
        let rx = entry.subscribe();
        Self {
            client,
            entry,
            rx,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.entry.key
    }

    /// Current state without waiting
    pub fn state(&self) -> QueryState<T> {
        convert(&self.rx.borrow())
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.state().data
    }

    pub fn error(&self) -> Option<Arc<ApiError>> {
        self.state().error
    }

    /// Wait for the next change and return the new state
    pub async fn changed(&mut self) -> QueryState<T> {
        // The sender lives in the entry we hold, so this cannot fail
        let _ = self.rx.changed().await;
        convert(&self.rx.borrow_and_update())
    }

    /// Wait until no fetch is running and a result is available
    pub async fn settled(&mut self) -> QueryState<T> {
        let result = self
            .rx
            .wait_for(|snap| {
                !snap.is_fetching
                    && matches!(snap.status, QueryStatus::Success | QueryStatus::Error)
            })
            .await;

        let settled = match &result {
            Ok(snap) => Some(convert(snap)),
            Err(_) => None,
        };
        drop(result);

        settled.unwrap_or_else(|| self.state())
    }

    /// Fetch again regardless of staleness
    pub fn refetch(&self) {
        self.client.refetch(&self.entry);
    }
}

fn convert<T: Send + Sync + 'static>(snap: &Snapshot) -> QueryState<T> {
    QueryState {
        status: snap.status,
        data: snap
            .data
            .clone()
            .and_then(|data| data.downcast::<T>().ok()),
        error: snap.error.clone(),
        is_fetching: snap.is_fetching,
        updated_at: snap.updated_at,
    }
}

impl<T> Drop for Query<T> {
    fn drop(&mut self) {
        self.client.release(&self.entry);
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.rx.borrow();
        f.debug_struct("Query")
            .field("key", &self.entry.key.to_string())
            .field("status", &snap.status)
            .field("is_fetching", &snap.is_fetching)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyScope, ResourceClass};
    use kubedeck_k8s::Verb;

    #[tokio::test]
    async fn test_loading_then_success() {
        let client = QueryClient::default();
        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let wait = Arc::new(parking_lot::Mutex::new(Some(wait)));

        let mut query = client.subscribe(
            QueryKey::new("Pod", Verb::List, KeyScope::AllNamespaces),
            ResourceClass::Standard,
            move || {
                let wait = wait.lock().take();
                async move {
                    if let Some(wait) = wait {
                        let _ = wait.await;
                    }
                    Ok::<_, ApiError>(vec!["web-0".to_string()])
                }
            },
        );

        let state = query.state();
        assert_eq!(state.status, QueryStatus::Loading);
        assert!(state.is_fetching);
        assert!(state.data.is_none());
        assert!(!state.is_settled());

        release.send(()).unwrap();
        let state = query.settled().await;
        assert!(state.is_success());
        assert_eq!(state.data.unwrap().as_slice(), ["web-0".to_string()]);
        assert!(state.updated_at.is_some());
        assert_eq!(query.key().to_string(), "Pod/list/_all");
    }

    #[tokio::test]
    async fn test_error_state() {
        let client = QueryClient::default();
        let mut query = client.subscribe(
            QueryKey::new("Node", Verb::List, KeyScope::Cluster),
            ResourceClass::Standard,
            || async { Err::<String, _>(ApiError::from_response(403, b"")) },
        );

        let state = query.settled().await;
        assert!(state.is_error());
        assert!(state.data.is_none());
        assert_eq!(query.error().unwrap().status(), Some(403));
    }
}
