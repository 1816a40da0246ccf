use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{info, warn};

use kubedeck_transport::ApiError;

use crate::{InvalidationPolicy, QueryClient};

/// Lifecycle of a write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Outcome of the most recent call
#[derive(Debug)]
pub struct MutationState<O> {
    pub status: MutationStatus,
    pub data: Option<Arc<O>>,
    pub error: Option<Arc<ApiError>>,
}

impl<O> Clone for MutationState<O> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<O> Default for MutationState<O> {
    fn default() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
        }
    }
}

type Runner<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, ApiError>> + Send + Sync>;

/// A write operation bound to the cache keys it affects
///
/// Every successful call applies the invalidation policy, so active
/// queries of the affected kinds refetch. Failed calls leave the cache
/// untouched.
pub struct Mutation<I, O> {
    name: String,
    client: QueryClient,
    run: Runner<I, O>,
    policy: InvalidationPolicy,
    state: Arc<Mutex<MutationState<O>>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            client: self.client.clone(),
            run: Arc::clone(&self.run),
            policy: self.policy.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    /// Create a new mutation named after the operation it performs
    pub fn new<F, Fut>(name: impl Into<String>, client: QueryClient, policy: InvalidationPolicy, run: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            client,
            run: Arc::new(move |input: I| run(input).boxed()),
            policy,
            state: Arc::new(Mutex::new(MutationState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &InvalidationPolicy {
        &self.policy
    }

    /// Run the write and, on success, invalidate the affected queries
    pub async fn mutate(&self, input: impl Into<I>) -> Result<Arc<O>, Arc<ApiError>> {
        {
            let mut state = self.state.lock();
            state.status = MutationStatus::Pending;
            state.error = None;
        }

        match (self.run)(input.into()).await {
            Ok(output) => {
                let output = Arc::new(output);
                {
                    let mut state = self.state.lock();
                    state.status = MutationStatus::Success;
                    state.data = Some(Arc::clone(&output));
                }
                let invalidated = self.client.apply(&self.policy);
                info!(mutation = %self.name, invalidated, "mutation succeeded");
                Ok(output)
            }
            Err(err) => {
                warn!(mutation = %self.name, error = %err, "mutation failed");
                let err = Arc::new(err);
                let mut state = self.state.lock();
                state.status = MutationStatus::Error;
                state.data = None;
                state.error = Some(Arc::clone(&err));
                Err(err)
            }
        }
    }

    pub fn state(&self) -> MutationState<O> {
        self.state.lock().clone()
    }

    /// Forget the last outcome
    pub fn reset(&self) {
        *self.state.lock() = MutationState::default();
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("status", &self.state.lock().status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyScope, QueryKey, ResourceClass};
    use kubedeck_k8s::Verb;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn subscribe_counting(client: &QueryClient, kind: &str, calls: &Arc<AtomicUsize>) -> crate::Query<usize> {
        let calls = Arc::clone(calls);
        client.subscribe(
            QueryKey::new(kind, Verb::List, KeyScope::AllNamespaces),
            ResourceClass::Standard,
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, ApiError>(n) }
            },
        )
    }

    #[tokio::test]
    async fn test_success_invalidates_policy_kinds() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut query = subscribe_counting(&client, "Secret", &calls);
        query.settled().await;

        let create = Mutation::new(
            "create_secret",
            client.clone(),
            InvalidationPolicy::kind("Secret"),
            |name: String| async move { Ok::<_, ApiError>(name) },
        );

        let out = create.mutate("db-password").await.unwrap();
        assert_eq!(out.as_str(), "db-password");
        assert_eq!(create.state().status, MutationStatus::Success);

        let state = query.settled().await;
        assert_eq!(*state.data.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_alone() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut query = subscribe_counting(&client, "DaemonSet", &calls);
        query.settled().await;

        let delete = Mutation::new(
            "delete_daemon_set",
            client.clone(),
            InvalidationPolicy::kind("DaemonSet"),
            |_: String| async { Err::<(), _>(ApiError::from_response(500, b"")) },
        );

        let err = delete.mutate("nginx-daemonset").await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        let state = delete.state();
        assert_eq!(state.status, MutationStatus::Error);
        assert!(state.data.is_none());
        assert!(!query.state().is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        delete.reset();
        assert_eq!(delete.state().status, MutationStatus::Idle);
        assert!(delete.state().error.is_none());
    }
}
