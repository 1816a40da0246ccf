use std::time::Duration;

use kubedeck_types::CacheConfig;

use crate::KeyPattern;

/// How a resource class ages in the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceClass {
    /// Ordinary resources: configmaps, secrets, workloads, ...
    Standard,
    /// Operational status: operators and cluster health
    Status,
}

/// When cached data counts as stale, and whether it refreshes on a timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Data older than this is refetched on the next subscribe
    pub stale_time: Duration,

    /// Refetch unconditionally at this period while subscribed
    pub refetch_interval: Option<Duration>,
}

impl StalenessPolicy {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            refetch_interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }
}

/// Staleness policy per resource class
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicies {
    pub standard: StalenessPolicy,
    pub status: StalenessPolicy,
}

impl CachePolicies {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            standard: StalenessPolicy::new(config.stale_time()),
            status: StalenessPolicy {
                stale_time: config.status_stale_time(),
                refetch_interval: config.status_refetch_interval(),
            },
        }
    }

    pub fn for_class(&self, class: ResourceClass) -> StalenessPolicy {
        match class {
            ResourceClass::Standard => self.standard,
            ResourceClass::Status => self.status,
        }
    }
}

impl Default for CachePolicies {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Cache keys a mutation affects
///
/// Applied by [`crate::QueryClient::apply`] after each successful mutation,
/// never after a failed one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvalidationPolicy {
    patterns: Vec<KeyPattern>,
}

impl InvalidationPolicy {
    /// Invalidate nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Every cached read of `kind`, in every namespace
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::none().and(KeyPattern::kind(kind))
    }

    pub fn and(mut self, pattern: KeyPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn patterns(&self) -> &[KeyPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyScope, QueryKey};
    use kubedeck_k8s::Verb;

    #[test]
    fn test_default_classes() {
        let policies = CachePolicies::default();
        assert_eq!(
            policies.for_class(ResourceClass::Standard),
            StalenessPolicy::new(Duration::from_secs(30))
        );
        let status = policies.for_class(ResourceClass::Status);
        assert_eq!(status.stale_time, Duration::ZERO);
        assert_eq!(status.refetch_interval, Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_kind_policy_matches_lists_and_reads() {
        let policy = InvalidationPolicy::kind("DaemonSet");
        let list = QueryKey::new("DaemonSet", Verb::List, KeyScope::AllNamespaces);
        let read = QueryKey::new(
            "DaemonSet",
            Verb::Read,
            KeyScope::Namespace("default".to_string()),
        )
        .with_name("nginx-daemonset");
        let other = QueryKey::new("ConfigMap", Verb::List, KeyScope::AllNamespaces);

        let matches = |key: &QueryKey| policy.patterns().iter().any(|p| p.matches(key));
        assert!(matches(&list));
        assert!(matches(&read));
        assert!(!matches(&other));
        assert!(InvalidationPolicy::none().is_empty());
    }
}
