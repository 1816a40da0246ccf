use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Sentinel accepted at the CLI/config boundary for "every namespace"
pub const ALL_NAMESPACES: &str = "_all";

/// DNS-1123 label, the format the control plane accepts for namespace names
static NAMESPACE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

const MAX_NAMESPACE_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    #[error("namespace name must not be empty")]
    Empty,
    #[error("namespace name '{0}' is longer than 63 characters")]
    TooLong(String),
    #[error("namespace name '{0}' is not a valid DNS-1123 label")]
    Invalid(String),
}

/// Which namespace a namespaced read or write targets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceSelector {
    /// A single namespace
    Named(String),
    /// Aggregate across every namespace
    AllNamespaces,
}

impl NamespaceSelector {
    /// Build a selector for one namespace, validating the name
    pub fn named(namespace: impl Into<String>) -> Result<Self, NamespaceError> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(NamespaceSelector::Named(namespace))
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            NamespaceSelector::Named(ns) => Some(ns),
            NamespaceSelector::AllNamespaces => None,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, NamespaceSelector::AllNamespaces)
    }
}

impl FromStr for NamespaceSelector {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == ALL_NAMESPACES {
            Ok(NamespaceSelector::AllNamespaces)
        } else {
            NamespaceSelector::named(s)
        }
    }
}

impl fmt::Display for NamespaceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceSelector::Named(ns) => f.write_str(ns),
            NamespaceSelector::AllNamespaces => f.write_str(ALL_NAMESPACES),
        }
    }
}

fn validate_namespace(name: &str) -> Result<(), NamespaceError> {
    if name.is_empty() {
        return Err(NamespaceError::Empty);
    }
    if name.len() > MAX_NAMESPACE_LEN {
        return Err(NamespaceError::TooLong(name.to_string()));
    }
    if !NAMESPACE_NAME.is_match(name) {
        return Err(NamespaceError::Invalid(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_parses_to_all() {
        let selector: NamespaceSelector = "_all".parse().unwrap();
        assert!(selector.is_all());
        assert_eq!(selector.to_string(), "_all");
    }

    #[test]
    fn test_named_namespace() {
        let selector: NamespaceSelector = "kube-system".parse().unwrap();
        assert_eq!(selector.as_named(), Some("kube-system"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert_eq!("".parse::<NamespaceSelector>(), Err(NamespaceError::Empty));
        assert!(matches!(
            "Default".parse::<NamespaceSelector>(),
            Err(NamespaceError::Invalid(_))
        ));
        assert!(matches!(
            "-leading".parse::<NamespaceSelector>(),
            Err(NamespaceError::Invalid(_))
        ));
        assert!(matches!(
            "a".repeat(64).parse::<NamespaceSelector>(),
            Err(NamespaceError::TooLong(_))
        ));
    }
}
