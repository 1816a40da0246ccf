use std::fmt;

use kubedeck_k8s::Verb;
use kubedeck_types::NamespaceSelector;

/// Namespace part of a cache key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyScope {
    Namespace(String),
    AllNamespaces,
    Cluster,
}

impl From<&NamespaceSelector> for KeyScope {
    fn from(selector: &NamespaceSelector) -> Self {
        match selector {
            NamespaceSelector::Named(ns) => KeyScope::Namespace(ns.clone()),
            NamespaceSelector::AllNamespaces => KeyScope::AllNamespaces,
        }
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScope::Namespace(ns) => f.write_str(ns),
            KeyScope::AllNamespaces => f.write_str(kubedeck_types::ALL_NAMESPACES),
            KeyScope::Cluster => f.write_str("cluster"),
        }
    }
}

/// Identity of a cached read
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: String,
    pub verb: Verb,
    pub scope: KeyScope,
    pub name: Option<String>,

    /// Anything else that changes the response, e.g. a log query
    pub discriminator: Option<String>,
}

impl QueryKey {
    pub fn new(kind: impl Into<String>, verb: Verb, scope: KeyScope) -> Self {
        Self {
            kind: kind.into(),
            verb,
            scope,
            name: None,
            discriminator: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.verb, self.scope)?;
        if let Some(name) = &self.name {
            write!(f, "/{}", name)?;
        }
        if let Some(extra) = &self.discriminator {
            write!(f, "?{}", extra)?;
        }
        Ok(())
    }
}

/// Selects cache keys by kind, optionally narrowed by verb and scope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPattern {
    pub kind: String,
    pub verb: Option<Verb>,
    pub scope: Option<KeyScope>,
}

impl KeyPattern {
    /// Every key of a kind, in any namespace
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            verb: None,
            scope: None,
        }
    }

    pub fn verb(mut self, verb: Verb) -> Self {
        self.verb = Some(verb);
        self
    }

    pub fn scope(mut self, scope: KeyScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        self.kind == key.kind
            && self.verb.is_none_or(|verb| verb == key.verb)
            && self.scope.as_ref().is_none_or(|scope| *scope == key.scope)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        match self.verb {
            Some(verb) => write!(f, "/{}", verb)?,
            None => f.write_str("/*")?,
        }
        match &self.scope {
            Some(scope) => write!(f, "/{}", scope),
            None => f.write_str("/*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_key(kind: &str, scope: KeyScope) -> QueryKey {
        QueryKey::new(kind, Verb::List, scope)
    }

    #[test]
    fn test_namespace_is_part_of_identity() {
        let default = list_key("ConfigMap", KeyScope::Namespace("default".to_string()));
        let all = list_key("ConfigMap", KeyScope::AllNamespaces);
        assert_ne!(default, all);
        assert_eq!(default.to_string(), "ConfigMap/list/default");
        assert_eq!(all.to_string(), "ConfigMap/list/_all");
    }

    #[test]
    fn test_pattern_by_kind_covers_every_namespace() {
        let pattern = KeyPattern::kind("ConfigMap");
        assert!(pattern.matches(&list_key(
            "ConfigMap",
            KeyScope::Namespace("default".to_string())
        )));
        assert!(pattern.matches(&list_key("ConfigMap", KeyScope::AllNamespaces)));
        assert!(pattern.matches(
            &QueryKey::new("ConfigMap", Verb::Read, KeyScope::Namespace("x".to_string()))
                .with_name("app-config")
        ));
        assert!(!pattern.matches(&list_key("Secret", KeyScope::AllNamespaces)));
    }

    #[test]
    fn test_narrowed_pattern() {
        let pattern = KeyPattern::kind("Pod")
            .verb(Verb::List)
            .scope(KeyScope::AllNamespaces);
        assert!(pattern.matches(&list_key("Pod", KeyScope::AllNamespaces)));
        assert!(!pattern.matches(&list_key("Pod", KeyScope::Namespace("default".to_string()))));
        assert!(!pattern.matches(&QueryKey::new("Pod", Verb::Watch, KeyScope::AllNamespaces)));
        assert_eq!(pattern.to_string(), "Pod/list/_all");
        assert_eq!(KeyPattern::kind("Pod").to_string(), "Pod/*/*");
    }
}
