//! Configuration loading for the kubedeck binary

use std::path::Path;

use anyhow::{Context, Result};
use kube::config::Kubeconfig;
use tracing::debug;

use kubedeck_types::{DeckConfig, NamespaceSelector};

/// Load the config file, or defaults when there is none
pub fn load(path: Option<&Path>) -> Result<DeckConfig> {
    let Some(path) = path else {
        return Ok(DeckConfig::default());
    };

    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(DeckConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    DeckConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Pick the namespace calls default to
///
/// Priority: command line, config file, current kubeconfig context, then
/// `default`.
pub fn preferred_namespace(
    config: &DeckConfig,
    cli: Option<NamespaceSelector>,
) -> Result<NamespaceSelector> {
    if let Some(selector) = cli {
        return Ok(selector);
    }

    if let Some(selector) = config
        .namespace
        .preferred_selector()
        .context("Invalid preferred namespace in config")?
    {
        return Ok(selector);
    }

    let namespace = match Kubeconfig::read() {
        Ok(kubeconfig) => kubeconfig_namespace(&kubeconfig),
        Err(e) => {
            debug!(error = %e, "no kubeconfig, using the default namespace");
            None
        }
    };

    Ok(NamespaceSelector::Named(
        namespace.unwrap_or_else(|| String::from("default")),
    ))
}

/// Namespace of the current kubeconfig context, if it sets one
fn kubeconfig_namespace(kubeconfig: &Kubeconfig) -> Option<String> {
    let current = kubeconfig.current_context.as_deref()?;
    kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == current)
        .and_then(|c| c.context.as_ref())
        .and_then(|ctx| ctx.namespace.clone())
}
