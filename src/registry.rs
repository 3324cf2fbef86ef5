//! Process-wide provider registry.
//!
//! Lazily registers every built-in factory on first lookup; registration
//! failures are isolated per factory so one broken vendor never prevents
//! the rest from being usable. Reads take a shared lock; writes
//! (`register`/`unregister`/`clear`) take an exclusive one — plain
//! `std::sync::RwLock` over a channel/actor, since this in-process shared
//! state has no need for message-passing.

use std::collections::HashMap;
use std::sync::{Once, RwLock};

use log::warn;

use crate::capability::Capability;
use crate::config::Config;
use crate::error::{LlmError, Result};
use crate::provider::{Provider, ProviderFactory, ProviderInfo};

pub struct Registry {
    factories: RwLock<HashMap<&'static str, Box<dyn ProviderFactory>>>,
    init: Once,
}

impl Registry {
    const fn new() -> Self {
        Registry {
            factories: RwLock::new(HashMap::new()),
            init: Once::new(),
        }
    }

    fn ensure_initialized(&self) {
        self.init.call_once(|| {
            for factory in crate::providers::builtin_factories() {
                let id = factory.provider_id();
                let mut guard = self.factories.write().unwrap_or_else(|e| e.into_inner());
                if guard.insert(id, factory).is_some() {
                    warn!("duplicate built-in provider id '{id}' during registry initialization");
                }
            }
        });
    }

    pub fn register(&self, factory: Box<dyn ProviderFactory>) -> Result<()> {
        self.ensure_initialized();
        let id = factory.provider_id();
        let mut guard = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(id) {
            return Err(LlmError::InvalidRequest(format!("provider '{id}' is already registered")));
        }
        guard.insert(id, factory);
        Ok(())
    }

    pub fn register_or_replace(&self, factory: Box<dyn ProviderFactory>) {
        self.ensure_initialized();
        let id = factory.provider_id();
        let mut guard = self.factories.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(id, factory);
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.ensure_initialized();
        let mut guard = self.factories.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(id).is_some()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.ensure_initialized();
        let guard = self.factories.read().unwrap_or_else(|e| e.into_inner());
        guard.contains_key(id)
    }

    pub fn supports_capability(&self, id: &str, capability: Capability) -> bool {
        self.ensure_initialized();
        let guard = self.factories.read().unwrap_or_else(|e| e.into_inner());
        guard
            .get(id)
            .map(|f| f.supported_capabilities().contains(&capability))
            .unwrap_or(false)
    }

    pub fn get_providers_with_capability(&self, capability: Capability) -> Vec<&'static str> {
        self.ensure_initialized();
        let guard = self.factories.read().unwrap_or_else(|e| e.into_inner());
        guard
            .values()
            .filter(|f| f.supported_capabilities().contains(&capability))
            .map(|f| f.provider_id())
            .collect()
    }

    pub fn create_provider(&self, id: &str, config: Config) -> Result<Box<dyn Provider>> {
        self.ensure_initialized();
        let guard = self.factories.read().unwrap_or_else(|e| e.into_inner());
        let factory = guard
            .get(id)
            .ok_or_else(|| LlmError::NotFound(format!("no provider registered under id '{id}'")))?;

        if !factory.validate_config(&config) {
            return Err(LlmError::InvalidRequest(format!("config is not valid for provider '{id}'")));
        }
        factory.create(config)
    }

    pub fn get_all_provider_info(&self) -> Vec<ProviderInfo> {
        self.ensure_initialized();
        let guard = self.factories.read().unwrap_or_else(|e| e.into_inner());
        guard.values().map(|f| f.info()).collect()
    }

    /// Declarative metadata for a single provider, for building provider
    /// pickers in host applications.
    pub fn provider_info(&self, id: &str) -> Option<ProviderInfo> {
        self.ensure_initialized();
        let guard = self.factories.read().unwrap_or_else(|e| e.into_inner());
        guard.get(id).map(|f| f.info())
    }

    /// Like `create_provider`, but first resolves `config.model` through
    /// `aliases`. An alias with no mapping passes
    /// through verbatim rather than erroring.
    pub fn create_provider_with_aliases(&self, id: &str, config: Config, aliases: &ModelAliases) -> Result<Box<dyn Provider>> {
        let resolved = config.copy_with_model(aliases.resolve(&config.model).to_string());
        self.create_provider(id, resolved)
    }

    /// Test hook: drop every registered factory. The next operation
    /// re-runs built-in initialization as if the registry were fresh,
    /// because `Once` itself is not reset — tests that call this should
    /// re-register what they need explicitly rather than rely on
    /// built-ins reappearing.
    pub fn clear(&self) {
        let mut guard = self.factories.write().unwrap_or_else(|e| e.into_inner());
        guard.clear();
    }
}

static REGISTRY: Registry = Registry::new();

pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Caller-chosen model aliases, resolved before a wire request is built
/// Carried outside `Config` rather than on it,
/// because an alias table is typically shared across many `Config`s
/// rather than owned by one.
#[derive(Debug, Clone, Default)]
pub struct ModelAliases {
    aliases: HashMap<String, String>,
}

impl ModelAliases {
    pub fn new() -> Self {
        ModelAliases::default()
    }

    pub fn with_alias(mut self, alias: impl Into<String>, wire_model_id: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), wire_model_id.into());
        self
    }

    /// Absence of a mapping is not an error; the input passes through
    /// verbatim.
    pub fn resolve<'a>(&'a self, model: &'a str) -> &'a str {
        self.aliases.get(model).map(String::as_str).unwrap_or(model)
    }
}

#[cfg(test)]
mod alias_tests {
    use super::*;

    #[test]
    fn unmapped_alias_passes_through() {
        let aliases = ModelAliases::new().with_alias("fast", "gpt-4o-mini");
        assert_eq!(aliases.resolve("fast"), "gpt-4o-mini");
        assert_eq!(aliases.resolve("gpt-4o"), "gpt-4o");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_not_found() {
        let err = registry().create_provider("definitely-not-a-real-provider", Config::new("https://x", "m"));
        assert!(matches!(err, Err(LlmError::NotFound(_))));
    }
}
