use std::collections::HashMap;
use std::sync::Arc;

use super::error::{ImportError, ImportResult};
use super::provider::ProviderGenerator;
use super::providers::{inventory, InventoryProvider};
use crate::traits::FileSystem;

/// Builds a fresh provider handle
pub type ProviderFactory = Box<dyn Fn() -> Box<dyn ProviderGenerator>>;

/// Registry of the providers the import command can drive
///
/// Providers are registered as factories so that every region gets its own
/// handle and no state leaks from one region to the next.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in provider
    pub fn with_defaults(fs: Arc<dyn FileSystem>) -> Self {
        let mut registry = Self::new();
        registry.register(inventory::PROVIDER_NAME, move || {
            Box::new(InventoryProvider::new(Arc::clone(&fs)))
        });
        registry
    }

    /// Register a provider factory under a name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ProviderGenerator> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Get all registered provider names, sorted
    pub fn registered_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up the factory of a provider
    pub fn factory(&self, name: &str) -> ImportResult<&ProviderFactory> {
        self.factories
            .get(name)
            .ok_or_else(|| ImportError::UnknownProvider(name.to_string()))
    }
}
