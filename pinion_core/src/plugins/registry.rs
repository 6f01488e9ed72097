//! Factory map from manifest plugin names to constructors.

use std::collections::BTreeMap;
use tracing::debug;

use super::traits::Plugin;
use crate::error::{PinionError, PinionResult};

type Constructor = Box<dyn Fn() -> Box<dyn Plugin>>;

/// Plugin implementations known to this build, keyed by manifest `name`.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, Constructor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor. Names must be unique.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> PinionResult<()>
    where
        F: Fn() -> Box<dyn Plugin> + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(PinionError::duplicate("Plugin", name));
        }
        debug!("Registered plugin factory: {}", name);
        self.factories.insert(name, Box::new(constructor));
        Ok(())
    }

    /// Build a fresh instance, or `None` for an unknown name.
    pub fn create(&self, name: &str) -> Option<Box<dyn Plugin>> {
        self.factories.get(name).map(|constructor| constructor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
