use std::collections::HashMap;

use crate::error::{ModuleError, ModuleResult};
use crate::ingest::{SourceModule, SyntheticSource};
use crate::track::BlobTrackerModule;

use super::{Module, ModuleDescription};

type Constructor = fn() -> Box<dyn Module>;

/// Registry of module constructors keyed by module name.
pub struct ModuleFactory {
    constructors: HashMap<String, Constructor>,
}

impl Default for ModuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Factory with every module shipped by this crate.
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(SyntheticSource::MODULE_NAME, synthetic_source);
        factory.register(BlobTrackerModule::MODULE_NAME, blob_tracker);
        factory
    }

    /// Register a constructor. Re-registering a name replaces it.
    pub fn register(&mut self, name: &str, constructor: Constructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build a fresh module in the `Created` state.
    pub fn create(&self, name: &str) -> ModuleResult<Box<dyn Module>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ModuleError::configuration(format!("unknown module '{}'", name)))?;
        let module = constructor();
        log::debug!("created module {} ({})", module.id(), name);
        Ok(module)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Describe a module type from a throwaway instance with default properties.
    pub fn describe(&self, name: &str) -> ModuleResult<ModuleDescription> {
        Ok(self.create(name)?.describe())
    }
}

fn synthetic_source() -> Box<dyn Module> {
    Box::new(SourceModule::new(SyntheticSource::default()))
}

fn blob_tracker() -> Box<dyn Module> {
    Box::new(BlobTrackerModule::new())
}
