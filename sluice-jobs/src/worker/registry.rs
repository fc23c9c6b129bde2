//! Worker registry
//!
//! Maps worker names to their specs. Lookup ignores case.

use std::collections::BTreeMap;

use thiserror::Error;

use super::WorkerSpec;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown worker '{0}'")]
    UnknownWorker(String),
}

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<String, WorkerSpec>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker, replacing one with the same name
    pub fn register(&mut self, spec: WorkerSpec) {
        self.workers.insert(spec.name.to_ascii_lowercase(), spec);
    }

    pub fn with(mut self, spec: WorkerSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<&WorkerSpec, RegistryError> {
        self.workers
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| RegistryError::UnknownWorker(name.to_string()))
    }

    /// All registered workers, ordered by name
    pub fn specs(&self) -> impl Iterator<Item = &WorkerSpec> {
        self.workers.values()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
