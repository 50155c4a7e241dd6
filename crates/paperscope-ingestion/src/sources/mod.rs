//! Discovery source interface and registry.
//!
//! Concrete adapters (the per-provider HTTP clients) live outside this core;
//! anything implementing [`SourceAdapter`] can be registered. The
//! orchestrator treats any adapter error as "zero results, logged error".

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::models::BibliographicRecord;

/// Common interface for all discovery sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry name; what research questions select by.
    fn name(&self) -> &str;

    /// Search the source for records matching a query.
    async fn discover(
        &self,
        query: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<BibliographicRecord>>;
}

/// Named adapters, iterated in stable order.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Resolve a question's source selection. `"*"` expands to every
    /// registered source; unrecognized explicit names are dropped with a log
    /// entry, not an error.
    pub fn resolve(&self, selected: &[String]) -> Vec<Arc<dyn SourceAdapter>> {
        if selected.iter().any(|s| s == "*") {
            return self.adapters.values().cloned().collect();
        }

        let mut resolved = Vec::new();
        for name in selected {
            match self.adapters.get(name) {
                Some(adapter) => resolved.push(Arc::clone(adapter)),
                None => warn!(source = %name, "Unknown source in question selection; dropped"),
            }
        }
        resolved
    }
}
