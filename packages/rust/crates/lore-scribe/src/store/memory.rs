//! In-process lorebook store.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use lore_timeline::KnowledgeBase;

use super::KnowledgeBaseStore;

/// Lorebooks kept in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lorebooks: RwLock<BTreeMap<String, KnowledgeBase>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed one lorebook.
    #[must_use]
    pub fn with_lorebook(self, name: impl Into<String>, kb: KnowledgeBase) -> Self {
        self.lorebooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), kb);
        self
    }

    /// Copy of one stored lorebook.
    #[must_use]
    pub fn snapshot(&self, name: &str) -> Option<KnowledgeBase> {
        self.lorebooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

#[async_trait]
impl KnowledgeBaseStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .lorebooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    async fn load(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        Ok(self.snapshot(name))
    }

    async fn save(&self, name: &str, kb: &KnowledgeBase) -> Result<()> {
        self.lorebooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), kb.clone());
        Ok(())
    }
}
