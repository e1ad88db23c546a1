//! Lorebook load/save collaborator.

mod json_dir;
mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lore_timeline::KnowledgeBase;

use crate::StoreSettings;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

/// Wholesale lorebook persistence.
///
/// There is no partial write and no versioning: a load-modify-save cycle
/// is not atomic against other editors of the same lorebook.
#[async_trait]
pub trait KnowledgeBaseStore: Send + Sync {
    /// Backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Names of the stored lorebooks, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    /// Load one lorebook; `Ok(None)` when it does not exist.
    async fn load(&self, name: &str) -> Result<Option<KnowledgeBase>>;

    /// Replace one lorebook with `kb`.
    async fn save(&self, name: &str, kb: &KnowledgeBase) -> Result<()>;
}

/// Build the configured lorebook store.
#[must_use]
pub fn resolve_store(settings: &StoreSettings) -> Arc<dyn KnowledgeBaseStore> {
    let dir = settings.dir();
    tracing::info!(backend = "json_dir", dir = %dir.display(), "resolved lorebook store");
    Arc::new(JsonDirStore::new(dir))
}
