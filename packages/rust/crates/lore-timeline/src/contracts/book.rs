use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EntryId, KnowledgeEntry};

/// One named lorebook, loaded and saved wholesale.
///
/// There is no partial write: whoever saves last wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Entries keyed by id.
    #[serde(default)]
    pub entries: BTreeMap<EntryId, KnowledgeEntry>,
    /// Top-level host fields this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the knowledge base has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry with `id` exists.
    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Look up one entry.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&KnowledgeEntry> {
        self.entries.get(&id)
    }

    /// Look up one entry for mutation.
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut KnowledgeEntry> {
        self.entries.get_mut(&id)
    }

    /// Insert an entry under its own id, replacing any previous one.
    pub fn insert(&mut self, entry: KnowledgeEntry) -> Option<KnowledgeEntry> {
        self.entries.insert(entry.id, entry)
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.values()
    }
}
