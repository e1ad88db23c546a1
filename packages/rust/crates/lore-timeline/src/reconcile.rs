//! Writing parsed summaries into a knowledge base.

use crate::entry::host_entry_defaults;
use crate::{
    EntryDefaults, EntryId, EntryIdAllocator, EntryKind, KnowledgeBase, KnowledgeEntry, LoreError,
    ParsedSummary, ReconcileAction, ReconcileOutcome, ReconcilePolicy,
};

/// Separator placed between an existing body and appended text.
///
/// Kept visible so the append boundary can be cleaned up by hand.
pub const APPEND_SEPARATOR: &str = "\n\n---\n\n";

/// Applies parsed summaries to a knowledge base.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    defaults: &'a EntryDefaults,
    allocator: &'a EntryIdAllocator,
}

impl<'a> Reconciler<'a> {
    /// Reconciler using `defaults` for created entries and `allocator` for their ids.
    #[must_use]
    pub fn new(defaults: &'a EntryDefaults, allocator: &'a EntryIdAllocator) -> Self {
        Self {
            defaults,
            allocator,
        }
    }

    /// Apply `parsed` to `kb` according to `policy`.
    ///
    /// `target` is ignored by the create policies. On error `kb` is left
    /// untouched.
    pub fn reconcile(
        &self,
        kb: &mut KnowledgeBase,
        target: Option<EntryId>,
        parsed: &ParsedSummary,
        policy: ReconcilePolicy,
    ) -> Result<ReconcileOutcome, LoreError> {
        let outcome = match policy {
            ReconcilePolicy::CreateNew { kind } => {
                let mut entry = self.new_entry(kb, parsed, kind);
                entry.is_keyword_triggered = true;
                entry.extend_keywords(&parsed.keywords);
                entry.title = parsed
                    .title
                    .clone()
                    .or_else(|| entry.trigger_keywords.first().cloned())
                    .unwrap_or_else(|| self.defaults.fallback_title.clone());
                insert_created(kb, entry)
            }
            ReconcilePolicy::CreateAlwaysActive { kind } => {
                let mut entry = self.new_entry(kb, parsed, kind);
                entry.make_always_active();
                entry.title = parsed
                    .title
                    .clone()
                    .unwrap_or_else(|| self.defaults.always_active_title.clone());
                insert_created(kb, entry)
            }
            ReconcilePolicy::AppendToExisting => {
                let entry = target_entry(kb, target)?;
                if entry.body.trim().is_empty() {
                    entry.body.clone_from(&parsed.body);
                } else {
                    entry.body.push_str(APPEND_SEPARATOR);
                    entry.body.push_str(&parsed.body);
                }
                ReconcileOutcome {
                    entry_id: entry.id,
                    action: ReconcileAction::Appended,
                }
            }
            ReconcilePolicy::ReplaceExisting => {
                let entry = target_entry(kb, target)?;
                entry.body.clone_from(&parsed.body);
                ReconcileOutcome {
                    entry_id: entry.id,
                    action: ReconcileAction::Replaced,
                }
            }
        };

        tracing::info!(
            entry_id = %outcome.entry_id,
            action = ?outcome.action,
            entries = kb.len(),
            "reconciled summary into lorebook"
        );
        Ok(outcome)
    }

    fn new_entry(
        &self,
        kb: &KnowledgeBase,
        parsed: &ParsedSummary,
        kind: EntryKind,
    ) -> KnowledgeEntry {
        let id = self.allocator.allocate(kb);
        let mut entry = KnowledgeEntry::new(id, String::new(), parsed.body.clone());
        entry.kind = kind;
        entry.order = self.defaults.order;
        entry.position = self.defaults.position;
        entry.depth = self.defaults.depth;
        entry.extra = host_entry_defaults(kb.len());
        entry
    }
}

/// Apply `parsed` with default entry fields and the process-wide id allocator.
pub fn reconcile(
    kb: &mut KnowledgeBase,
    target: Option<EntryId>,
    parsed: &ParsedSummary,
    policy: ReconcilePolicy,
) -> Result<ReconcileOutcome, LoreError> {
    let defaults = EntryDefaults::default();
    Reconciler::new(&defaults, EntryIdAllocator::process()).reconcile(kb, target, parsed, policy)
}

fn insert_created(kb: &mut KnowledgeBase, entry: KnowledgeEntry) -> ReconcileOutcome {
    let entry_id = entry.id;
    kb.insert(entry);
    ReconcileOutcome {
        entry_id,
        action: ReconcileAction::Created,
    }
}

fn target_entry(
    kb: &mut KnowledgeBase,
    target: Option<EntryId>,
) -> Result<&mut KnowledgeEntry, LoreError> {
    let id = target.ok_or(LoreError::MissingTarget)?;
    kb.get_mut(id).ok_or(LoreError::EntryNotFound(id))
}
