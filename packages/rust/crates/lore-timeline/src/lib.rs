//! Lorebook timeline core: turn chat history into lorebook entries.
//!
//! Pipeline, each stage a pure function except the last:
//! - [`extract`]: select a slice of chat turns and render a transcript.
//! - [`build_prompt`]: wrap the transcript in a fixed instruction template.
//! - [`parse`]: read the model completion (JSON, `KEYWORDS:` header, or raw text).
//! - [`reconcile`]: create, append to, or replace an entry in a [`KnowledgeBase`].
//!
//! Loading, generation and saving belong to the caller.

mod config;
mod contracts;
mod entry;
mod error;
mod id;
mod parser;
mod prompt;
mod reconcile;
mod turn;
mod window;

pub use config::EntryDefaults;
pub use contracts::{
    KnowledgeBase, ParsedSummary, ReconcileAction, ReconcileOutcome, ReconcilePolicy,
};
pub use entry::{EntryId, EntryKind, KnowledgeEntry};
pub use error::LoreError;
pub use id::EntryIdAllocator;
pub use parser::{parse, parse_events, split_keywords};
pub use prompt::{PromptMode, build_note_update_prompt, build_prompt};
pub use reconcile::{APPEND_SEPARATOR, Reconciler, reconcile};
pub use turn::ChatTurn;
pub use window::{ContextSelector, ContextWindow, extract};
