//! Error types for the lorebook workflow.
//!
//! Library errors use `thiserror`; collaborator failures arrive as
//! `anyhow::Error` and are wrapped with the stage they happened in.

use lore_timeline::{EntryId, LoreError};
use thiserror::Error;

use crate::WorkflowState;

/// Failures of one guarded workflow run.
///
/// Every variant is local to the run: the busy state is already back to
/// idle when the caller sees it.
#[derive(Error, Debug)]
pub enum ScribeError {
    /// Range or target problem raised by the core pipeline.
    #[error(transparent)]
    Lore(#[from] LoreError),

    /// Another run is in flight; this one was rejected, not queued.
    #[error("a lorebook update is already in progress")]
    Busy,

    /// Settings have the workflow switched off.
    #[error("lorebook scribe is disabled in settings")]
    Disabled,

    /// The named lorebook does not exist in the store.
    #[error("lorebook not found: {0}")]
    StoreNotFound(String),

    /// A new lorebook was requested under a name already in use.
    #[error("lorebook already exists: {0}")]
    LorebookExists(String),

    /// Host-authored entry regenerated without choosing a template.
    #[error("lorebook entry {0} was not written by the scribe; choose a prompt mode")]
    NoPromptMode(EntryId),

    /// Main-timeline run without a configured main lorebook.
    #[error("no main lorebook configured")]
    NoMainLorebook,

    /// Settings name no generation backend.
    #[error("no text generation backend configured")]
    NoGenerationBackend,

    /// The generation collaborator rejected the prompt.
    #[error("text generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),

    /// The event-batch completion contained no usable event.
    #[error("generation produced no timeline events")]
    NoEvents,

    /// Loading a lorebook failed for a reason other than absence.
    #[error("loading lorebook {lorebook} failed: {source:#}")]
    Load {
        /// Lorebook name.
        lorebook: String,
        /// Store failure.
        #[source]
        source: anyhow::Error,
    },

    /// Saving failed; the in-memory change was discarded.
    #[error("saving lorebook {lorebook} failed: {source:#}")]
    Persistence {
        /// Lorebook name.
        lorebook: String,
        /// Store failure.
        #[source]
        source: anyhow::Error,
    },

    /// An external call exceeded its configured limit.
    #[error("{stage} timed out after {secs}s")]
    TimedOut {
        /// Stage that was waiting.
        stage: WorkflowState,
        /// Configured limit.
        secs: u64,
    },

    /// The run was cancelled while waiting on an external call.
    #[error("{stage} was cancelled")]
    Cancelled {
        /// Stage that was waiting.
        stage: WorkflowState,
    },
}
