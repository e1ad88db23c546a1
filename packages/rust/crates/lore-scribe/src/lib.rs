//! Lorebook scribe: the guarded async workflow around `lore-timeline`.
//!
//! One [`Scribe`] runs at most one summarization at a time. A run reads a
//! slice of chat history, asks a [`TextGenerator`] for a summary, parses
//! it, and writes it into a lorebook held by a [`KnowledgeBaseStore`].
//!
//! Two ways to run:
//! - [`Scribe::draft`] then [`Scribe::commit`]: the user reviews and edits
//!   the [`Draft`] in between; dropping it writes nothing.
//! - [`Scribe::generate_and_commit`], [`Scribe::generate_main_timeline`],
//!   [`Scribe::generate_event_book`] and [`Scribe::update_entry`]: one run,
//!   no review.
//!
//! Generation waits are bounded by the configured timeout and every
//! external wait can be cut short with [`Scribe::cancel`].

mod draft;
mod error;
mod generation;
mod scribe;
mod settings;
mod state;
mod store;

pub use draft::{
    CommitReceipt, CommitTarget, Draft, DraftRequest, EntryUpdate, EventBookReceipt,
    UpdateStrategy,
};
pub use error::ScribeError;
pub use generation::{HttpTextGenerator, TextGenerator, resolve_generator};
pub use scribe::Scribe;
pub use settings::{
    GenerationSettings, ScribeSettings, StoreSettings, WorkflowSettings, load_settings,
    load_settings_from_paths, settings_paths,
};
pub use state::WorkflowState;
pub use store::{JsonDirStore, KnowledgeBaseStore, MemoryStore, resolve_store};
