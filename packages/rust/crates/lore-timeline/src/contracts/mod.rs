mod book;
mod policy;
mod summary;

pub use book::KnowledgeBase;
pub use policy::{ReconcileAction, ReconcileOutcome, ReconcilePolicy};
pub use summary::ParsedSummary;
