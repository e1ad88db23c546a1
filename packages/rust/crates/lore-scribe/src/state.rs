//! Single-flight workflow state.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::ScribeError;

/// Stage of the one run allowed in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// No run in flight.
    #[default]
    Idle,
    /// Selecting chat turns and building the prompt.
    Extracting,
    /// Waiting on the text-generation collaborator.
    AwaitingGeneration,
    /// Reading the completion.
    Parsing,
    /// Loading, reconciling and saving the lorebook.
    AwaitingPersist,
}

impl WorkflowState {
    fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::AwaitingGeneration => "generation",
            Self::Parsing => "parsing",
            Self::AwaitingPersist => "persistence",
        }
    }
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared cell holding the current [`WorkflowState`].
#[derive(Debug, Clone, Default)]
pub(crate) struct StateCell {
    inner: Arc<Mutex<WorkflowState>>,
}

impl StateCell {
    pub(crate) fn current(&self) -> WorkflowState {
        *self.lock()
    }

    /// Claim the cell for a new run starting in `first`.
    ///
    /// Fails with [`ScribeError::Busy`] unless the cell is idle.
    pub(crate) fn begin(&self, first: WorkflowState) -> Result<BusyGuard, ScribeError> {
        let mut state = self.lock();
        let current = *state;
        if current != WorkflowState::Idle {
            tracing::warn!(current = %current, "rejected lorebook run: already processing");
            return Err(ScribeError::Busy);
        }
        *state = first;
        tracing::debug!(state = %first, "lorebook run started");
        Ok(BusyGuard { cell: self.clone() })
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that a run owns the state cell.
///
/// Dropping the guard returns the cell to idle on every exit path,
/// including errors, cancellation and a dropped future.
#[derive(Debug)]
pub(crate) struct BusyGuard {
    cell: StateCell,
}

impl BusyGuard {
    pub(crate) fn advance(&self, next: WorkflowState) {
        let mut state = self.cell.lock();
        let previous = std::mem::replace(&mut *state, next);
        tracing::debug!(from = %previous, to = %next, "lorebook run state change");
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut state = self.cell.lock();
        let previous = std::mem::replace(&mut *state, WorkflowState::Idle);
        tracing::debug!(from = %previous, "lorebook run finished");
    }
}
