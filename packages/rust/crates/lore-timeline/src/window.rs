use serde::{Deserialize, Serialize};

use crate::{ChatTurn, LoreError};

const TURN_SEPARATOR: &str = "\n\n";

/// Which slice of the chat history to summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContextSelector {
    /// The most recent `n` turns.
    LastN {
        /// Requested turn count.
        n: usize,
    },
    /// Turns with index in `start..=end`, zero-based.
    Range {
        /// First index.
        start: usize,
        /// Last index, inclusive.
        end: usize,
    },
}

/// Contiguous slice of chat history plus its rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    /// Selected turns in history order.
    pub turns: Vec<ChatTurn>,
    /// History index of the first selected turn.
    pub start_index: usize,
    /// History index of the last selected turn, inclusive.
    ///
    /// Equals `start_index` when no turn was selected.
    pub end_index: usize,
    /// Speaker-tagged transcript handed to the prompt builder.
    pub transcript: String,
}

impl ContextWindow {
    /// Number of selected turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Select a contiguous window of `turns` and render its transcript.
///
/// `LastN` renders `[speaker]: text` lines; `Range` prefixes each line with
/// `[#index]`. A range is clamped to the history bounds, but `start > end`
/// is always rejected, even for an empty history.
pub fn extract(turns: &[ChatTurn], selector: ContextSelector) -> Result<ContextWindow, LoreError> {
    let window = match selector {
        ContextSelector::LastN { n } => {
            let count = n.min(turns.len());
            let start = turns.len() - count;
            let selected = &turns[start..];
            let transcript = render(selected.iter().map(|turn| {
                format!("[{}]: {}", turn.display_speaker(), turn.text)
            }));
            ContextWindow {
                turns: selected.to_vec(),
                start_index: start,
                end_index: last_index(start, selected.len()),
                transcript,
            }
        }
        ContextSelector::Range { start, end } => {
            if start > end {
                return Err(LoreError::InvalidRange { start, end });
            }
            let start = start.min(turns.len());
            let stop = end.saturating_add(1).min(turns.len()).max(start);
            let selected = &turns[start..stop];
            let transcript = render(selected.iter().enumerate().map(|(offset, turn)| {
                format!(
                    "[#{}] [{}]: {}",
                    start + offset,
                    turn.display_speaker(),
                    turn.text
                )
            }));
            ContextWindow {
                turns: selected.to_vec(),
                start_index: start,
                end_index: last_index(start, selected.len()),
                transcript,
            }
        }
    };

    tracing::debug!(
        total_turns = turns.len(),
        selected = window.len(),
        start_index = window.start_index,
        end_index = window.end_index,
        "extracted chat context window"
    );
    Ok(window)
}

fn last_index(start: usize, len: usize) -> usize {
    (start + len).saturating_sub(1).max(start)
}

fn render(lines: impl Iterator<Item = String>) -> String {
    lines.collect::<Vec<_>>().join(TURN_SEPARATOR)
}
