//! Fixed instruction templates wrapped around a chat transcript.
//!
//! Templates are static text; the transcript always follows the
//! `CHAT LOG:` header at the end, so output is byte-identical for identical
//! input.

use serde::{Deserialize, Serialize};

/// Instruction template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Whole-story markdown timeline grouped into arcs.
    FullTimeline,
    /// One self-contained event as a JSON object.
    SingleEvent,
    /// Several events as `{"events": [...]}`.
    EventBatch,
    /// Relationship note with a leading `KEYWORDS:` line.
    EntityNote,
}

const CHAT_LOG_HEADER: &str = "CHAT LOG:";
const CURRENT_NOTE_HEADER: &str = "CURRENT NOTE:";

const FULL_TIMELINE_TEMPLATE: &str = r"You are a timeline summarizer. Read the roleplay chat below and write a chronological timeline of it.

FORMAT YOUR RESPONSE EXACTLY LIKE THIS:

### **I. [Arc Title] ([Time Period])**
*   **[Event Name] ([Date/Time]):**
    *   **Event:** [What happened, in detail]
    *   **Result:** [The outcome and why it matters]
*   **[Next Event Name] ([Date/Time]):**
    *   **Event:** [What happened]
    *   **Result:** [The outcome]

### **II. [Next Arc Title] ([Time Period])**
[Continue in the same format...]

RULES:
- Group related events into arcs numbered I, II, III...
- Give every arc a dramatic title and a time period
- Keep dates and times whenever the chat states them
- Write in the past tense, in a narrative style
- Capture emotional beats and changes in relationships
- Be detailed but concise";

const SINGLE_EVENT_TEMPLATE: &str = r####"You are a story event extractor. Read the roleplay chat below and summarize the single most significant event in it.

RESPOND WITH ONE JSON OBJECT IN EXACTLY THIS FORMAT:
{
    "title": "The First Encounter",
    "content": "### **The First Encounter (Mid-May 2025)**\n*   **Event:** [Detailed description]\n*   **Result:** [Outcome]",
    "keywords": ["first meeting", "첫 만남", "encounter", "The Sanctum"]
}

RULES:
- The event must make sense without the rest of the chat
- Keywords must include English AND Korean variations
- Keywords should be words characters are likely to mention later
- Include location names, character names and emotional keywords
- Output nothing outside the JSON object"####;

const EVENT_BATCH_TEMPLATE: &str = r####"You are a timeline event extractor. Read the roleplay chat below and extract the individual significant events.

RESPOND IN EXACTLY THIS JSON FORMAT:
{
    "events": [
        {
            "title": "The First Encounter",
            "content": "### **The First Encounter (Mid-May 2025)**\n*   **Event:** [Detailed description]\n*   **Result:** [Outcome]",
            "keywords": ["first meeting", "첫 만남", "encounter", "The Sanctum"]
        },
        {
            "title": "Event Title 2",
            "content": "...",
            "keywords": ["keyword1", "keyword2"]
        }
    ]
}

RULES:
- Extract 3-10 significant events
- Every event must make sense on its own
- Keywords must include English AND Korean variations
- Keywords should be words characters are likely to mention later
- Include location names, character names and emotional keywords"####;

const ENTITY_NOTE_TEMPLATE: &str = r"You maintain relationship notes for a roleplay. Read the chat below and write an up-to-date note about the relationships between the characters in it.

RESPOND IN EXACTLY THIS FORMAT:
KEYWORDS: [comma-separated names, nicknames and places, in English AND Korean]
[The note body]

RULES:
- The first line must start with KEYWORDS:
- Describe how each relationship stands now and what changed it
- Write in the present tense, in the third person
- Keep facts the chat establishes; do not invent new ones
- Be concise";

const NOTE_UPDATE_RULES: &str = "Rewrite the current note below so it reflects the chat. Keep facts that still hold and replace the ones the chat contradicts.";

/// Wrap `transcript` in the fixed template for `mode`.
#[must_use]
pub fn build_prompt(transcript: &str, mode: PromptMode) -> String {
    format!("{}\n\n{CHAT_LOG_HEADER}\n{transcript}", template_for(mode))
}

/// Entity-note prompt that carries the note being updated.
///
/// A blank `existing_note` yields the plain [`PromptMode::EntityNote`] prompt.
#[must_use]
pub fn build_note_update_prompt(transcript: &str, existing_note: &str) -> String {
    let existing_note = existing_note.trim();
    if existing_note.is_empty() {
        return build_prompt(transcript, PromptMode::EntityNote);
    }
    format!(
        "{ENTITY_NOTE_TEMPLATE}\n\n{NOTE_UPDATE_RULES}\n\n{CURRENT_NOTE_HEADER}\n{existing_note}\n\n{CHAT_LOG_HEADER}\n{transcript}"
    )
}

fn template_for(mode: PromptMode) -> &'static str {
    match mode {
        PromptMode::FullTimeline => FULL_TIMELINE_TEMPLATE,
        PromptMode::SingleEvent => SINGLE_EVENT_TEMPLATE,
        PromptMode::EventBatch => EVENT_BATCH_TEMPLATE,
        PromptMode::EntityNote => ENTITY_NOTE_TEMPLATE,
    }
}
