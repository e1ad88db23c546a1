use std::fmt::{Display, Formatter};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::PromptMode;

/// Host `uid` of one lorebook entry.
///
/// Assigned once at creation and never reassigned. Hosts write it as a
/// number inside the entry and as a string when it is used as a map key,
/// so both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryIdVisitor;

        impl Visitor<'_> for EntryIdVisitor {
            type Value = EntryId;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a non-negative integer uid or its decimal string form")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<EntryId, E> {
                Ok(EntryId(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<EntryId, E> {
                u64::try_from(value)
                    .map(EntryId)
                    .map_err(|_| E::custom(format!("negative uid: {value}")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<EntryId, E> {
                value
                    .trim()
                    .parse::<u64>()
                    .map(EntryId)
                    .map_err(|_| E::custom(format!("uid is not a number: {value:?}")))
            }
        }

        deserializer.deserialize_any(EntryIdVisitor)
    }
}

/// Persisted tag recording which workflow produced an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Whole-story timeline, normally always active.
    Timeline,
    /// One extracted story event, keyword triggered.
    Event,
    /// Relationship or character note.
    EntityNote,
    /// Authored in the host, not by this workflow.
    #[default]
    Manual,
}

impl EntryKind {
    /// Prompt template that regenerates an entry of this kind.
    ///
    /// `None` for [`EntryKind::Manual`]: the caller has to pick a template.
    #[must_use]
    pub fn prompt_mode(self) -> Option<PromptMode> {
        match self {
            Self::Timeline => Some(PromptMode::FullTimeline),
            Self::Event => Some(PromptMode::SingleEvent),
            Self::EntityNote => Some(PromptMode::EntityNote),
            Self::Manual => None,
        }
    }
}

/// One record in a lorebook, in the host's world-info JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Stable identifier.
    #[serde(rename = "uid")]
    pub id: EntryId,
    /// Display title (host `comment`).
    #[serde(rename = "comment", default)]
    pub title: String,
    /// Text injected into generation context (host `content`).
    #[serde(rename = "content", default)]
    pub body: String,
    /// Activation keywords in insertion order (host `key`).
    #[serde(rename = "key", default)]
    pub trigger_keywords: Vec<String>,
    /// Injected unconditionally (host `constant`).
    #[serde(rename = "constant", default)]
    pub is_always_active: bool,
    /// Injected on keyword match (host `selective`).
    #[serde(rename = "selective", default)]
    pub is_keyword_triggered: bool,
    /// Workflow that produced this entry.
    #[serde(rename = "entryKind", default)]
    pub kind: EntryKind,
    /// Host insertion order.
    #[serde(default)]
    pub order: u32,
    /// Host insertion position.
    #[serde(default)]
    pub position: u32,
    /// Host insertion depth.
    #[serde(default)]
    pub depth: u32,
    /// Host fields this crate does not model; kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KnowledgeEntry {
    /// Create an entry with no activation mode set.
    #[must_use]
    pub fn new(id: EntryId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            trigger_keywords: Vec::new(),
            is_always_active: false,
            is_keyword_triggered: false,
            kind: EntryKind::Manual,
            order: 0,
            position: 0,
            depth: 0,
            extra: Map::new(),
        }
    }

    /// Append keywords, skipping blanks and ones already present.
    pub fn extend_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() || self.trigger_keywords.iter().any(|k| k == keyword) {
                continue;
            }
            self.trigger_keywords.push(keyword.to_string());
        }
    }

    /// Make the entry always active; keyword triggering is cleared.
    pub fn make_always_active(&mut self) {
        self.is_always_active = true;
        self.is_keyword_triggered = false;
        self.trigger_keywords.clear();
    }
}

/// Host world-info fields a freshly created entry carries.
pub(crate) fn host_entry_defaults(display_index: usize) -> Map<String, Value> {
    let defaults = json!({
        "keysecondary": [],
        "scanDepth": null,
        "caseSensitive": false,
        "matchWholeWords": false,
        "disable": false,
        "addMemo": true,
        "excludeRecursion": true,
        "preventRecursion": false,
        "probability": 100,
        "useProbability": true,
        "group": "",
        "groupOverride": false,
        "groupWeight": 100,
        "delayUntilRecursion": false,
        "automationId": "",
        "sticky": 0,
        "cooldown": 0,
        "delay": 0,
        "displayIndex": display_index,
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
