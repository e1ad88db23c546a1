use serde::{Deserialize, Serialize};

/// One chat message as provided by the host history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Display name of the author (host `name`).
    #[serde(alias = "name", default)]
    pub speaker: String,
    /// Whether the user wrote this turn.
    #[serde(default)]
    pub is_user: bool,
    /// Message text (host `mes`).
    #[serde(alias = "mes", default)]
    pub text: String,
}

impl ChatTurn {
    /// Create a turn.
    #[must_use]
    pub fn new(speaker: impl Into<String>, is_user: bool, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            is_user,
            text: text.into(),
        }
    }

    /// Speaker label used in transcripts; blank names fall back to a role label.
    #[must_use]
    pub fn display_speaker(&self) -> &str {
        let speaker = self.speaker.trim();
        if !speaker.is_empty() {
            speaker
        } else if self.is_user {
            "User"
        } else {
            "Character"
        }
    }
}
