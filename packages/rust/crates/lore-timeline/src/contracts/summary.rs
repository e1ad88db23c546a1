use serde::{Deserialize, Serialize};

/// Structured view of one model completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSummary {
    /// Title proposed by the model, if any.
    #[serde(default)]
    pub title: Option<String>,
    /// Entry body text.
    #[serde(default)]
    pub body: String,
    /// Proposed trigger keywords, de-duplicated, in model order.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ParsedSummary {
    /// Summary carrying only a body.
    #[must_use]
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            title: None,
            body: body.into(),
            keywords: Vec::new(),
        }
    }
}
