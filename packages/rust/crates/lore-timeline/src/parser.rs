//! Tolerant parsing of model completions.
//!
//! Parsing never fails. Structured forms are tried in order (JSON object,
//! `KEYWORDS:` header line) and anything unrecognized becomes the body
//! verbatim, so the user always gets something to edit.

use serde_json::{Map, Value};

use crate::{ParsedSummary, PromptMode};

const KEYWORDS_PREFIX: &str = "KEYWORDS:";
const TITLE_FIELD: &str = "title";
const CONTENT_FIELD: &str = "content";
const KEYWORDS_FIELD: &str = "keywords";
const EVENTS_FIELD: &str = "events";

/// Parse one completion produced for `mode`.
#[must_use]
pub fn parse(raw: &str, mode: PromptMode) -> ParsedSummary {
    if mode == PromptMode::FullTimeline {
        return ParsedSummary::from_body(raw);
    }

    if let Some(object) = json_object(raw) {
        if let Some(summary) = summary_from_object(&object) {
            tracing::debug!(
                strategy = "json",
                keywords = summary.keywords.len(),
                "parsed completion"
            );
            return summary;
        }
        // `{"events": [...]}` answered where one event was asked for.
        if let Some(first) = events_from_object(&object).into_iter().next() {
            tracing::debug!(strategy = "json_events", "parsed completion from first event");
            return first;
        }
    }

    if let Some(summary) = parse_keywords_header(raw) {
        tracing::debug!(
            strategy = "keywords_header",
            keywords = summary.keywords.len(),
            "parsed completion"
        );
        return summary;
    }

    tracing::debug!(strategy = "raw", chars = raw.len(), "completion kept as raw text");
    ParsedSummary::from_body(raw)
}

/// Parse a multi-event completion (`{"events": [...]}`).
///
/// Events without a string `content` are skipped. When no usable event is
/// found the whole completion is parsed as a single event.
#[must_use]
pub fn parse_events(raw: &str) -> Vec<ParsedSummary> {
    let events = json_object(raw)
        .map(|object| events_from_object(&object))
        .unwrap_or_default();
    if events.is_empty() {
        tracing::debug!("no event list in completion; falling back to single event");
        return vec![parse(raw, PromptMode::SingleEvent)];
    }
    tracing::debug!(events = events.len(), "parsed event list");
    events
}

/// Split a comma-separated keyword list, trimming and dropping blanks and repeats.
#[must_use]
pub fn split_keywords(list: &str) -> Vec<String> {
    dedup_keywords(list.split(',').map(str::to_string))
}

fn json_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => None,
        Err(error) => {
            tracing::debug!(error = %error, "completion JSON candidate did not parse");
            None
        }
    }
}

fn summary_from_object(object: &Map<String, Value>) -> Option<ParsedSummary> {
    let body = object.get(CONTENT_FIELD)?.as_str()?;
    let title = object
        .get(TITLE_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string);
    let keywords = match object.get(KEYWORDS_FIELD) {
        Some(Value::Array(items)) => dedup_keywords(items.iter().filter_map(keyword_text)),
        Some(Value::String(list)) => split_keywords(list),
        _ => Vec::new(),
    };
    Some(ParsedSummary {
        title,
        body: body.to_string(),
        keywords,
    })
}

fn events_from_object(object: &Map<String, Value>) -> Vec<ParsedSummary> {
    let Some(Value::Array(events)) = object.get(EVENTS_FIELD) else {
        return Vec::new();
    };
    events
        .iter()
        .filter_map(Value::as_object)
        .filter_map(summary_from_object)
        .collect()
}

fn keyword_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_keywords_header(raw: &str) -> Option<ParsedSummary> {
    let (first_line, rest) = raw.split_once('\n').unwrap_or((raw, ""));
    let first_line = first_line.trim_start();
    let prefix = first_line.get(..KEYWORDS_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(KEYWORDS_PREFIX) {
        return None;
    }
    let keywords = split_keywords(first_line[KEYWORDS_PREFIX.len()..].trim_end_matches('\r'));
    let body = rest.trim_matches(|ch| ch == '\n' || ch == '\r');
    Some(ParsedSummary {
        title: None,
        body: body.to_string(),
        keywords,
    })
}

fn dedup_keywords(candidates: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for candidate in candidates {
        let keyword = candidate.trim();
        if keyword.is_empty() || keywords.iter().any(|k| k == keyword) {
            continue;
        }
        keywords.push(keyword.to_string());
    }
    keywords
}
