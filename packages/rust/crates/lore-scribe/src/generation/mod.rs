//! Text-generation collaborator and its one-time backend resolution.

mod http;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{GenerationSettings, ScribeError};

pub use http::HttpTextGenerator;

/// Opaque prompt-in, completion-out backend.
///
/// Implementations do not retry or stream; any failure is reported as-is.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Pick the generation backend once, at startup.
///
/// The chosen backend is used for every call afterwards; it is never
/// re-probed per request.
pub fn resolve_generator(
    settings: &GenerationSettings,
) -> Result<Arc<dyn TextGenerator>, ScribeError> {
    let Some(url) = settings.inference_url() else {
        tracing::warn!("no inference_url configured; lorebook generation unavailable");
        return Err(ScribeError::NoGenerationBackend);
    };
    let api_key = std::env::var(settings.api_key_env())
        .ok()
        .filter(|key| !key.trim().is_empty());
    let model = settings.model.clone().unwrap_or_default();
    tracing::info!(
        backend = "openai_compatible",
        url = %url,
        model = %model,
        api_key = api_key.is_some(),
        "resolved text generation backend"
    );
    Ok(Arc::new(HttpTextGenerator::new(
        url.to_string(),
        model,
        api_key,
    )))
}
