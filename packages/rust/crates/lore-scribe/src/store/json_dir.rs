//! One JSON file per lorebook in a directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use lore_timeline::KnowledgeBase;
use tokio::io::AsyncWriteExt;

use super::KnowledgeBaseStore;

const LOREBOOK_EXTENSION: &str = "json";

/// Directory-backed lorebook store (`<dir>/<name>.json`).
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Store rooted at `dir`; the directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lorebook_path(&self, name: &str) -> Result<PathBuf> {
        let file_stem = validate_name(name)?;
        Ok(self.dir.join(format!("{file_stem}.{LOREBOOK_EXTENSION}")))
    }
}

#[async_trait]
impl KnowledgeBaseStore for JsonDirStore {
    fn backend_name(&self) -> &'static str {
        "json_dir"
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("failed to list lorebook directory {}", self.dir.display())
                });
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LOREBOOK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
                && !stem.starts_with('.')
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        let path = self.lorebook_path(name)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read lorebook {}", path.display()));
            }
        };
        let kb = serde_json::from_str(&raw)
            .with_context(|| format!("failed to decode lorebook {}", path.display()))?;
        Ok(Some(kb))
    }

    async fn save(&self, name: &str, kb: &KnowledgeBase) -> Result<()> {
        let path = self.lorebook_path(name)?;
        let payload = serde_json::to_string_pretty(kb)
            .with_context(|| format!("failed to encode lorebook {name}"))?;
        atomic_write_text(&path, &payload).await?;
        tracing::debug!(path = %path.display(), entries = kb.len(), "lorebook written");
        Ok(())
    }
}

/// Check that a lorebook name can be used as its own file stem.
///
/// Names are never rewritten, so two names can never share a file.
fn validate_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        bail!("lorebook name is empty");
    }
    if name.trim() != name {
        bail!("lorebook name has surrounding whitespace: {name:?}");
    }
    if name.starts_with('.') {
        bail!("lorebook name may not start with '.': {name}");
    }
    if let Some(ch) = name.chars().find(|ch| {
        matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control()
    }) {
        bail!("lorebook name contains {ch:?}, which is not allowed in a file name: {name}");
    }
    Ok(name)
}

/// Write text content atomically:
/// - ensure parent directory exists
/// - write to a temp file in the same directory
/// - fsync file + rename into place
async fn atomic_write_text(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await.with_context(|| {
        format!(
            "failed to create lorebook directory {}",
            parent.display()
        )
    })?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("lorebook.json");
    let temp_name = format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4());
    let temp_path = parent.join(temp_name);

    let mut temp_file = tokio::fs::File::create(&temp_path).await.with_context(|| {
        format!(
            "failed to create temporary lorebook file {}",
            temp_path.display()
        )
    })?;
    temp_file
        .write_all(content.as_bytes())
        .await
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    temp_file
        .sync_all()
        .await
        .with_context(|| format!("failed to fsync temporary file {}", temp_path.display()))?;
    drop(temp_file);

    tokio::fs::rename(&temp_path, path).await.with_context(|| {
        format!(
            "failed to rename temporary file {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
