//! Settings loader for the lorebook scribe.
//!
//! Loads and merges:
//! - System defaults: `<LORE_SCRIBE_ROOT>/conf/lore-scribe.yaml`
//! - User overrides:  `<LORE_SCRIBE_CONFIG_HOME>/lore-scribe/settings.yaml`
//!
//! Merge precedence is user over system, field by field. Settings are
//! injected into [`crate::Scribe`] and re-applied explicitly with
//! [`crate::Scribe::apply_settings`]; nothing reads them ambiently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "conf/lore-scribe.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "lore-scribe/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
const DEFAULT_STORE_RELATIVE_PATH: &str = ".data/lorebooks";
const DEFAULT_SUB_LOREBOOK_PREFIX: &str = "Timeline_";
const DEFAULT_SCAN_DEPTH: usize = 50;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// All scribe settings; every field is optional in the YAML files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScribeSettings {
    /// Workflow behaviour.
    #[serde(default)]
    pub scribe: WorkflowSettings,
    /// Text-generation backend.
    #[serde(default)]
    pub generation: GenerationSettings,
    /// Lorebook store.
    #[serde(default)]
    pub store: StoreSettings,
}

/// Workflow behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkflowSettings {
    /// Runs are rejected when `false`.
    pub enabled: Option<bool>,
    /// Lorebook that receives the main timeline.
    pub main_lorebook_name: Option<String>,
    /// Name prefix for new event lorebooks.
    pub sub_lorebook_prefix: Option<String>,
    /// Keep model-proposed keywords on event entries.
    pub auto_keywords: Option<bool>,
    /// Number of recent turns read when no range is given.
    pub scan_depth: Option<usize>,
}

/// OpenAI-compatible chat completions backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerationSettings {
    /// Full chat completions URL.
    pub inference_url: Option<String>,
    /// Model name sent with each request.
    pub model: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Generation time limit; `0` waits forever.
    pub timeout_secs: Option<u64>,
}

/// JSON lorebook directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreSettings {
    /// Directory holding one `<name>.json` per lorebook.
    pub dir: Option<String>,
}

impl ScribeSettings {
    /// Overlay `overlay` on top of `self`; set overlay fields win.
    #[must_use]
    pub fn merge(self, overlay: Self) -> Self {
        Self {
            scribe: self.scribe.merge(overlay.scribe),
            generation: self.generation.merge(overlay.generation),
            store: self.store.merge(overlay.store),
        }
    }
}

impl WorkflowSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            enabled: overlay.enabled.or(self.enabled),
            main_lorebook_name: overlay.main_lorebook_name.or(self.main_lorebook_name),
            sub_lorebook_prefix: overlay.sub_lorebook_prefix.or(self.sub_lorebook_prefix),
            auto_keywords: overlay.auto_keywords.or(self.auto_keywords),
            scan_depth: overlay.scan_depth.or(self.scan_depth),
        }
    }

    /// Whether runs are allowed.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Configured main lorebook, ignoring blank names.
    #[must_use]
    pub fn main_lorebook_name(&self) -> Option<&str> {
        non_blank(self.main_lorebook_name.as_deref())
    }

    /// Prefix for new event lorebook names.
    #[must_use]
    pub fn sub_lorebook_prefix(&self) -> &str {
        self.sub_lorebook_prefix
            .as_deref()
            .unwrap_or(DEFAULT_SUB_LOREBOOK_PREFIX)
    }

    /// Whether event entries keep generated keywords.
    #[must_use]
    pub fn auto_keywords(&self) -> bool {
        self.auto_keywords.unwrap_or(true)
    }

    /// Recent-turn count used when no explicit selector is given.
    #[must_use]
    pub fn scan_depth(&self) -> usize {
        match self.scan_depth {
            Some(0) | None => DEFAULT_SCAN_DEPTH,
            Some(depth) => depth,
        }
    }
}

impl GenerationSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            inference_url: overlay.inference_url.or(self.inference_url),
            model: overlay.model.or(self.model),
            api_key_env: overlay.api_key_env.or(self.api_key_env),
            timeout_secs: overlay.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Configured endpoint, ignoring blank values.
    #[must_use]
    pub fn inference_url(&self) -> Option<&str> {
        non_blank(self.inference_url.as_deref())
    }

    /// Environment variable read for the API key.
    #[must_use]
    pub fn api_key_env(&self) -> &str {
        non_blank(self.api_key_env.as_deref()).unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Generation time limit; `None` when disabled with `0`.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs.unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl StoreSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            dir: overlay.dir.or(self.dir),
        }
    }

    /// Lorebook directory, relative paths resolved against the project root.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        let root = project_root();
        match non_blank(self.dir.as_deref()) {
            Some(dir) => absolutize(&root, PathBuf::from(dir)),
            None => root.join(DEFAULT_STORE_RELATIVE_PATH),
        }
    }
}

/// Load merged settings (user overrides system).
#[must_use]
pub fn load_settings() -> ScribeSettings {
    let (system_path, user_path) = settings_paths();
    load_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
#[must_use]
pub fn settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
#[must_use]
pub fn load_settings_from_paths(system: &Path, user: &Path) -> ScribeSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> ScribeSettings {
    if !path.exists() {
        return ScribeSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return ScribeSettings::default();
        }
    };
    match serde_yaml::from_str::<Option<ScribeSettings>>(&raw) {
        Ok(value) => value.unwrap_or_default(),
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            ScribeSettings::default()
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn project_root() -> PathBuf {
    env_path("LORE_SCRIBE_ROOT")
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    let configured = env_path("LORE_SCRIBE_CONFIG_HOME")
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_HOME_RELATIVE_PATH));
    absolutize(project_root, configured)
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
