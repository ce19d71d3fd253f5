use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}, sync::Arc};
use tracing::{debug, warn};

use crate::block::DEFAULT_TOP_LEVEL_MAX_INDENT;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Config is merged: system -> user -> workspace -> runtime (CLI flags)
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModelsConfig {
    /// Used by every stage unless overridden.
    pub default: ModelTarget,
    /// Stage role -> model target; keys are `summary`, `extract_main`, `detail_main`, `extract_sub`, `detail_sub`
    pub overrides: BTreeMap<String, ModelTarget>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ModelTarget {
    pub name: String,                  // e.g. "gemini-2.5-flash"
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,   // looked up at call time
}

impl ModelTarget {
    pub fn name_or_default(&self) -> &str {
        if self.name.is_empty() { DEFAULT_MODEL } else { &self.name }
    }
    pub fn base_url_or_default(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
    pub fn api_key_env_or_default(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelRole {
    Summary,
    ExtractMain,
    DetailMain,
    ExtractSub,
    DetailSub,
}

impl ModelRole {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::ExtractMain => "extract_main",
            Self::DetailMain => "detail_main",
            Self::ExtractSub => "extract_sub",
            Self::DetailSub => "detail_sub",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parent of the per-meeting folders (default: current directory).
    pub output_root: Option<PathBuf>,
    /// Deepest indent that still opens a new feature block.
    pub top_level_max_indent: Option<usize>,
}

impl Config {
    pub fn output_root(&self) -> PathBuf {
        self.pipeline.output_root.clone().unwrap_or_else(|| PathBuf::from("."))
    }
    pub fn top_level_max_indent(&self) -> usize {
        self.pipeline.top_level_max_indent.unwrap_or(DEFAULT_TOP_LEVEL_MAX_INDENT)
    }
    /// Choose model target for a role.
    pub fn pick_model(&self, role: ModelRole) -> ModelTarget {
        if let Some(mt) = self.models.overrides.get(role.key()) { return mt.clone(); }
        self.models.default.clone()
    }
}

fn merge(a: &mut Config, b: &Config) {
    let overlay = |dst: &mut Option<String>, src: &Option<String>| { if src.is_some() { *dst = src.clone(); } };

    // models: a named default replaces the whole target; overrides merge per role
    if !b.models.default.name.is_empty() { a.models.default.name = b.models.default.name.clone(); }
    overlay(&mut a.models.default.base_url, &b.models.default.base_url);
    overlay(&mut a.models.default.api_key_env, &b.models.default.api_key_env);
    for (k, v) in &b.models.overrides { a.models.overrides.insert(k.clone(), v.clone()); }

    if b.pipeline.output_root.is_some() { a.pipeline.output_root = b.pipeline.output_root.clone(); }
    if b.pipeline.top_level_max_indent.is_some() { a.pipeline.top_level_max_indent = b.pipeline.top_level_max_indent; }
}

fn config_paths(workspace_root: &Path) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let proj = ProjectDirs::from("dev", "meeting-features", "meeting-features").context("ProjectDirs not available")?;
    let user = proj.config_dir().join("config.toml");
    let system = if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\ProgramData\MeetingFeatures\config.toml")
    } else {
        PathBuf::from("/etc/meeting-features/config.toml")
    };
    let workspace = workspace_root.join(".meeting-features").join("config.toml");
    Ok((system, user, workspace))
}

#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<RwLock<Config>>,
    runtime_overlay: Arc<RwLock<Config>>,
    system_path: PathBuf,
    user_path: PathBuf,
    workspace_path: PathBuf,
}

impl ConfigManager {
    pub fn load(workspace_root: impl AsRef<Path>) -> Result<Self> {
        let (system_path, user_path, workspace_path) = config_paths(workspace_root.as_ref())?;
        Ok(Self::from_paths(system_path, user_path, workspace_path))
    }

    /// Build from explicit layer files; missing files are skipped.
    pub fn from_paths(system_path: PathBuf, user_path: PathBuf, workspace_path: PathBuf) -> Self {
        let cm = Self {
            inner: Arc::new(RwLock::new(Config::default())),
            runtime_overlay: Arc::new(RwLock::new(Config::default())),
            system_path, user_path, workspace_path,
        };
        cm.reload_all();
        cm
    }

    fn read_file(path: &Path) -> Option<Config> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&text) {
            Ok(c) => {
                debug!(path = %path.display(), "loaded config layer");
                Some(c)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparsable config layer");
                None
            }
        }
    }

    pub fn reload_all(&self) {
        let mut merged = Config::default();
        for p in [&self.system_path, &self.user_path, &self.workspace_path] {
            if let Some(layer) = Self::read_file(p) { merge(&mut merged, &layer); }
        }
        let rt = self.runtime_overlay.read().clone();
        merge(&mut merged, &rt);
        *self.inner.write() = merged;
    }

    pub fn get(&self) -> Config { self.inner.read().clone() }

    /// In-memory overlay (not persisted).
    pub fn apply_runtime_overlay(&self, patch: Config) {
        {
            let mut rt = self.runtime_overlay.write();
            merge(&mut *rt, &patch);
        }
        self.reload_all();
    }
}
