//! Configuration loaded from `splain.toml`.
//!
//! ```toml
//! [engine]
//! enabled = true
//! model = "gpt-4o-mini"
//! command = ["llm", "-m", "gpt-4o-mini"]
//! timeout_secs = 30
//!
//! [output]
//! include_raw_query = true
//! format = "markdown"
//! ```
//!
//! Lookup order: an explicit path, `./splain.toml`, then
//! `<config dir>/splain/config.toml`. Missing files mean defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::{DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::error::{SplainError, SplainResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Try the external engine before the rules.
    pub enabled: bool,
    /// Model identifier reported in metadata.
    pub model: String,
    /// Program and arguments of the external engine.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_MODEL.to_string(),
            command: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub include_raw_query: bool,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_raw_query: true,
            format: OutputFormat::Markdown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl Config {
    /// Load from an explicit path, or from the first default location that exists.
    pub fn load(path: Option<&Path>) -> SplainResult<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::search_paths().into_iter().find(|p| p.exists()) {
            Some(found) => Self::from_file(&found),
            None => Ok(Self::default()),
        }
    }

    /// Default locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("splain.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("splain").join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> SplainResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SplainError::config(path.display().to_string(), e.to_string()))?;
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_toml(&content, &path.display().to_string())
    }

    pub fn from_toml(content: &str, origin: &str) -> SplainResult<Self> {
        toml::from_str(content).map_err(|e| SplainError::config(origin, e.to_string()))
    }
}
