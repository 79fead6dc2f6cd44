//! Optional per-project settings read from `devstart.toml` in the app root.
//!
//! # Configuration File Format
//!
//! ```toml
//! [build]
//! command = ["npx", "esbuild", "{entry}", "--bundle", "--outdir={output_dir}", "--watch"]
//! output_dir = ".devstart/out"
//! settle_ms = 150
//!
//! [server]
//! history_fallback = true
//! ```
//!
//! Without a `[build] command` the dev server only serves `public/`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::StartupError;

pub const CONFIG_FILE_NAME: &str = "devstart.toml";

/// Bundler invocation used in development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Watch-mode bundler command. `{entry}`, `{output_dir}`, `{public_path}`,
    /// `{mode}` and `{source_maps}` are substituted before spawning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Where the bundler writes in development, relative to the app root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Quiet period (ms) after bundler output that ends a compile cycle
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".devstart/out")
}

fn default_settle_ms() -> u64 {
    150
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: None,
            output_dir: default_output_dir(),
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Serve `index.html` for unknown GET routes that accept HTML
    #[serde(default = "default_history_fallback")]
    pub history_fallback: bool,
}

fn default_history_fallback() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            history_fallback: default_history_fallback(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub server: ServerSection,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse devstart.toml")
    }

    /// Load `devstart.toml` from `app_dir`, falling back to defaults when absent.
    pub fn load_or_default(app_dir: &Path) -> Result<Self, StartupError> {
        let path = app_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path).map_err(|e| StartupError::ProjectConfig {
            path,
            message: format!("{:#}", e),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize devstart.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(command) = &self.build.command
            && command.first().is_none_or(|program| program.trim().is_empty())
        {
            warnings.push("[build] command is empty; no bundler will run".to_string());
        }
        if self.build.settle_ms == 0 {
            warnings.push(
                "[build] settle_ms = 0 reports a compile after every output line".to_string(),
            );
        }
        if self.build.output_dir.is_absolute() {
            warnings.push(format!(
                "[build] output_dir '{}' is absolute; it is usually relative to the app root",
                self.build.output_dir.display()
            ));
        }

        warnings
    }
}
