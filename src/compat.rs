//! Browser-target gate run before any port is touched.
//!
//! The app must declare which browsers it targets. When it doesn't, the
//! defaults are offered (interactive) or written outright (non-interactive).

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::errors::StartupError;
use crate::prompt::Prompt;
use crate::ui::StartupUI;

pub const DEFAULT_PRODUCTION_BROWSERS: &[&str] = &[">0.2%", "not dead", "not op_mini all"];
pub const DEFAULT_DEVELOPMENT_BROWSERS: &[&str] = &[
    "last 1 chrome version",
    "last 1 firefox version",
    "last 1 safari version",
];

const CONFIG_FILES: &[&str] = &[".browserslistrc", "browserslist"];

/// Checks the target environment before startup proceeds.
#[async_trait]
pub trait CompatibilityGate: Send + Sync {
    /// Resolve when the app may start; reject with a printable message otherwise.
    async fn check(&self, app_path: &Path, interactive: bool) -> Result<(), StartupError>;
}

/// Requires a browserslist declaration, adding the defaults when allowed.
pub struct BrowserslistGate {
    prompt: Arc<dyn Prompt>,
    ui: StartupUI,
    /// Value of `BROWSERSLIST` from the startup environment
    env_query: Option<String>,
}

impl BrowserslistGate {
    pub fn new(prompt: Arc<dyn Prompt>, ui: StartupUI, env_query: Option<String>) -> Self {
        Self {
            prompt,
            ui,
            env_query,
        }
    }

    /// Look for a declaration in `app_path` and then each parent directory,
    /// stopping at the first directory that has one.
    async fn has_declaration(&self, app_path: &Path) -> Result<bool, StartupError> {
        if self.env_query.as_deref().is_some_and(|q| !q.trim().is_empty()) {
            return Ok(true);
        }
        for dir in app_path.ancestors() {
            if declares_browsers(dir, dir == app_path).await? {
                tracing::debug!(dir = %dir.display(), "browserslist declaration found");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn should_set_browsers(&self, interactive: bool) -> Result<bool, StartupError> {
        if !interactive {
            return Ok(true);
        }
        self.prompt.confirm(
            "We're unable to detect target browsers.\n\nWould you like to add the defaults to your package.json?",
            true,
        )
    }
}

#[async_trait]
impl CompatibilityGate for BrowserslistGate {
    async fn check(&self, app_path: &Path, interactive: bool) -> Result<(), StartupError> {
        if self.has_declaration(app_path).await? {
            return Ok(());
        }

        if self.should_set_browsers(interactive)? {
            let package_path = app_path.join("package.json");
            write_default_browsers(&package_path).await?;
            self.ui.browsers_set(DEFAULT_PRODUCTION_BROWSERS);
            tracing::info!(path = %package_path.display(), "added default browserslist");

            if self.has_declaration(app_path).await? {
                return Ok(());
            }
        }

        Err(StartupError::Compatibility(
            "You must specify targeted browsers.\nPlease add a browserslist key to your package.json."
                .to_string(),
        ))
    }
}

async fn declares_browsers(dir: &Path, is_app_dir: bool) -> Result<bool, StartupError> {
    for file in CONFIG_FILES {
        if tokio::fs::try_exists(dir.join(file)).await.unwrap_or(false) {
            return Ok(true);
        }
    }
    let package = match read_package_json(&dir.join("package.json")).await {
        Ok(package) => package,
        // Someone else's package.json above the app; only the app's own must parse.
        Err(e) if !is_app_dir => {
            tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable package.json");
            None
        }
        Err(e) => return Err(e),
    };
    Ok(package.is_some_and(|pkg| pkg.get("browserslist").is_some_and(|v| !v.is_null())))
}

async fn read_package_json(path: &Path) -> Result<Option<Map<String, Value>>, StartupError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| StartupError::Package {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(StartupError::Package {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        }),
    }
}

/// Insert the default `browserslist` key, keeping existing key order.
async fn write_default_browsers(path: &Path) -> Result<(), StartupError> {
    let mut package = read_package_json(path).await?.unwrap_or_default();
    package.insert(
        "browserslist".to_string(),
        json!({
            "production": DEFAULT_PRODUCTION_BROWSERS,
            "development": DEFAULT_DEVELOPMENT_BROWSERS,
        }),
    );
    let mut content = serde_json::to_string_pretty(&Value::Object(package))
        .context("Failed to serialize package.json")?;
    content.push('\n');
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
