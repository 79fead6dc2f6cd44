//! Build configuration handed to the compiler.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::StartupContext;
use crate::errors::StartupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub mode: BuildMode,
    pub app_path: PathBuf,
    pub entry: PathBuf,
    pub output_dir: PathBuf,
    /// Public path with trailing slash
    pub public_path: String,
    /// Bundler argv with placeholders already substituted
    pub command: Option<Vec<String>>,
    /// Environment for the bundler process
    pub env: BTreeMap<String, String>,
    pub settle_ms: u64,
}

/// Produces a [`BuildConfig`] for a mode.
pub trait BuildConfigProvider: Send + Sync {
    fn build_config(&self, mode: BuildMode) -> Result<BuildConfig, StartupError>;
}

/// Derives the build configuration from the startup context and `devstart.toml`.
pub struct ProjectBuildConfig {
    ctx: StartupContext,
}

impl ProjectBuildConfig {
    pub fn new(ctx: StartupContext) -> Self {
        Self { ctx }
    }
}

impl BuildConfigProvider for ProjectBuildConfig {
    fn build_config(&self, mode: BuildMode) -> Result<BuildConfig, StartupError> {
        let ctx = &self.ctx;
        let output_dir = match mode {
            BuildMode::Development => ctx.paths.app_path.join(&ctx.project.build.output_dir),
            BuildMode::Production => ctx.paths.app_build.clone(),
        };
        let public_path = ctx.paths.public_url_or_path.clone();
        let source_maps = ctx.var("GENERATE_SOURCEMAP") != Some("false");

        let mut env = ctx.env.clone();
        env.insert("NODE_ENV".to_string(), mode.to_string());
        env.insert("BABEL_ENV".to_string(), mode.to_string());

        let command = match &ctx.project.build.command {
            None => None,
            Some(argv) if argv.first().is_none_or(|p| p.trim().is_empty()) => {
                return Err(StartupError::BuildConfig(
                    "[build] command in devstart.toml is empty".to_string(),
                ));
            }
            Some(argv) => {
                let vars = [
                    ("{entry}", ctx.paths.app_index.display().to_string()),
                    ("{output_dir}", output_dir.display().to_string()),
                    ("{public_path}", public_path.clone()),
                    ("{mode}", mode.to_string()),
                    ("{source_maps}", source_maps.to_string()),
                ];
                Some(argv.iter().map(|arg| substitute(arg, &vars)).collect())
            }
        };

        Ok(BuildConfig {
            mode,
            app_path: ctx.paths.app_path.clone(),
            entry: ctx.paths.app_index.clone(),
            output_dir,
            public_path,
            command,
            env,
            settle_ms: ctx.project.build.settle_ms,
        })
    }
}

fn substitute(arg: &str, vars: &[(&str, String)]) -> String {
    vars.iter()
        .fold(arg.to_string(), |acc, (key, value)| acc.replace(key, value))
}
