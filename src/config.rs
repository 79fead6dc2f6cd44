use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use crate::env::{ClientEnvironment, load_environment};
use crate::errors::StartupError;
use crate::package::PackageMetadata;
use crate::paths::{AppPaths, public_url_or_path};
use crate::project_config::ProjectConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Mode the development server always runs in.
pub const NODE_ENV: &str = "development";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Everything the startup pipeline needs, assembled once before launch.
///
/// The process environment is read exactly once, into `env`. Nothing downstream
/// consults `std::env` again; components receive what they need from here.
#[derive(Debug, Clone)]
pub struct StartupContext {
    pub paths: AppPaths,
    /// Process environment merged over the `.env` cascade, with `NODE_ENV` and
    /// `BABEL_ENV` pinned to development.
    pub env: BTreeMap<String, String>,
    pub client_env: ClientEnvironment,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub package: PackageMetadata,
    pub app_name: String,
    pub project: ProjectConfig,
    pub use_yarn: bool,
    pub use_typescript: bool,
    pub is_interactive: bool,
    pub is_ci: bool,
}

impl StartupContext {
    /// Assemble the context for the app rooted at `app_dir`.
    ///
    /// `stdout_is_tty` is the raw terminal check; a CI run is never interactive.
    pub fn load(
        app_dir: &Path,
        process_env: impl IntoIterator<Item = (String, String)>,
        stdout_is_tty: bool,
    ) -> Result<Self, StartupError> {
        let app_path = app_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve app directory {}", app_dir.display()))?;

        let mut env = load_environment(&app_path, NODE_ENV, process_env)?;
        env.insert("NODE_ENV".to_string(), NODE_ENV.to_string());
        env.insert("BABEL_ENV".to_string(), NODE_ENV.to_string());

        let package = PackageMetadata::load(&app_path.join("package.json"))?.unwrap_or_default();
        let public_url = public_url_or_path(
            true,
            package.homepage.as_deref(),
            env.get("PUBLIC_URL").map(String::as_str),
        );
        let paths = AppPaths::resolve(&app_path, public_url);
        let client_env = ClientEnvironment::from_env(&env, paths.public_url_pathname());

        let port = parse_port(env.get("PORT").map(String::as_str))?;
        let host = env
            .get("HOST")
            .filter(|h| !h.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let protocol = if env.get("HTTPS").map(String::as_str) == Some("true") {
            Protocol::Https
        } else {
            Protocol::Http
        };
        let is_ci = env.get("CI").map(String::as_str) == Some("true");

        let app_name = package.name.clone().unwrap_or_else(|| {
            app_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "app".to_string())
        });
        let project = ProjectConfig::load_or_default(&app_path)?;

        Ok(Self {
            use_yarn: paths.use_yarn(),
            use_typescript: paths.use_typescript(),
            paths,
            env,
            client_env,
            host,
            port,
            protocol,
            package,
            app_name,
            project,
            is_interactive: stdout_is_tty && !is_ci,
            is_ci,
        })
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.var(key) == Some("true")
    }
}

/// The process environment, skipping entries that aren't valid UTF-8.
pub fn process_env() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Parse `PORT` the lenient way: leading digits count, anything unusable
/// (absent, empty, non-numeric, zero) falls back to [`DEFAULT_PORT`].
pub fn parse_port(raw: Option<&str>) -> Result<u16, StartupError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PORT);
    };
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Ok(DEFAULT_PORT);
    }
    match digits.parse::<u32>() {
        Ok(0) => Ok(DEFAULT_PORT),
        Ok(port) => u16::try_from(port).map_err(|_| StartupError::InvalidPort(raw.to_string())),
        Err(_) => Err(StartupError::InvalidPort(raw.to_string())),
    }
}
