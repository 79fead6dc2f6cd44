//! Environment snapshot: `.env` cascade plus the client-visible variable map.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use crate::errors::StartupError;

/// Prefix of variables exposed to the client bundle.
pub const CLIENT_ENV_PREFIX: &str = "REACT_APP_";

const PASSTHROUGH_KEYS: &[&str] = &["WDS_SOCKET_HOST", "WDS_SOCKET_PATH", "WDS_SOCKET_PORT"];

/// `.env` files for `node_env`, highest priority first.
pub fn dotenv_files(node_env: &str) -> Vec<String> {
    let mut files = vec![format!(".env.{}.local", node_env)];
    // .env.local is skipped in test so results stay reproducible
    if node_env != "test" {
        files.push(".env.local".to_string());
    }
    files.push(format!(".env.{}", node_env));
    files.push(".env".to_string());
    files
}

/// Merge the `.env` cascade under the process environment.
///
/// The process environment always wins; among files the first definition wins.
pub fn load_environment(
    app_dir: &Path,
    node_env: &str,
    process_env: impl IntoIterator<Item = (String, String)>,
) -> Result<BTreeMap<String, String>, StartupError> {
    let mut merged: BTreeMap<String, String> = process_env.into_iter().collect();

    for file in dotenv_files(node_env) {
        let path = app_dir.join(&file);
        if !path.is_file() {
            continue;
        }
        let entries = dotenvy::from_path_iter(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Failed to parse {}", path.display()))?;
            merged.entry(key).or_insert(value);
        }
        tracing::debug!(file = %path.display(), "loaded env file");
    }

    Ok(merged)
}

/// Variables made available to the application at build time and in `index.html`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientEnvironment {
    pub raw: BTreeMap<String, String>,
}

impl ClientEnvironment {
    /// `public_url` is the public path without its trailing slash.
    pub fn from_env(env: &BTreeMap<String, String>, public_url: &str) -> Self {
        let mut raw: BTreeMap<String, String> = env
            .iter()
            .filter(|(key, _)| key.starts_with(CLIENT_ENV_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        raw.insert(
            "NODE_ENV".to_string(),
            env.get("NODE_ENV")
                .cloned()
                .unwrap_or_else(|| "development".to_string()),
        );
        raw.insert("PUBLIC_URL".to_string(), public_url.to_string());
        for key in PASSTHROUGH_KEYS {
            if let Some(value) = env.get(*key) {
                raw.insert((*key).to_string(), value.clone());
            }
        }
        let fast_refresh = env.get("FAST_REFRESH").map(String::as_str) != Some("false");
        raw.insert("FAST_REFRESH".to_string(), fast_refresh.to_string());

        Self { raw }
    }

    pub fn fast_refresh(&self) -> bool {
        self.raw.get("FAST_REFRESH").map(String::as_str) == Some("true")
    }

    /// Replace `%KEY%` placeholders with their values.
    pub fn interpolate(&self, template: &str) -> String {
        self.raw.iter().fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("%{}%", key), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_dotenv_files_order() {
        assert_eq!(
            dotenv_files("development"),
            vec![
                ".env.development.local",
                ".env.local",
                ".env.development",
                ".env"
            ]
        );
        assert!(!dotenv_files("test").contains(&".env.local".to_string()));
    }

    #[test]
    fn test_process_env_wins_over_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "PORT=4000\nHOST=127.0.0.1\n").unwrap();

        let merged =
            load_environment(dir.path(), "development", env_of(&[("PORT", "5000")])).unwrap();
        assert_eq!(merged.get("PORT").map(String::as_str), Some("5000"));
        assert_eq!(merged.get("HOST").map(String::as_str), Some("127.0.0.1"));
    }

    #[test]
    fn test_more_specific_file_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "REACT_APP_API=base\n").unwrap();
        fs::write(dir.path().join(".env.development"), "REACT_APP_API=dev\n").unwrap();
        fs::write(dir.path().join(".env.development.local"), "REACT_APP_API=mine\n").unwrap();

        let merged = load_environment(dir.path(), "development", Vec::new()).unwrap();
        assert_eq!(merged.get("REACT_APP_API").map(String::as_str), Some("mine"));
    }

    #[test]
    fn test_client_env_filters_prefix_and_adds_builtins() {
        let env: BTreeMap<_, _> = env_of(&[
            ("REACT_APP_TITLE", "Hello"),
            ("SECRET_TOKEN", "nope"),
            ("NODE_ENV", "development"),
        ])
        .into_iter()
        .collect();

        let client = ClientEnvironment::from_env(&env, "/app");
        assert_eq!(client.raw.get("REACT_APP_TITLE").map(String::as_str), Some("Hello"));
        assert!(!client.raw.contains_key("SECRET_TOKEN"));
        assert_eq!(client.raw.get("PUBLIC_URL").map(String::as_str), Some("/app"));
        assert!(client.fast_refresh());
    }

    #[test]
    fn test_fast_refresh_can_be_disabled() {
        let env: BTreeMap<_, _> = env_of(&[("FAST_REFRESH", "false")]).into_iter().collect();
        assert!(!ClientEnvironment::from_env(&env, "").fast_refresh());
    }

    #[test]
    fn test_interpolate_replaces_placeholders() {
        let env: BTreeMap<_, _> = env_of(&[("REACT_APP_TITLE", "Demo")]).into_iter().collect();
        let client = ClientEnvironment::from_env(&env, "");
        let html = client.interpolate(r#"<link href="%PUBLIC_URL%/x.ico"><title>%REACT_APP_TITLE%</title>"#);
        assert_eq!(html, r#"<link href="/x.ico"><title>Demo</title>"#);
    }
}
