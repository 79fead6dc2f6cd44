//! Normalization of the `proxy` declaration in `package.json`.
//!
//! A string declares one upstream that receives every request the dev server
//! can't answer itself (API calls, not pages or public files). An object maps
//! path prefixes to upstreams explicitly.

use std::net::ToSocketAddrs;
use std::path::{Component, Path, PathBuf};

use reqwest::Url;
use serde_json::Value;

use crate::errors::StartupError;

/// Paths the dev server keeps for its own socket endpoint.
pub const SOCKET_ENDPOINTS: &[&str] = &["/sockjs-node", "/ws"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMatcher {
    /// String declaration: proxy anything that isn't a page, a public file or
    /// the socket endpoint.
    Fallback {
        public_dir: PathBuf,
        served_path: String,
    },
    /// Object declaration: proxy requests under this path prefix.
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    pub matcher: ProxyMatcher,
    /// Upstream origin, without trailing slash
    pub target: String,
    /// Rewrite the `Host` header to the upstream's
    pub change_origin: bool,
    pub ws: bool,
}

/// Request facts the matcher needs.
#[derive(Debug, Clone, Copy)]
pub struct ProxyRequest<'a> {
    pub is_get: bool,
    pub path: &'a str,
    pub accept: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub rules: Vec<ProxyRule>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule that claims the request, if any.
    pub fn find(&self, request: &ProxyRequest<'_>) -> Option<&ProxyRule> {
        self.rules.iter().find(|rule| rule.matches(request))
    }
}

impl ProxyRule {
    pub fn matches(&self, request: &ProxyRequest<'_>) -> bool {
        match &self.matcher {
            ProxyMatcher::Prefix(prefix) => request.path.starts_with(prefix.as_str()),
            ProxyMatcher::Fallback {
                public_dir,
                served_path,
            } => {
                !request.is_get
                    || (may_proxy(request.path, public_dir, served_path)
                        && request.accept.is_some_and(|a| !a.contains("text/html")))
            }
        }
    }
}

impl std::fmt::Display for ProxyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.matcher {
            ProxyMatcher::Prefix(prefix) => write!(f, "{} -> {}", prefix, self.target)?,
            ProxyMatcher::Fallback { .. } => write!(f, "(unhandled requests) -> {}", self.target)?,
        }
        let flags: Vec<&str> = [("changeOrigin", self.change_origin), ("ws", self.ws)]
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect();
        if !flags.is_empty() {
            write!(f, " ({})", flags.join(", "))?;
        }
        Ok(())
    }
}

fn may_proxy(path: &str, public_dir: &Path, served_path: &str) -> bool {
    if SOCKET_ENDPOINTS.iter().any(|endpoint| path.starts_with(endpoint)) {
        return false;
    }
    !is_public_file(path, public_dir, served_path)
}

fn is_public_file(path: &str, public_dir: &Path, served_path: &str) -> bool {
    let relative = path.strip_prefix(served_path).unwrap_or(path);
    let relative = Path::new(relative.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return false;
    }
    public_dir.join(relative).exists()
}

/// Turn the raw `proxy` value into rules. Absent means no proxying.
pub fn prepare_proxy(
    declaration: Option<&Value>,
    public_dir: &Path,
    served_path: &str,
) -> Result<ProxyConfig, StartupError> {
    let rules = match declaration {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(target)) => vec![ProxyRule {
            matcher: ProxyMatcher::Fallback {
                public_dir: public_dir.to_path_buf(),
                served_path: served_path.to_string(),
            },
            target: validate_target(target)?,
            change_origin: true,
            ws: true,
        }],
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(prefix, value)| object_rule(prefix, value))
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(StartupError::Proxy(format!(
                "When specified, \"proxy\" in package.json must be a string or an object.\n\
                 Instead, the type of \"proxy\" was \"{}\".\n\
                 Either remove \"proxy\" from package.json, or make it a string.",
                json_type(other)
            )));
        }
    };
    Ok(ProxyConfig { rules })
}

fn object_rule(prefix: &str, value: &Value) -> Result<ProxyRule, StartupError> {
    let (target, change_origin, ws) = match value {
        Value::String(target) => (target.as_str(), true, false),
        Value::Object(options) => {
            let target = options
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    StartupError::Proxy(format!(
                        "Proxy entry \"{}\" in package.json is missing a \"target\" string.",
                        prefix
                    ))
                })?;
            let change_origin = options
                .get("changeOrigin")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let ws = options.get("ws").and_then(Value::as_bool).unwrap_or(false);
            (target, change_origin, ws)
        }
        other => {
            return Err(StartupError::Proxy(format!(
                "Proxy entry \"{}\" in package.json must be a string or an object, not {}.",
                prefix,
                json_type(other)
            )));
        }
    };
    Ok(ProxyRule {
        matcher: ProxyMatcher::Prefix(prefix.to_string()),
        target: validate_target(target)?,
        change_origin,
        ws,
    })
}

fn validate_target(target: &str) -> Result<String, StartupError> {
    if !(target.starts_with("http://") || target.starts_with("https://")) {
        return Err(StartupError::Proxy(
            "When \"proxy\" is specified in package.json it must start with either http:// or https://"
                .to_string(),
        ));
    }
    Url::parse(target).map_err(|e| {
        StartupError::Proxy(format!("Invalid proxy target \"{}\": {}", target, e))
    })?;
    Ok(resolve_loopback(target.trim_end_matches('/')))
}

/// Rewrite `localhost` to `127.0.0.1` when the name doesn't resolve.
fn resolve_loopback(target: &str) -> String {
    let is_localhost = Url::parse(target)
        .ok()
        .is_some_and(|url| url.host_str() == Some("localhost"));
    if is_localhost && ("localhost", 0).to_socket_addrs().is_err() {
        tracing::debug!(target, "localhost does not resolve; using 127.0.0.1");
        return target.replacen("localhost", "127.0.0.1", 1);
    }
    target.to_string()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn get<'a>(path: &'a str, accept: Option<&'a str>) -> ProxyRequest<'a> {
        ProxyRequest {
            is_get: true,
            path,
            accept,
        }
    }

    #[test]
    fn test_absent_declaration_is_empty() {
        let dir = tempdir().unwrap();
        assert!(prepare_proxy(None, dir.path(), "/").unwrap().is_empty());
        assert!(prepare_proxy(Some(&Value::Null), dir.path(), "/").unwrap().is_empty());
    }

    #[test]
    fn test_string_declaration_builds_fallback_rule() {
        let dir = tempdir().unwrap();
        let config = prepare_proxy(Some(&json!("http://127.0.0.1:4000/")), dir.path(), "/").unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].target, "http://127.0.0.1:4000");
        assert!(config.rules[0].change_origin);
    }

    #[test]
    fn test_string_without_scheme_is_rejected() {
        let dir = tempdir().unwrap();
        let err = prepare_proxy(Some(&json!("localhost:4000")), dir.path(), "/").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_wrong_type_names_the_type() {
        let dir = tempdir().unwrap();
        let err = prepare_proxy(Some(&json!(4000)), dir.path(), "/").unwrap_err();
        assert!(err.to_string().contains("\"number\""));
    }

    #[test]
    fn test_fallback_matching_rules() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("favicon.ico"), "").unwrap();
        let config = prepare_proxy(Some(&json!("http://127.0.0.1:4000")), dir.path(), "/").unwrap();

        // API call from fetch
        assert!(config.find(&get("/api/todos", Some("application/json"))).is_some());
        // Page navigation stays local
        assert!(config.find(&get("/about", Some("text/html,*/*"))).is_none());
        // No Accept header on a GET is not proxied
        assert!(config.find(&get("/api/todos", None)).is_none());
        // Public files and the socket endpoint stay local
        assert!(config.find(&get("/favicon.ico", Some("*/*"))).is_none());
        assert!(config.find(&get("/sockjs-node/info", Some("*/*"))).is_none());
        // Any non-GET goes upstream
        let post = ProxyRequest {
            is_get: false,
            path: "/about",
            accept: Some("text/html"),
        };
        assert!(config.find(&post).is_some());
    }

    #[test]
    fn test_public_file_under_served_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("logo.svg"), "").unwrap();
        let config =
            prepare_proxy(Some(&json!("http://127.0.0.1:4000")), dir.path(), "/app/").unwrap();
        assert!(config.find(&get("/app/logo.svg", Some("*/*"))).is_none());
        assert!(config.find(&get("/app/api", Some("*/*"))).is_some());
    }

    #[test]
    fn test_traversal_is_never_a_public_file() {
        let dir = tempdir().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(&public).unwrap();
        fs::write(dir.path().join("secret.txt"), "").unwrap();
        let config = prepare_proxy(Some(&json!("http://127.0.0.1:4000")), &public, "/").unwrap();
        assert!(config.find(&get("/../secret.txt", Some("*/*"))).is_some());
    }

    #[test]
    fn test_object_declaration_prefix_rules() {
        let dir = tempdir().unwrap();
        let config = prepare_proxy(
            Some(&json!({
                "/api": "http://127.0.0.1:4000",
                "/socket": { "target": "http://127.0.0.1:5000", "ws": true, "changeOrigin": false }
            })),
            dir.path(),
            "/",
        )
        .unwrap();

        assert_eq!(config.rules.len(), 2);
        let api = config.find(&get("/api/users", Some("text/html"))).unwrap();
        assert_eq!(api.target, "http://127.0.0.1:4000");
        let socket = config.find(&get("/socket/x", None)).unwrap();
        assert!(socket.ws);
        assert!(!socket.change_origin);
        assert!(config.find(&get("/other", Some("*/*"))).is_none());
    }

    #[test]
    fn test_rules_display_target_and_flags() {
        let dir = tempdir().unwrap();
        let config = prepare_proxy(
            Some(&json!({
                "/api": { "target": "http://127.0.0.1:4000", "changeOrigin": false },
                "/socket": { "target": "http://127.0.0.1:5000", "ws": true }
            })),
            dir.path(),
            "/",
        )
        .unwrap();
        assert_eq!(config.rules[0].to_string(), "/api -> http://127.0.0.1:4000");
        assert_eq!(
            config.rules[1].to_string(),
            "/socket -> http://127.0.0.1:5000 (changeOrigin, ws)"
        );

        let fallback = prepare_proxy(Some(&json!("http://127.0.0.1:4000")), dir.path(), "/").unwrap();
        assert_eq!(
            fallback.rules[0].to_string(),
            "(unhandled requests) -> http://127.0.0.1:4000 (changeOrigin, ws)"
        );
    }

    #[test]
    fn test_object_entry_without_target_is_rejected() {
        let dir = tempdir().unwrap();
        let err = prepare_proxy(Some(&json!({"/api": {"ws": true}})), dir.path(), "/").unwrap_err();
        assert!(err.to_string().contains("\"/api\""));
    }
}
