//! Filesystem layout of the application being served.

use std::path::{Path, PathBuf};

use reqwest::Url;

/// Extensions tried, in order, when resolving `src/index`.
pub const MODULE_FILE_EXTENSIONS: &[&str] = &[
    "web.mjs", "mjs", "web.js", "js", "web.ts", "ts", "web.tsx", "tsx", "json", "web.jsx", "jsx",
];

// Only the pathname of a joined URL is used, so the host is irrelevant.
const STUB_ORIGIN: &str = "https://devstart.local";

/// Resolved application paths. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app_path: PathBuf,
    pub app_build: PathBuf,
    pub app_public: PathBuf,
    pub app_html: PathBuf,
    pub app_index: PathBuf,
    pub app_package_json: PathBuf,
    pub app_src: PathBuf,
    pub app_tsconfig: PathBuf,
    pub app_node_modules: PathBuf,
    pub yarn_lock: PathBuf,
    /// Always ends with `/`.
    pub public_url_or_path: String,
}

impl AppPaths {
    pub fn resolve(app_path: &Path, public_url_or_path: String) -> Self {
        let app_src = app_path.join("src");
        let app_public = app_path.join("public");
        Self {
            app_path: app_path.to_path_buf(),
            app_build: app_path.join("build"),
            app_html: app_public.join("index.html"),
            app_index: resolve_module(&app_src.join("index")),
            app_public,
            app_package_json: app_path.join("package.json"),
            app_src,
            app_tsconfig: app_path.join("tsconfig.json"),
            app_node_modules: app_path.join("node_modules"),
            yarn_lock: app_path.join("yarn.lock"),
            public_url_or_path,
        }
    }

    /// Files that must exist before anything else runs.
    pub fn required_files(&self) -> Vec<PathBuf> {
        vec![self.app_html.clone(), self.app_index.clone()]
    }

    /// Public path without its trailing slash (`""` for the root).
    pub fn public_url_pathname(&self) -> &str {
        self.public_url_or_path
            .strip_suffix('/')
            .unwrap_or(&self.public_url_or_path)
    }

    pub fn use_yarn(&self) -> bool {
        self.yarn_lock.exists()
    }

    pub fn use_typescript(&self) -> bool {
        self.app_tsconfig.exists()
    }
}

/// Returns the first `stem.<ext>` that exists, or `stem.js`.
fn resolve_module(stem: &Path) -> PathBuf {
    MODULE_FILE_EXTENSIONS
        .iter()
        .map(|ext| with_extension(stem, ext))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| with_extension(stem, "js"))
}

fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Compute the URL or path the app is served under.
///
/// `PUBLIC_URL` wins over `homepage`. In development only the pathname is
/// used and relative values collapse to `/`. The result always ends with `/`.
pub fn public_url_or_path(
    is_development: bool,
    homepage: Option<&str>,
    env_public_url: Option<&str>,
) -> String {
    if let Some(public_url) = env_public_url.filter(|v| !v.is_empty()) {
        let public_url = with_trailing_slash(public_url);
        if !is_development {
            return public_url;
        }
        if public_url.starts_with('.') {
            return "/".to_string();
        }
        return pathname_of(&public_url);
    }

    if let Some(homepage) = homepage.filter(|v| !v.is_empty()) {
        let homepage = with_trailing_slash(homepage);
        if homepage.starts_with('.') {
            return if is_development {
                "/".to_string()
            } else {
                homepage
            };
        }
        return pathname_of(&homepage);
    }

    "/".to_string()
}

fn with_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}

fn pathname_of(value: &str) -> String {
    Url::parse(STUB_ORIGIN)
        .and_then(|base| base.join(value))
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| "/".to_string())
}
