//! Installed framework versions and the fast-refresh advisory.

use std::path::PathBuf;

use semver::Version;
use serde::Deserialize;

use crate::ui::StartupUI;

pub const FAST_REFRESH_MIN_REACT: Version = Version::new(16, 10, 0);

pub trait VersionProvider: Send + Sync {
    /// Version of `package` installed for the app, if it can be determined.
    fn installed_version(&self, package: &str) -> Option<Version>;
}

/// Reads `node_modules/<package>/package.json`.
#[derive(Debug, Clone)]
pub struct NodeModulesVersions {
    node_modules: PathBuf,
}

impl NodeModulesVersions {
    pub fn new(node_modules: impl Into<PathBuf>) -> Self {
        Self {
            node_modules: node_modules.into(),
        }
    }
}

#[derive(Deserialize)]
struct Manifest {
    version: Option<String>,
}

impl VersionProvider for NodeModulesVersions {
    fn installed_version(&self, package: &str) -> Option<Version> {
        let path = self.node_modules.join(package).join("package.json");
        let content = std::fs::read_to_string(&path).ok()?;
        let manifest: Manifest = serde_json::from_str(&content).ok()?;
        let raw = manifest.version?;
        match Version::parse(raw.trim()) {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::debug!(package, version = %raw, error = %e, "unparseable installed version");
                None
            }
        }
    }
}

/// Warn when fast refresh is on but the installed React is too old for it.
///
/// Returns whether the warning was shown. Never blocks startup.
pub fn fast_refresh_advisory(
    versions: &dyn VersionProvider,
    fast_refresh: bool,
    ui: &StartupUI,
) -> bool {
    if !fast_refresh {
        return false;
    }
    let Some(installed) = versions.installed_version("react") else {
        tracing::debug!("react is not installed; skipping fast refresh check");
        return false;
    };
    // Prereleases of 16.10.0 are too old too.
    if installed < FAST_REFRESH_MIN_REACT {
        ui.fast_refresh_unsupported(&installed.to_string());
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn install(dir: &std::path::Path, package: &str, version: &str) {
        let pkg = dir.join(package);
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("package.json"),
            format!(r#"{{"name": "{}", "version": "{}"}}"#, package, version),
        )
        .unwrap();
    }

    #[test]
    fn test_reads_installed_version() {
        let dir = tempdir().unwrap();
        install(dir.path(), "react", "17.0.2");
        let versions = NodeModulesVersions::new(dir.path());
        assert_eq!(versions.installed_version("react"), Some(Version::new(17, 0, 2)));
        assert_eq!(versions.installed_version("vue"), None);
    }

    #[test]
    fn test_old_react_gets_advisory() {
        let dir = tempdir().unwrap();
        install(dir.path(), "react", "16.9.0");
        let versions = NodeModulesVersions::new(dir.path());
        assert!(fast_refresh_advisory(&versions, true, &StartupUI::new(false)));
    }

    #[test]
    fn test_supported_react_or_disabled_refresh_is_quiet() {
        let dir = tempdir().unwrap();
        install(dir.path(), "react", "16.10.0");
        let versions = NodeModulesVersions::new(dir.path());
        let ui = StartupUI::new(false);
        assert!(!fast_refresh_advisory(&versions, true, &ui));

        install(dir.path(), "react", "15.0.0");
        assert!(!fast_refresh_advisory(&versions, false, &ui));
    }

    #[test]
    fn test_missing_react_is_quiet() {
        let dir = tempdir().unwrap();
        let versions = NodeModulesVersions::new(dir.path());
        assert!(!fast_refresh_advisory(&versions, true, &StartupUI::new(false)));
    }
}
