//! `package.json` metadata the launcher cares about.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::StartupError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Raw proxy declaration, normalized later by [`crate::proxy::prepare_proxy`].
    #[serde(default)]
    pub proxy: Option<Value>,
    #[serde(default)]
    pub browserslist: Option<Value>,
}

impl PackageMetadata {
    /// Load `package.json`, or `None` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, StartupError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| StartupError::Package {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let metadata = serde_json::from_str(&content).map_err(|e| StartupError::Package {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Some(metadata))
    }
}
