//! Required-file check run before anything expensive.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::errors::StartupError;
use crate::paths::AppPaths;

/// Verify every path exists and can be opened for reading.
///
/// All missing files are collected so they can be reported together.
pub fn check_required_files(files: &[PathBuf]) -> Result<(), StartupError> {
    let missing: Vec<PathBuf> = files
        .iter()
        .filter(|path| !path.is_file() || File::open(path).is_err())
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        tracing::debug!(?missing, "required files missing");
        Err(StartupError::MissingFiles { missing })
    }
}

/// Check the required files of an app whose configuration hasn't been read
/// yet. They depend only on the directory, so a broken `package.json`,
/// `devstart.toml` or `PORT` can't hide them.
pub fn check_app_dir(app_dir: &Path) -> Result<(), StartupError> {
    check_required_files(&AppPaths::resolve(app_dir, "/".to_string()).required_files())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_all_present() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.js");
        fs::write(&a, "").unwrap();
        fs::write(&b, "").unwrap();
        assert!(check_required_files(&[a, b]).is_ok());
    }

    #[test]
    fn test_reports_every_missing_file() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("index.html");
        fs::write(&present, "").unwrap();
        let gone_a = dir.path().join("src/index.js");
        let gone_b = dir.path().join("other.js");

        let err = check_required_files(&[present, gone_a.clone(), gone_b.clone()]).unwrap_err();
        match err {
            StartupError::MissingFiles { missing } => assert_eq!(missing, vec![gone_a, gone_b]),
            other => panic!("Expected MissingFiles, got {:?}", other),
        }
    }

    #[test]
    fn test_app_dir_check_ignores_broken_package_json() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{ not json").unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/index.html"), "").unwrap();

        match check_app_dir(dir.path()).unwrap_err() {
            StartupError::MissingFiles { missing } => {
                assert_eq!(missing, vec![dir.path().join("src/index.js")]);
            }
            other => panic!("Expected MissingFiles, got {:?}", other),
        }
    }

    #[test]
    fn test_app_dir_check_accepts_typescript_entry() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("public/index.html"), "").unwrap();
        fs::write(dir.path().join("src/index.tsx"), "").unwrap();
        assert!(check_app_dir(dir.path()).is_ok());
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempdir().unwrap();
        let result = check_required_files(&[dir.path().to_path_buf()]);
        assert!(matches!(result, Err(StartupError::MissingFiles { .. })));
    }
}
