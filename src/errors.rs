//! Typed error hierarchy for the startup pipeline.
//!
//! Every way a launch can abort is a `StartupError` variant. `main` prints the
//! message and exits with [`StartupError::exit_code`]; a voluntary abort (the
//! user declining another port) is not an error and never reaches this type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that terminate startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Could not find a required file.")]
    MissingFiles { missing: Vec<PathBuf> },

    #[error("{0}")]
    Compatibility(String),

    #[error("{message}")]
    PortUnavailable { port: u16, message: String },

    #[error("Could not find an open port at {host}.\nNetwork error message: {message}")]
    NoOpenPort { host: String, message: String },

    #[error("Invalid PORT value '{0}': expected an integer between 1 and 65535")]
    InvalidPort(String),

    #[error("{0}")]
    Proxy(String),

    #[error("Failed to read {path}: {message}")]
    Package { path: PathBuf, message: String },

    #[error("Invalid devstart.toml at {path}: {message}")]
    ProjectConfig { path: PathBuf, message: String },

    #[error("Invalid build configuration: {0}")]
    BuildConfig(String),

    #[error("{0}")]
    Compiler(String),

    #[error("{0}")]
    ServerStart(String),

    #[error("The development server was already started")]
    AlreadyStarted,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StartupError {
    /// Process exit code for this failure. Every startup failure exits 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_is_matchable_and_carries_paths() {
        let err = StartupError::MissingFiles {
            missing: vec![PathBuf::from("/app/public/index.html")],
        };
        match &err {
            StartupError::MissingFiles { missing } => {
                assert_eq!(missing[0], PathBuf::from("/app/public/index.html"));
            }
            _ => panic!("Expected MissingFiles"),
        }
        assert_eq!(err.to_string(), "Could not find a required file.");
    }

    #[test]
    fn port_unavailable_displays_message_verbatim() {
        let err = StartupError::PortUnavailable {
            port: 3000,
            message: "Something is already running on port 3000.".into(),
        };
        assert_eq!(err.to_string(), "Something is already running on port 3000.");
    }

    #[test]
    fn no_open_port_names_host_and_cause() {
        let err = StartupError::NoOpenPort {
            host: "0.0.0.0".into(),
            message: "address not available".into(),
        };
        let text = err.to_string();
        assert!(text.contains("0.0.0.0"));
        assert!(text.contains("address not available"));
    }

    #[test]
    fn converts_from_anyhow() {
        let err: StartupError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, StartupError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn every_variant_exits_with_one() {
        let errs = [
            StartupError::Compatibility("x".into()),
            StartupError::AlreadyStarted,
            StartupError::ServerStart("EADDRINUSE".into()),
            StartupError::Proxy("bad".into()),
        ];
        for err in errs {
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StartupError::AlreadyStarted);
    }
}
