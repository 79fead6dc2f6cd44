//! Compiler sessions: the build behind the dev server.
//!
//! The factory only wires a session together. Nothing is spawned until the
//! server starts watching.

pub mod messages;
pub mod reporter;
pub mod session;

pub use messages::Diagnostics;
pub use reporter::{CompileOutcome, CompileReporter};
pub use session::{CommandSession, StaticSession};

use std::time::Duration;

use async_trait::async_trait;

use crate::build_config::BuildConfig;
use crate::errors::StartupError;
use crate::ui::StartupUI;
use crate::urls::AppUrls;

/// Inputs for a compiler session.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub app_name: String,
    pub config: BuildConfig,
    pub urls: AppUrls,
    pub use_yarn: bool,
    pub use_typescript: bool,
}

/// A running or runnable build.
#[async_trait]
pub trait CompileSession: Send {
    /// Start compiling and keep rebuilding on change.
    fn watch(&mut self) -> Result<(), StartupError>;
    /// Stop the build. Returns once every process it started has exited.
    async fn close(&mut self);
}

/// Opaque handle to a compile session, owned by the dev server.
pub struct CompilerHandle {
    session: Box<dyn CompileSession>,
}

impl CompilerHandle {
    pub fn new(session: impl CompileSession + 'static) -> Self {
        Self {
            session: Box::new(session),
        }
    }

    pub fn watch(&mut self) -> Result<(), StartupError> {
        self.session.watch()
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }
}

impl std::fmt::Debug for CompilerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerHandle").finish_non_exhaustive()
    }
}

pub trait CompilerFactory: Send + Sync {
    fn create(&self, options: CompilerOptions) -> Result<CompilerHandle, StartupError>;
}

/// Runs `[build] command` from `devstart.toml`, or serves files as they are
/// when no command is configured.
#[derive(Debug, Clone, Copy)]
pub struct CommandCompilerFactory {
    ui: StartupUI,
}

impl CommandCompilerFactory {
    pub fn new(ui: StartupUI) -> Self {
        Self { ui }
    }
}

impl CompilerFactory for CommandCompilerFactory {
    fn create(&self, options: CompilerOptions) -> Result<CompilerHandle, StartupError> {
        let reporter = CompileReporter::new(
            self.ui,
            options.app_name,
            options.urls,
            options.use_yarn,
            options.use_typescript,
        );
        Ok(match options.config.command {
            Some(_) => CompilerHandle::new(CommandSession::new(options.config, reporter)),
            None => {
                tracing::debug!("no build command configured; serving static files");
                let settle = Duration::from_millis(options.config.settle_ms);
                CompilerHandle::new(StaticSession::new(reporter, settle))
            }
        })
    }
}
