//! The startup pipeline: preconditions, compatibility, port, compiler and
//! proxy, then the server.
//!
//! Every stage is awaited in order and either hands its result to the next
//! one or ends the launch with a [`StartupError`] or [`Launch::Declined`].

use std::net::SocketAddr;
use std::sync::Arc;

use crate::browser::{BrowserOpener, SystemBrowser};
use crate::build_config::{BuildConfigProvider, BuildMode, ProjectBuildConfig};
use crate::compat::{BrowserslistGate, CompatibilityGate};
use crate::compiler::{CommandCompilerFactory, CompilerFactory, CompilerOptions};
use crate::config::StartupContext;
use crate::errors::StartupError;
use crate::lifecycle::ServerLifecycle;
use crate::port::{PortNegotiator, PortProbe, TcpPortProbe};
use crate::preflight::check_required_files;
use crate::prompt::{Prompt, TerminalPrompt};
use crate::proxy::prepare_proxy;
use crate::server::{DevServerFactory, HttpDevServerFactory, ServerConfig};
use crate::ui::StartupUI;
use crate::urls::{AppUrls, prepare_urls};
use crate::version::{NodeModulesVersions, VersionProvider, fast_refresh_advisory};

/// The pipeline's injectable seams.
pub struct Collaborators {
    pub compat: Arc<dyn CompatibilityGate>,
    pub probe: Arc<dyn PortProbe>,
    pub prompt: Arc<dyn Prompt>,
    pub build_config: Arc<dyn BuildConfigProvider>,
    pub compilers: Arc<dyn CompilerFactory>,
    pub servers: Arc<dyn DevServerFactory>,
    pub versions: Arc<dyn VersionProvider>,
    pub browser: Arc<dyn BrowserOpener>,
}

impl Collaborators {
    /// The real terminal, network, bundler and browser.
    pub fn system(ctx: &StartupContext) -> Self {
        let ui = StartupUI::new(ctx.is_interactive);
        let prompt: Arc<dyn Prompt> = Arc::new(TerminalPrompt);
        Self {
            compat: Arc::new(BrowserslistGate::new(
                prompt.clone(),
                ui,
                ctx.var("BROWSERSLIST").map(String::from),
            )),
            probe: Arc::new(TcpPortProbe),
            prompt,
            build_config: Arc::new(ProjectBuildConfig::new(ctx.clone())),
            compilers: Arc::new(CommandCompilerFactory::new(ui)),
            servers: Arc::new(HttpDevServerFactory::new(ui)),
            versions: Arc::new(NodeModulesVersions::new(&ctx.paths.app_node_modules)),
            browser: Arc::new(SystemBrowser::new(ctx.var("BROWSER").map(String::from))),
        }
    }
}

/// A server that reached `Running`.
pub struct RunningServer {
    pub lifecycle: ServerLifecycle,
    pub urls: AppUrls,
    pub local_addr: SocketAddr,
}

pub enum Launch {
    /// The user chose not to run on another port.
    Declined,
    Running(RunningServer),
}

pub struct StartupPipeline {
    ctx: StartupContext,
    deps: Collaborators,
    ui: StartupUI,
}

impl StartupPipeline {
    pub fn new(ctx: StartupContext, deps: Collaborators) -> Self {
        let ui = StartupUI::new(ctx.is_interactive);
        Self { ctx, deps, ui }
    }

    pub fn ui(&self) -> StartupUI {
        self.ui
    }

    pub async fn launch(&self) -> Result<Launch, StartupError> {
        let ctx = &self.ctx;

        check_required_files(&ctx.paths.required_files())?;
        tracing::debug!("required files present");

        self.deps
            .compat
            .check(&ctx.paths.app_path, ctx.is_interactive)
            .await?;
        tracing::debug!("compatibility check passed");

        let negotiator = PortNegotiator::new(self.deps.probe.as_ref(), self.deps.prompt.as_ref(), self.ui);
        let Some(port) = negotiator.negotiate(&ctx.host, ctx.port).await? else {
            return Ok(Launch::Declined);
        };

        let build = self.deps.build_config.build_config(BuildMode::Development)?;
        let urls = prepare_urls(ctx.protocol, &ctx.host, port, ctx.paths.public_url_pathname());

        let compiler = self.deps.compilers.create(CompilerOptions {
            app_name: ctx.app_name.clone(),
            config: build.clone(),
            urls: urls.clone(),
            use_yarn: ctx.use_yarn,
            use_typescript: ctx.use_typescript,
        })?;
        let proxy = prepare_proxy(ctx.package.proxy.as_ref(), &ctx.paths.app_public, &build.public_path)?;
        tracing::debug!(rules = proxy.rules.len(), "proxy resolved");

        let config = ServerConfig::assemble(ctx, port, proxy, &build, &urls);
        let server = self.deps.servers.create(config, compiler);

        let lifecycle = ServerLifecycle::new();
        let local_addr = lifecycle
            .start(server, |_| self.on_started(&urls))
            .await?;

        Ok(Launch::Running(RunningServer {
            lifecycle,
            urls,
            local_addr,
        }))
    }

    fn on_started(&self, urls: &AppUrls) {
        self.ui.clear();
        fast_refresh_advisory(
            self.deps.versions.as_ref(),
            self.ctx.client_env.fast_refresh(),
            &self.ui,
        );
        self.ui.starting_server();
        self.deps.browser.open(&urls.local_url_for_browser);
    }
}
