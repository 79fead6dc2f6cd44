//! Dev server launch for `devstart` and `devstart start`.

use std::path::Path;

use devstart::config::{StartupContext, process_env};
use devstart::pipeline::{Collaborators, Launch, StartupPipeline};
use devstart::preflight::check_app_dir;
use devstart::supervisor::SignalSupervisor;
use devstart::ui::StartupUI;

/// Run the launch to completion and return the process exit code.
pub async fn cmd_start(project_dir: &Path) -> i32 {
    let stdout_is_tty = console::Term::stdout().is_term();
    let loaded = check_app_dir(project_dir)
        .and_then(|()| StartupContext::load(project_dir, process_env(), stdout_is_tty));
    let ctx = match loaded {
        Ok(ctx) => ctx,
        Err(e) => {
            StartupUI::new(false).startup_error(&e);
            return e.exit_code();
        }
    };
    tracing::debug!(
        app = %ctx.paths.app_path.display(),
        host = %ctx.host,
        port = ctx.port,
        interactive = ctx.is_interactive,
        "startup context loaded"
    );

    let watch_stdin = !ctx.is_ci;
    let deps = Collaborators::system(&ctx);
    let pipeline = StartupPipeline::new(ctx, deps);
    let ui = pipeline.ui();

    let running = match pipeline.launch().await {
        Ok(Launch::Running(running)) => running,
        Ok(Launch::Declined) => {
            tracing::info!("launch declined by user");
            return 0;
        }
        Err(e) => {
            tracing::debug!(error = ?e, "launch failed");
            ui.startup_error(&e);
            return e.exit_code();
        }
    };

    let supervisor = SignalSupervisor::new(watch_stdin, ui);
    match supervisor.supervise(&running.lifecycle).await {
        Ok(trigger) => trigger.exit_code(),
        Err(e) => {
            ui.startup_error(&e);
            running.lifecycle.shutdown().await;
            e.exit_code()
        }
    }
}
