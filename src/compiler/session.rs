//! Compile sessions backing a [`CompilerHandle`](super::CompilerHandle).

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::build_config::BuildConfig;
use crate::compiler::CompileSession;
use crate::compiler::messages::Diagnostics;
use crate::compiler::reporter::{CompileOutcome, CompileReporter};
use crate::errors::StartupError;

/// How long the bundler gets to exit after SIGTERM before the group is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on reading output left in the pipes after the bundler exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Session for projects without a build command: the output directory and
/// public folder are served as they are. The single compile is reported after
/// one quiet period, like a bundler that printed nothing.
pub struct StaticSession {
    reporter: Option<CompileReporter>,
    settle: Duration,
    task: Option<JoinHandle<()>>,
}

impl StaticSession {
    pub fn new(reporter: CompileReporter, settle: Duration) -> Self {
        Self {
            reporter: Some(reporter),
            settle,
            task: None,
        }
    }
}

#[async_trait]
impl CompileSession for StaticSession {
    fn watch(&mut self) -> Result<(), StartupError> {
        let Some(mut reporter) = self.reporter.take() else {
            return Ok(());
        };
        let settle = self.settle;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            reporter.done(&Diagnostics::default());
        }));
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

/// Session that runs the configured bundler command in watch mode and turns
/// its output into compile cycles.
///
/// The bundler runs in its own process group, so closing the session also
/// stops whatever a wrapper like `npx` or `sh -c` started underneath it.
pub struct CommandSession {
    config: BuildConfig,
    reporter: Option<CompileReporter>,
    running: Option<Running>,
}

struct Running {
    /// Process group of the bundler (its pid).
    pgid: Option<u32>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Vec<CompileOutcome>>,
}

impl CommandSession {
    pub fn new(config: BuildConfig, reporter: CompileReporter) -> Self {
        Self {
            config,
            reporter: Some(reporter),
            running: None,
        }
    }
}

#[async_trait]
impl CompileSession for CommandSession {
    fn watch(&mut self) -> Result<(), StartupError> {
        let Some(reporter) = self.reporter.take() else {
            return Err(StartupError::Compiler(
                "The build command is already being watched.".to_string(),
            ));
        };
        let mut command = build_command(&self.config)?;
        let child = command.spawn().map_err(|e| {
            StartupError::Compiler(format!(
                "Failed to start build command `{}`: {}",
                command_line(&self.config),
                e
            ))
        })?;
        let pgid = child.id();
        tracing::info!(
            pid = pgid.unwrap_or(0),
            command = %command_line(&self.config),
            "build command started"
        );

        let settle = Duration::from_millis(self.config.settle_ms);
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(drive(child, pgid, reporter, settle, stop_rx));
        self.running = Some(Running { pgid, stop, task });
        Ok(())
    }

    async fn close(&mut self) {
        let Some(Running { pgid, stop, mut task }) = self.running.take() else {
            return;
        };
        let _ = stop.send(());
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
            tracing::warn!("build command did not stop in time; killing");
            kill_group(pgid);
            task.abort();
            let _ = task.await;
        }
        tracing::debug!("build command stopped");
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            kill_group(running.pgid);
            running.task.abort();
        }
    }
}

fn build_command(config: &BuildConfig) -> Result<Command, StartupError> {
    let argv = config.command.as_deref().unwrap_or_default();
    let Some((program, args)) = argv.split_first() else {
        return Err(StartupError::Compiler("No build command configured.".to_string()));
    };
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&config.app_path)
        .env_clear()
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    Ok(command)
}

fn command_line(config: &BuildConfig) -> String {
    config.command.as_deref().unwrap_or_default().join(" ")
}

#[cfg(unix)]
fn signal_group(pgid: Option<u32>, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pgid) = pgid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), signal) {
        // ESRCH: the whole group is already gone.
        if e != nix::errno::Errno::ESRCH {
            tracing::warn!(pgid, ?signal, error = %e, "failed to signal build command");
        }
    }
}

#[cfg(unix)]
fn terminate_group(pgid: Option<u32>) {
    signal_group(pgid, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    signal_group(pgid, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(not(unix))]
fn terminate_group(_pgid: Option<u32>) {}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}

/// Stop the bundler and everything in its process group.
async fn terminate(child: &mut Child, pgid: Option<u32>) {
    terminate_group(pgid);
    if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_err() {
        tracing::warn!("build command ignored SIGTERM");
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "failed to kill build command");
        }
    }
    kill_group(pgid);
}

async fn forward_lines<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Run the compile loop until the bundler exits or `stop` fires.
///
/// Output arriving after a quiet period opens a cycle; `settle` without output
/// closes and reports it. A stopped session reports nothing further.
async fn drive(
    mut child: Child,
    pgid: Option<u32>,
    mut reporter: CompileReporter,
    settle: Duration,
    mut stop: oneshot::Receiver<()>,
) -> Vec<CompileOutcome> {
    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    let mut outcomes = Vec::new();
    let mut cycle: Vec<String> = Vec::new();
    let mut in_cycle = false;
    let mut streams_open = true;

    let status = loop {
        tokio::select! {
            _ = &mut stop => {
                terminate(&mut child, pgid).await;
                return outcomes;
            }
            line = rx.recv(), if streams_open => match line {
                Some(line) => {
                    if !in_cycle {
                        reporter.invalid();
                        in_cycle = true;
                    }
                    cycle.push(line);
                }
                None => streams_open = false,
            },
            _ = tokio::time::sleep(settle), if in_cycle => {
                outcomes.push(reporter.done(&Diagnostics::from_output(&cycle)));
                cycle.clear();
                in_cycle = false;
            }
            status = child.wait() => break status,
        }
    };

    // Leftover processes from a wrapper command would hold the pipes open.
    kill_group(pgid);
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(line) = rx.recv().await {
            in_cycle = true;
            cycle.push(line);
        }
    })
    .await;

    let mut diagnostics = Diagnostics::from_output(&cycle);
    let failure = exit_failure(&status);
    if let Some(message) = &failure {
        diagnostics.errors.push(message.clone());
    }
    if in_cycle || failure.is_some() || reporter.is_first_compile() {
        outcomes.push(reporter.done(&diagnostics));
    }
    match failure {
        Some(message) => tracing::warn!(%message, "build command stopped"),
        None => tracing::info!("build command exited"),
    }
    outcomes
}

fn exit_failure(status: &std::io::Result<ExitStatus>) -> Option<String> {
    match status {
        Ok(status) if status.success() => None,
        Ok(status) => Some(format!("Build command exited with {}.", status)),
        Err(e) => Some(format!("Failed to wait for the build command: {}.", e)),
    }
}
