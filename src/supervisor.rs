//! Waits for the first shutdown trigger and closes the server.

use std::future::Future;

use anyhow::Context;
use futures::future::pending;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;

use crate::errors::StartupError;
use crate::lifecycle::ServerLifecycle;
use crate::ui::StartupUI;

/// What ended the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Interrupt,
    Terminate,
    EndOfInput,
    /// The server died on its own.
    Fault(String),
}

impl ShutdownTrigger {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownTrigger::Fault(_) => 1,
            _ => 0,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ShutdownTrigger::Interrupt => "interrupted",
            ShutdownTrigger::Terminate => "terminated",
            ShutdownTrigger::EndOfInput => "input closed",
            ShutdownTrigger::Fault(_) => "server error",
        }
    }
}

pub struct SignalSupervisor {
    /// Stdin EOF counts as a trigger; off in CI, where stdin is often closed.
    watch_stdin: bool,
    ui: StartupUI,
}

impl SignalSupervisor {
    pub fn new(watch_stdin: bool, ui: StartupUI) -> Self {
        Self { watch_stdin, ui }
    }

    /// Install the handlers, wait for the first trigger, then shut down.
    pub async fn supervise(&self, lifecycle: &ServerLifecycle) -> Result<ShutdownTrigger, StartupError> {
        let terminate = install_terminate()?;
        let fault = lifecycle.take_fault().await;
        let watch_stdin = self.watch_stdin;
        tracing::debug!(watch_stdin, "shutdown handlers installed");

        let trigger = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => ShutdownTrigger::Interrupt,
                _ = terminate => ShutdownTrigger::Terminate,
                _ = end_of_input(), if watch_stdin => ShutdownTrigger::EndOfInput,
                message = fault_message(fault) => ShutdownTrigger::Fault(message),
            }
        };
        Ok(self.supervise_with(lifecycle, trigger).await)
    }

    /// Shut down once `trigger` resolves.
    pub async fn supervise_with<F>(&self, lifecycle: &ServerLifecycle, trigger: F) -> ShutdownTrigger
    where
        F: Future<Output = ShutdownTrigger>,
    {
        let trigger = trigger.await;
        tracing::info!(reason = trigger.reason(), "shutdown requested");
        if let ShutdownTrigger::Fault(message) = &trigger {
            println!("{}", message);
        }
        self.ui.shutting_down(trigger.reason());
        lifecycle.shutdown().await;
        trigger
    }
}

#[cfg(unix)]
fn install_terminate() -> Result<impl Future<Output = ()>, StartupError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    Ok(async move {
        terminate.recv().await;
    })
}

#[cfg(not(unix))]
fn install_terminate() -> Result<impl Future<Output = ()>, StartupError> {
    Ok(pending::<()>())
}

async fn end_of_input() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 1024];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => return,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "stdin unreadable; treating as closed");
                return;
            }
        }
    }
}

async fn fault_message(fault: Option<oneshot::Receiver<String>>) -> String {
    match fault {
        Some(receiver) => match receiver.await {
            Ok(message) => message,
            // Sender dropped: the server ended cleanly.
            Err(_) => pending().await,
        },
        None => pending().await,
    }
}
