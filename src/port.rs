//! Port negotiation: turn the requested port into one the server can bind.

use std::io;

use async_trait::async_trait;
use console::style;
use tokio::net::TcpListener;

use crate::errors::StartupError;
use crate::prompt::Prompt;
use crate::ui::StartupUI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    Free,
    InUse,
    /// Binding was refused for lack of privileges.
    Restricted,
}

/// Answers whether a port is currently bindable.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn probe(&self, host: &str, port: u16) -> io::Result<PortStatus>;
}

/// Probes by binding and immediately releasing a listener.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpPortProbe;

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn probe(&self, host: &str, port: u16) -> io::Result<PortStatus> {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                drop(listener);
                Ok(PortStatus::Free)
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(PortStatus::InUse),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(PortStatus::Restricted),
            Err(e) => Err(e),
        }
    }
}

pub struct PortNegotiator<'a> {
    probe: &'a dyn PortProbe,
    prompt: &'a dyn Prompt,
    ui: StartupUI,
}

impl<'a> PortNegotiator<'a> {
    pub fn new(probe: &'a dyn PortProbe, prompt: &'a dyn Prompt, ui: StartupUI) -> Self {
        Self { probe, prompt, ui }
    }

    /// Resolve `requested` to a bindable port on `host`.
    ///
    /// Returns `Ok(None)` when the user declines to run on another port. A busy
    /// port in a non-interactive session is an error: ports never change
    /// silently under automation.
    pub async fn negotiate(&self, host: &str, requested: u16) -> Result<Option<u16>, StartupError> {
        let status = self.probe_or_fail(host, requested).await?;
        if status == PortStatus::Free {
            tracing::debug!(host, port = requested, "requested port is free");
            return Ok(Some(requested));
        }

        let message = occupied_message(requested, status);
        if !self.ui.is_interactive() {
            return Err(StartupError::PortUnavailable {
                port: requested,
                message,
            });
        }

        self.ui.clear();
        let question = format!(
            "{}\n\nWould you like to run the app on another port instead?",
            style(&message).yellow()
        );
        if !self.prompt.confirm(&question, true)? {
            tracing::info!(port = requested, "user declined to switch ports");
            return Ok(None);
        }

        let next = self.next_free_port(host, requested).await?;
        tracing::info!(requested, chosen = next, "switching to next free port");
        Ok(Some(next))
    }

    async fn next_free_port(&self, host: &str, after: u16) -> Result<u16, StartupError> {
        let Some(start) = after.checked_add(1) else {
            return Err(no_open_port(host, "no ports left above 65535"));
        };
        for port in start..=u16::MAX {
            if self.probe_or_fail(host, port).await? == PortStatus::Free {
                return Ok(port);
            }
        }
        Err(no_open_port(host, "every port above the requested one is taken"))
    }

    async fn probe_or_fail(&self, host: &str, port: u16) -> Result<PortStatus, StartupError> {
        self.probe
            .probe(host, port)
            .await
            .map_err(|e| no_open_port(host, &e.to_string()))
    }
}

fn occupied_message(port: u16, status: PortStatus) -> String {
    if status == PortStatus::Restricted && port < 1024 && !cfg!(windows) {
        "Admin permissions are required to run a server on a port below 1024.".to_string()
    } else {
        format!("Something is already running on port {}.", port)
    }
}

fn no_open_port(host: &str, message: &str) -> StartupError {
    StartupError::NoOpenPort {
        host: host.to_string(),
        message: message.to_string(),
    }
}
