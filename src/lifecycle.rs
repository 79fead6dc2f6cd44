//! Server lifecycle state machine.
//!
//! `Unstarted -> Starting -> Running -> Stopping -> Stopped`. A failed start
//! goes straight from `Starting` to `Stopping`. Only one start is ever
//! accepted, and the server is closed at most once no matter how many
//! shutdown triggers race.

use std::net::SocketAddr;

use tokio::sync::{Mutex, oneshot};

use crate::errors::StartupError;
use crate::server::{DevServer, ServerStarted};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Unstarted => "unstarted",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

struct Inner {
    state: ServerState,
    server: Option<Box<dyn DevServer>>,
    fault: Option<oneshot::Receiver<String>>,
}

pub struct ServerLifecycle {
    inner: Mutex<Inner>,
}

impl Default for ServerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLifecycle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ServerState::Unstarted,
                server: None,
                fault: None,
            }),
        }
    }

    pub async fn state(&self) -> ServerState {
        self.inner.lock().await.state
    }

    /// Start `server` and run `on_started` once it is listening.
    pub async fn start<F>(
        &self,
        mut server: Box<dyn DevServer>,
        on_started: F,
    ) -> Result<SocketAddr, StartupError>
    where
        F: FnOnce(&ServerStarted) + Send,
    {
        let mut inner = self.inner.lock().await;
        if inner.state != ServerState::Unstarted {
            tracing::warn!(state = %inner.state, "rejected second server start");
            return Err(StartupError::AlreadyStarted);
        }
        inner.state = ServerState::Starting;

        match server.start().await {
            Ok(mut started) => {
                inner.state = ServerState::Running;
                tracing::info!(addr = %started.local_addr, "server running");
                on_started(&started);
                inner.fault = started.fault.take();
                inner.server = Some(server);
                Ok(started.local_addr)
            }
            Err(e) => {
                tracing::warn!(error = %e, "server failed to start");
                inner.state = ServerState::Stopping;
                server.close().await;
                inner.state = ServerState::Stopped;
                Err(e)
            }
        }
    }

    /// Close the running server. Returns `false` when there was nothing to do
    /// because shutdown already happened or the server never ran.
    pub async fn shutdown(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != ServerState::Running {
            tracing::debug!(state = %inner.state, "shutdown ignored");
            return false;
        }
        inner.state = ServerState::Stopping;
        if let Some(mut server) = inner.server.take() {
            server.close().await;
        }
        inner.fault = None;
        inner.state = ServerState::Stopped;
        tracing::info!("server stopped");
        true
    }

    /// Receiver for runtime faults of the running server, handed out once.
    pub async fn take_fault(&self) -> Option<oneshot::Receiver<String>> {
        self.inner.lock().await.fault.take()
    }
}
