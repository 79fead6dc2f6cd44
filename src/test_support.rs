//! In-memory collaborators for unit tests.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use semver::Version;
use tokio::sync::oneshot;

use crate::browser::BrowserOpener;
use crate::compat::CompatibilityGate;
use crate::compiler::{CompileSession, CompilerFactory, CompilerHandle, CompilerOptions};
use crate::errors::StartupError;
use crate::port::{PortProbe, PortStatus};
use crate::prompt::Prompt;
use crate::server::{DevServer, DevServerFactory, ServerConfig, ServerStarted};
use crate::version::VersionProvider;

/// Answers prompts from a fixed script.
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool, StartupError> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StartupError::Prompt(format!("unexpected prompt: {}", question)))
    }
}

/// Port probe over a fixed set of occupied ports.
#[derive(Default)]
pub struct FakeProbe {
    busy: HashSet<u16>,
    restricted: HashSet<u16>,
    failing: bool,
}

impl FakeProbe {
    pub fn busy(ports: &[u16]) -> Self {
        Self {
            busy: ports.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn restricted(ports: &[u16]) -> Self {
        Self {
            restricted: ports.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PortProbe for FakeProbe {
    async fn probe(&self, _host: &str, port: u16) -> io::Result<PortStatus> {
        if self.failing {
            return Err(io::Error::other("getaddrinfo ENOTFOUND"));
        }
        Ok(if self.busy.contains(&port) {
            PortStatus::InUse
        } else if self.restricted.contains(&port) {
            PortStatus::Restricted
        } else {
            PortStatus::Free
        })
    }
}

/// Compile session that only counts calls.
#[derive(Clone, Default)]
pub struct FakeCompileSession {
    watched: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeCompileSession {
    pub fn watched(&self) -> usize {
        self.watched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompileSession for FakeCompileSession {
    fn watch(&mut self) -> Result<(), StartupError> {
        self.watched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every compiler it is asked for.
#[derive(Default)]
pub struct FakeCompilerFactory {
    pub created: Mutex<Vec<CompilerOptions>>,
    pub session: FakeCompileSession,
}

impl FakeCompilerFactory {
    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl CompilerFactory for FakeCompilerFactory {
    fn create(&self, options: CompilerOptions) -> Result<CompilerHandle, StartupError> {
        self.created.lock().unwrap().push(options);
        Ok(CompilerHandle::new(self.session.clone()))
    }
}

#[derive(Default)]
struct FakeServerInner {
    starts: AtomicUsize,
    closes: AtomicUsize,
    failure: Option<String>,
    fault: Mutex<Option<oneshot::Sender<String>>>,
}

/// Dev server that binds nothing. Clones share counters.
#[derive(Clone, Default)]
pub struct FakeServer {
    inner: Arc<FakeServerInner>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            inner: Arc::new(FakeServerInner {
                failure: Some(message.to_string()),
                ..FakeServerInner::default()
            }),
        }
    }

    pub fn boxed(&self) -> Box<dyn DevServer> {
        Box::new(self.clone())
    }

    pub fn starts(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Report a runtime fault as the real server's task would.
    pub fn fail_at_runtime(&self, message: &str) {
        if let Some(sender) = self.inner.fault.lock().unwrap().take() {
            let _ = sender.send(message.to_string());
        }
    }
}

#[async_trait]
impl DevServer for FakeServer {
    async fn start(&mut self) -> Result<ServerStarted, StartupError> {
        self.inner.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.inner.failure {
            return Err(StartupError::ServerStart(message.clone()));
        }
        let (tx, rx) = oneshot::channel();
        *self.inner.fault.lock().unwrap() = Some(tx);
        Ok(ServerStarted {
            local_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            fault: Some(rx),
        })
    }

    async fn close(&mut self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out one [`FakeServer`] and keeps the configs it was given.
#[derive(Default)]
pub struct FakeServerFactory {
    pub server: FakeServer,
    pub configs: Mutex<Vec<ServerConfig>>,
}

impl DevServerFactory for FakeServerFactory {
    fn create(&self, config: ServerConfig, _compiler: CompilerHandle) -> Box<dyn DevServer> {
        self.configs.lock().unwrap().push(config);
        self.server.boxed()
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    pub opened: Mutex<Vec<String>>,
}

impl BrowserOpener for FakeBrowser {
    fn open(&self, url: &str) -> bool {
        self.opened.lock().unwrap().push(url.to_string());
        true
    }
}

#[derive(Default)]
pub struct FakeVersions {
    pub react: Option<Version>,
}

impl VersionProvider for FakeVersions {
    fn installed_version(&self, package: &str) -> Option<Version> {
        match package {
            "react" => self.react.clone(),
            _ => None,
        }
    }
}

/// Compatibility gate with a fixed verdict.
pub struct FixedGate {
    pub verdict: Option<String>,
    pub checks: AtomicUsize,
}

impl FixedGate {
    pub fn pass() -> Self {
        Self {
            verdict: None,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn reject(message: &str) -> Self {
        Self {
            verdict: Some(message.to_string()),
            checks: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompatibilityGate for FixedGate {
    async fn check(&self, _app_path: &Path, _interactive: bool) -> Result<(), StartupError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match &self.verdict {
            None => Ok(()),
            Some(message) => Err(StartupError::Compatibility(message.clone())),
        }
    }
}
