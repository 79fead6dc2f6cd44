//! The built-in dev server on axum.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use crate::compiler::CompilerHandle;
use crate::config::Protocol;
use crate::errors::StartupError;
use crate::proxy::{ProxyRequest, ProxyRule};
use crate::server::{DevServer, DevServerFactory, ServerConfig, ServerStarted};
use crate::ui::StartupUI;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_PROXY_BODY: usize = 64 * 1024 * 1024;

pub struct HttpDevServerFactory {
    ui: StartupUI,
}

impl HttpDevServerFactory {
    pub fn new(ui: StartupUI) -> Self {
        Self { ui }
    }
}

impl DevServerFactory for HttpDevServerFactory {
    fn create(&self, config: ServerConfig, compiler: CompilerHandle) -> Box<dyn DevServer> {
        Box::new(HttpDevServer {
            config,
            compiler,
            ui: self.ui,
            shutdown: None,
            task: None,
        })
    }
}

pub struct HttpDevServer {
    config: ServerConfig,
    compiler: CompilerHandle,
    ui: StartupUI,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl DevServer for HttpDevServer {
    async fn start(&mut self) -> Result<ServerStarted, StartupError> {
        if self.config.protocol == Protocol::Https {
            return Err(StartupError::ServerStart(
                "HTTPS=true is not supported by the built-in dev server.\n\
                 Unset HTTPS, or terminate TLS in front of the dev server."
                    .to_string(),
            ));
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| StartupError::ServerStart(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| StartupError::ServerStart(e.to_string()))?;

        self.compiler.watch()?;

        let app = build_router(DevState::new(self.config.clone(), self.ui)?);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (fault_tx, fault_rx) = oneshot::channel::<String>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "dev server stopped unexpectedly");
                let _ = fault_tx.send(format!("Dev server error: {}", e));
            }
        });

        tracing::info!(%local_addr, "dev server listening");
        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        Ok(ServerStarted {
            local_addr,
            fault: Some(fault_rx),
        })
    }

    async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("dev server did not drain in time; aborting");
                task.abort();
            }
        }
        self.compiler.close().await;
        tracing::debug!("dev server closed");
    }
}

/// Shared request state.
pub struct DevState {
    config: ServerConfig,
    ui: StartupUI,
    client: reqwest::Client,
}

impl DevState {
    pub fn new(config: ServerConfig, ui: StartupUI) -> Result<Arc<Self>, StartupError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| StartupError::ServerStart(format!("Failed to create proxy client: {}", e)))?;
        Ok(Arc::new(Self { config, ui, client }))
    }
}

pub fn build_router(state: Arc<DevState>) -> Router {
    Router::new()
        .fallback(dev_handler)
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Host check, then proxy, then static files, then the history fallback.
async fn dev_handler(State(state): State<Arc<DevState>>, req: Request<Body>) -> Response {
    let host = header_str(req.headers(), header::HOST).to_string();
    if !state.config.allowed_hosts.allows(&host) {
        tracing::warn!(%host, "rejected request with unknown Host header");
        return (StatusCode::FORBIDDEN, "Invalid Host header").into_response();
    }

    let path = req.uri().path().to_string();
    let accept = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let is_read = matches!(*req.method(), Method::GET | Method::HEAD);

    let proxy_request = ProxyRequest {
        is_get: req.method() == Method::GET,
        path: &path,
        accept: accept.as_deref(),
    };
    if let Some(rule) = state.config.proxy.find(&proxy_request).cloned() {
        return forward(&state, &rule, req, &host).await;
    }

    if !is_read {
        return StatusCode::NOT_FOUND.into_response();
    }

    match relative_asset_path(&path, &state.config.public_path) {
        Some(relative) if relative.as_os_str().is_empty() || relative == Path::new("index.html") => {
            return serve_index(&state).await;
        }
        Some(relative) => {
            if let Some(response) = serve_static(&state.config.static_dirs, &relative).await {
                return response;
            }
        }
        None => {}
    }

    let wants_html = accept
        .as_deref()
        .is_some_and(|a| a.contains("text/html") || a.contains("*/*"));
    if state.config.history_fallback && wants_html {
        return serve_index(&state).await;
    }
    StatusCode::NOT_FOUND.into_response()
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Path relative to the public path, or `None` when the request is outside it
/// or tries to leave the served directories.
fn relative_asset_path(path: &str, public_path: &str) -> Option<PathBuf> {
    let base = public_path.trim_end_matches('/');
    let rest = path.strip_prefix(base)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    let relative = PathBuf::from(rest.trim_start_matches('/'));
    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(relative)
}

async fn serve_static(dirs: &[PathBuf], relative: &Path) -> Option<Response> {
    for dir in dirs {
        let candidate = dir.join(relative);
        let is_file = tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|m| m.is_file());
        if !is_file {
            continue;
        }
        return Some(match tokio::fs::read(&candidate).await {
            Ok(bytes) => {
                let mime = mime_guess::from_path(&candidate).first_or_octet_stream();
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                    bytes,
                )
                    .into_response()
            }
            Err(e) => {
                tracing::warn!(path = %candidate.display(), error = %e, "failed to read static file");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        });
    }
    None
}

async fn serve_index(state: &DevState) -> Response {
    match tokio::fs::read_to_string(&state.config.index_html).await {
        Ok(template) => Html(state.config.client_env.interpolate(&template)).into_response(),
        Err(e) => {
            tracing::warn!(path = %state.config.index_html.display(), error = %e, "index.html unavailable");
            (StatusCode::NOT_FOUND, "index.html not found in the public folder.").into_response()
        }
    }
}

async fn forward(state: &DevState, rule: &ProxyRule, req: Request<Body>, host: &str) -> Response {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let url = format!("{}{}", rule.target, path_and_query);
    let (parts, body) = req.into_parts();

    let body = match axum::body::to_bytes(body, MAX_PROXY_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    if rule.change_origin {
        headers.remove(header::HOST);
    }

    tracing::debug!(method = %parts.method, %url, "proxying request");
    let result = state
        .client
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => return proxy_failure(state, &path_and_query, host, &rule.target, &e.to_string()),
    };

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);
    response_headers.remove(header::CONTENT_LENGTH);

    match upstream.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = response_headers;
            response
        }
        Err(e) => proxy_failure(state, &path_and_query, host, &rule.target, &e.to_string()),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::TE,
        header::TRAILER,
        header::UPGRADE,
        header::PROXY_AUTHORIZATION,
        header::PROXY_AUTHENTICATE,
    ] {
        headers.remove(name);
    }
}

fn proxy_failure(state: &DevState, path: &str, host: &str, target: &str, cause: &str) -> Response {
    state.ui.proxy_error(path, host, target, cause);
    tracing::warn!(path, target, cause, "proxy request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Proxy error: Could not proxy request {} from {} to {}.", path, host, target),
    )
        .into_response()
}
