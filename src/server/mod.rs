//! Dev server: configuration and the seam the lifecycle drives.

pub mod http;

pub use http::HttpDevServerFactory;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::build_config::BuildConfig;
use crate::compiler::CompilerHandle;
use crate::config::{Protocol, StartupContext};
use crate::env::ClientEnvironment;
use crate::errors::StartupError;
use crate::proxy::ProxyConfig;
use crate::urls::{AppUrls, is_unspecified_host};

/// Hosts accepted in the `Host` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedHosts {
    All,
    /// `localhost` and IP literals are always accepted in addition to these.
    List(Vec<String>),
}

impl AllowedHosts {
    pub fn allows(&self, host_header: &str) -> bool {
        let Self::List(hosts) = self else {
            return true;
        };
        let hostname = strip_port(host_header).to_ascii_lowercase();
        if hostname.is_empty() {
            return false;
        }
        hostname == "localhost"
            || hostname.ends_with(".localhost")
            || hostname.parse::<IpAddr>().is_ok()
            || hosts.iter().any(|h| h.eq_ignore_ascii_case(&hostname))
    }
}

fn strip_port(host_header: &str) -> &str {
    if let Some(rest) = host_header.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default();
    }
    match host_header.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => host_header,
    }
}

/// Everything the dev server needs to answer requests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Public path with trailing slash
    pub public_path: String,
    /// Searched in order: build output first, then the public folder
    pub static_dirs: Vec<PathBuf>,
    pub index_html: PathBuf,
    pub client_env: ClientEnvironment,
    pub proxy: ProxyConfig,
    pub allowed_hosts: AllowedHosts,
    pub history_fallback: bool,
}

impl ServerConfig {
    /// Merge the negotiated port, the proxy rules and the build output into
    /// the base server configuration.
    pub fn assemble(
        ctx: &StartupContext,
        port: u16,
        proxy: ProxyConfig,
        build: &BuildConfig,
        urls: &AppUrls,
    ) -> Self {
        let allowed_hosts = if proxy.is_empty() || ctx.flag("DANGEROUSLY_DISABLE_HOST_CHECK") {
            AllowedHosts::All
        } else {
            let mut hosts: Vec<String> = urls.lan_url_for_config.iter().cloned().collect();
            if !is_unspecified_host(&ctx.host) {
                hosts.push(ctx.host.clone());
            }
            AllowedHosts::List(hosts)
        };

        Self {
            host: ctx.host.clone(),
            port,
            protocol: ctx.protocol,
            public_path: build.public_path.clone(),
            static_dirs: vec![build.output_dir.clone(), ctx.paths.app_public.clone()],
            index_html: ctx.paths.app_html.clone(),
            client_env: ctx.client_env.clone(),
            proxy,
            allowed_hosts,
            history_fallback: ctx.project.server.history_fallback,
        }
    }
}

/// Acknowledgment that the server is listening.
#[derive(Debug)]
pub struct ServerStarted {
    pub local_addr: SocketAddr,
    /// Resolves with a message if the server dies unexpectedly.
    pub fault: Option<oneshot::Receiver<String>>,
}

#[async_trait]
pub trait DevServer: Send {
    async fn start(&mut self) -> Result<ServerStarted, StartupError>;
    /// Stop serving and release the compiler. Safe to call when never started.
    async fn close(&mut self);
}

pub trait DevServerFactory: Send + Sync {
    fn create(&self, config: ServerConfig, compiler: CompilerHandle) -> Box<dyn DevServer>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_config::{BuildConfigProvider, BuildMode, ProjectBuildConfig};
    use crate::proxy::prepare_proxy;
    use crate::urls::format_urls;
    use serde_json::json;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    #[test]
    fn test_all_allows_anything() {
        assert!(AllowedHosts::All.allows("evil.example.com"));
    }

    #[test]
    fn test_list_allows_local_and_listed_hosts() {
        let hosts = AllowedHosts::List(vec!["dev.example.com".into()]);
        assert!(hosts.allows("localhost:3000"));
        assert!(hosts.allows("app.localhost"));
        assert!(hosts.allows("192.168.1.5:3000"));
        assert!(hosts.allows("[::1]:3000"));
        assert!(hosts.allows("DEV.example.com:3000"));
        assert!(!hosts.allows("evil.example.com"));
        assert!(!hosts.allows(""));
    }

    fn assembled(env: &[(&str, &str)], proxy: Option<serde_json::Value>) -> ServerConfig {
        let dir = tempdir().unwrap();
        let env = env.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        let ctx = StartupContext::load(dir.path(), env, false).unwrap();
        let proxy = prepare_proxy(proxy.as_ref(), &ctx.paths.app_public, "/").unwrap();
        let build = ProjectBuildConfig::new(ctx.clone())
            .build_config(BuildMode::Development)
            .unwrap();
        let urls = format_urls(
            ctx.protocol,
            &ctx.host,
            3000,
            "",
            Some(Ipv4Addr::new(192, 168, 0, 7)),
        );
        ServerConfig::assemble(&ctx, 3001, proxy, &build, &urls)
    }

    #[test]
    fn test_assemble_without_proxy_skips_host_check() {
        let config = assembled(&[], None);
        assert_eq!(config.port, 3001);
        assert_eq!(config.allowed_hosts, AllowedHosts::All);
        assert_eq!(config.static_dirs.len(), 2);
        assert!(config.static_dirs[0].ends_with(".devstart/out"));
        assert!(config.static_dirs[1].ends_with("public"));
        assert!(config.history_fallback);
    }

    #[test]
    fn test_assemble_with_proxy_checks_hosts() {
        let config = assembled(&[], Some(json!("http://127.0.0.1:4000")));
        assert_eq!(
            config.allowed_hosts,
            AllowedHosts::List(vec!["192.168.0.7".into()])
        );
    }

    #[test]
    fn test_host_check_can_be_disabled() {
        let config = assembled(
            &[("DANGEROUSLY_DISABLE_HOST_CHECK", "true")],
            Some(json!("http://127.0.0.1:4000")),
        );
        assert_eq!(config.allowed_hosts, AllowedHosts::All);
    }
}
