//! URLs printed to the terminal and handed to the browser.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use console::style;

use crate::config::Protocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUrls {
    /// Bare LAN address, used for the dev server's host allow-list
    pub lan_url_for_config: Option<String>,
    pub lan_url_for_terminal: Option<String>,
    pub local_url_for_terminal: String,
    pub local_url_for_browser: String,
}

pub fn is_unspecified_host(host: &str) -> bool {
    host == "0.0.0.0" || host == "::"
}

/// Build the URLs for a server on `host:port` under `pathname` (no trailing
/// slash). A LAN URL is only produced for unspecified hosts.
pub fn prepare_urls(protocol: Protocol, host: &str, port: u16, pathname: &str) -> AppUrls {
    let lan_ip = if is_unspecified_host(host) {
        lan_address()
    } else {
        None
    };
    format_urls(protocol, host, port, pathname, lan_ip)
}

/// Pure URL assembly with an explicit LAN address, used by [`prepare_urls`].
pub fn format_urls(
    protocol: Protocol,
    host: &str,
    port: u16,
    pathname: &str,
    lan_ip: Option<Ipv4Addr>,
) -> AppUrls {
    let pathname = if pathname.is_empty() { "/" } else { pathname };
    let format_url = |hostname: &str| format!("{}://{}:{}{}", protocol, hostname, port, pathname);
    let pretty_print_url = |hostname: &str| {
        format!(
            "{}://{}:{}{}",
            protocol,
            hostname,
            style(port).bold(),
            pathname
        )
    };

    let (pretty_host, lan_url_for_config, lan_url_for_terminal) = if is_unspecified_host(host) {
        let lan = lan_ip.filter(|ip| ip.is_private()).map(|ip| ip.to_string());
        let lan_terminal = lan.as_deref().map(pretty_print_url);
        ("localhost".to_string(), lan, lan_terminal)
    } else {
        (bracket_ipv6(host), None, None)
    };

    AppUrls {
        lan_url_for_config,
        lan_url_for_terminal,
        local_url_for_terminal: pretty_print_url(&pretty_host),
        local_url_for_browser: format_url(&pretty_host),
    }
}

fn bracket_ipv6(host: &str) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]", host),
        _ => host.to_string(),
    }
}

/// Best-effort local IPv4 address of the default route.
///
/// Connecting a UDP socket sends nothing; it only selects the outbound interface.
fn lan_address() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() && !ip.is_loopback() => Some(ip),
        _ => None,
    }
}
