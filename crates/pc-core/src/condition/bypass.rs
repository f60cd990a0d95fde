//! Browser bypass-list entries
//!
//! Grammar: `[<scheme>://]<host-or-ip>[/<prefixLength>][:<port>]` or the
//! `<local>` sentinel. A leading `.` on the host means `*.`.

use std::net::IpAddr;

use ipnet::IpNet;

use super::network::IpAnalysis;
use super::pattern::{compile_regex_test, SafeRegex};
use super::range::parse_int_prefix;
use crate::expr::{BinaryOp, Node};
use crate::glob::{compile_glob, glob_body};
use crate::ip::{normalize_ip, parse_addr};
use crate::types::Request;

/// Sentinel matching loopback addresses and dotless hosts.
pub const LOCAL_SENTINEL: &str = "<local>";

/// Host part of a bypass entry.
#[derive(Debug, Clone)]
pub enum BypassHost {
    /// No host restriction
    Any,
    /// `<local>`
    Local,
    Pattern(SafeRegex),
}

/// Decomposed bypass entry.
#[derive(Debug, Clone)]
pub struct BypassAnalysis {
    pub scheme: Option<String>,
    /// Network for `addr/prefix` entries
    pub ip: Option<IpAnalysis>,
    pub host: BypassHost,
    pub port: Option<String>,
    /// Anchored URL regex, present with a port
    pub url: Option<SafeRegex>,
    /// Canonical text of the entry
    pub normalized: String,
}

impl BypassAnalysis {
    pub fn analyze(pattern: &str) -> Self {
        let mut analysis = Self {
            scheme: None,
            ip: None,
            host: BypassHost::Any,
            port: None,
            url: None,
            normalized: String::new(),
        };
        if pattern == LOCAL_SENTINEL {
            analysis.host = BypassHost::Local;
            analysis.normalized.push_str(LOCAL_SENTINEL);
            return analysis;
        }

        let mut server = pattern;
        if let Some((scheme, rest)) = pattern.split_once("://") {
            analysis.normalized.push_str(scheme);
            analysis.normalized.push_str("://");
            analysis.scheme = Some(scheme.to_string());
            server = rest;
        }

        if let Some(network) = parse_network(server) {
            let ip = IpAnalysis::from_network(network);
            analysis.normalized.push_str(&format!("{}/{}", ip.normalized, network.prefix_len()));
            analysis.ip = Some(ip);
            return analysis;
        }

        let mut server_ip = parse_addr(server);
        if server_ip.is_none() {
            if let Some(pos) = server.rfind(':') {
                let port = &server[pos + 1..];
                if !port.is_empty() {
                    analysis.port = Some(port.to_string());
                }
                server = &server[..pos];
            }
            server_ip = parse_addr(server);
        }

        let host = match server_ip {
            Some(addr) => {
                let host = normalize_ip(&addr);
                match addr {
                    IpAddr::V4(_) => analysis.normalized.push_str(&host),
                    IpAddr::V6(_) => analysis.normalized.push_str(&format!("[{}]", host)),
                }
                host
            }
            None => {
                let host = if server.starts_with('.') {
                    format!("*{}", server)
                } else {
                    server.to_string()
                };
                analysis.normalized.push_str(&host);
                host
            }
        };

        if let Some(port) = &analysis.port {
            analysis.normalized.push(':');
            analysis.normalized.push_str(port);

            let url_host = match server_ip {
                Some(IpAddr::V6(_)) => format!("[{}]", host),
                _ => host,
            };
            let scheme = analysis
                .scheme
                .as_deref()
                .map_or_else(|| "[^:]+".to_string(), regex::escape);
            analysis.url = Some(SafeRegex::new(&format!(
                "^{}://{}:{}/",
                scheme,
                glob_body(&url_host),
                regex::escape(port)
            )));
        } else if host != "*" {
            analysis.host = BypassHost::Pattern(SafeRegex::new(&compile_glob(&host, true)));
        }
        analysis
    }

    pub fn matches(&self, request: &Request) -> bool {
        if self.scheme.as_ref().is_some_and(|scheme| *scheme != request.scheme) {
            return false;
        }
        if self.ip.as_ref().is_some_and(|ip| !ip.matches(&request.host)) {
            return false;
        }
        match &self.host {
            BypassHost::Local => return is_local_host(&request.host),
            BypassHost::Pattern(regex) if !regex.is_match(&request.host) => return false,
            _ => {}
        }
        self.url.as_ref().map_or(true, |url| url.is_match(&request.url))
    }

    pub fn compile(&self) -> Node {
        if let Some(url) = &self.url {
            return compile_regex_test("url", url);
        }
        if let BypassHost::Local = self.host {
            return compile_local_host();
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(scheme) = &self.scheme {
            parts.push(Node::ident("scheme").strict_eq(Node::string(scheme.as_str())));
        }
        match (&self.host, &self.ip) {
            (BypassHost::Pattern(regex), _) => parts.push(compile_regex_test("host", regex)),
            (_, Some(ip)) => parts.push(ip.compile()),
            _ => {}
        }
        parts
            .into_iter()
            .reduce(Node::and)
            .unwrap_or(Node::Bool(true))
    }
}

/// `addr/prefix` with a valid prefix for the address family.
fn parse_network(server: &str) -> Option<IpNet> {
    let (addr, prefix) = server.split_once('/')?;
    let addr = parse_addr(addr)?;
    let prefix = parse_int_prefix(prefix)?;
    let prefix = u8::try_from(prefix).ok()?;
    IpNet::new(addr, prefix).ok()
}

fn is_local_host(host: &str) -> bool {
    host == "127.0.0.1" || host == "::1" || !host.contains('.')
}

fn compile_local_host() -> Node {
    let host = || Node::ident("host");
    host()
        .strict_eq(Node::string("127.0.0.1"))
        .or(host().strict_eq(Node::string("::1")))
        .or(host()
            .method("indexOf", vec![Node::string(".")])
            .binary(BinaryOp::Lt, Node::number(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> Request {
        Request::from_url(url).expect("valid url")
    }

    #[test]
    fn test_local() {
        let bypass = BypassAnalysis::analyze("<local>");
        assert_eq!(bypass.normalized, "<local>");
        assert!(bypass.matches(&request("http://127.0.0.1/")));
        assert!(bypass.matches(&request("http://[::1]/")));
        assert!(bypass.matches(&request("http://foo/")));
        assert!(!bypass.matches(&request("http://foo.com/")));
    }

    #[test]
    fn test_host_glob() {
        let bypass = BypassAnalysis::analyze(".example.com");
        assert_eq!(bypass.normalized, "*.example.com");
        assert!(bypass.matches(&request("https://www.example.com/")));
        assert!(!bypass.matches(&request("https://example.com/")));
    }

    #[test]
    fn test_scheme_and_host() {
        let bypass = BypassAnalysis::analyze("https://example.com");
        assert_eq!(bypass.scheme.as_deref(), Some("https"));
        assert_eq!(bypass.normalized, "https://example.com");
        assert!(bypass.matches(&request("https://example.com/a")));
        assert!(!bypass.matches(&request("http://example.com/a")));
    }

    #[test]
    fn test_network() {
        let bypass = BypassAnalysis::analyze("192.168.0.0/16");
        assert_eq!(bypass.normalized, "192.168.0.0/16");
        assert!(bypass.ip.is_some());
        assert!(bypass.matches(&request("http://192.168.3.4/")));
        assert!(!bypass.matches(&request("http://10.0.0.1/")));
    }

    #[test]
    fn test_port() {
        let bypass = BypassAnalysis::analyze("example.com:8080");
        assert_eq!(bypass.port.as_deref(), Some("8080"));
        assert_eq!(bypass.normalized, "example.com:8080");
        assert!(bypass.matches(&request("http://example.com:8080/x")));
        assert!(bypass.matches(&request("ftp://example.com:8080/")));
        assert!(!bypass.matches(&request("http://example.com/x")));
        assert!(!bypass.matches(&request("http://example.com:80/x")));
    }

    #[test]
    fn test_ipv6_with_port() {
        let bypass = BypassAnalysis::analyze("http://[0::1]:3128");
        assert_eq!(bypass.normalized, "http://[::1]:3128");
        assert!(bypass.matches(&request("http://[::1]:3128/")));
        assert!(!bypass.matches(&request("https://[::1]:3128/")));
    }

    #[test]
    fn test_bare_ip() {
        let bypass = BypassAnalysis::analyze("10.0.0.1");
        assert_eq!(bypass.normalized, "10.0.0.1");
        assert!(bypass.matches(&request("http://10.0.0.1/")));
        assert!(!bypass.matches(&request("http://10.0.0.10/")));
    }

    #[test]
    fn test_wildcard_host_matches_everything() {
        let bypass = BypassAnalysis::analyze("*");
        assert!(matches!(bypass.host, BypassHost::Any));
        assert_eq!(bypass.compile(), Node::Bool(true));
    }

    #[test]
    fn test_compile_local() {
        let node = BypassAnalysis::analyze("<local>").compile();
        let Node::Binary { op: BinaryOp::Or, right, .. } = node else {
            panic!("expected disjunction");
        };
        let expected = Node::ident("host")
            .method("indexOf", vec![Node::string(".")])
            .binary(BinaryOp::Lt, Node::number(0));
        assert_eq!(*right, expected);
    }

    #[test]
    fn test_compile_scheme_and_network() {
        let node = BypassAnalysis::analyze("http://10.0.0.0/8").compile();
        let Node::Binary { op: BinaryOp::And, left, .. } = node else {
            panic!("expected conjunction");
        };
        assert_eq!(*left, Node::ident("scheme").strict_eq(Node::string("http")));
    }
}
