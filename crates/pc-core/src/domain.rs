//! Domain-name helpers used by editors around the condition engine
//!
//! Registrable domains come from the Public Suffix List compiled into the
//! `psl` crate, so no list file has to be shipped or loaded.
//!
//! # Examples
//!
//! ```
//! use pc_core::domain::{base_domain, wildcard_for_domain};
//!
//! assert_eq!(base_domain("sub.example.co.uk"), "example.co.uk");
//! assert_eq!(base_domain("www.example.com.ar"), "example.com.ar");
//! assert_eq!(wildcard_for_domain("www.example.com"), "*.example.com");
//! ```

use crate::url::extract_host;

/// Cheap IP-literal check: a `:` after the first character (IPv6) or a
/// trailing digit (IPv4). Matches the heuristic compiled IP conditions use.
pub fn is_ip_literal(host: &str) -> bool {
    if host.find(':').is_some_and(|pos| pos > 0) {
        return true;
    }
    host.bytes().last().is_some_and(|b| b.is_ascii_digit())
}

/// Registrable domain (eTLD+1) of a host. IP literals, single labels and
/// bare public suffixes are returned unchanged.
pub fn base_domain(host: &str) -> String {
    if is_ip_literal(host) {
        return host.to_string();
    }
    let host = host.trim_end_matches('.');
    psl::domain_str(host).unwrap_or(host).to_string()
}

/// Host wildcard covering a host's registrable domain and its subdomains.
pub fn wildcard_for_domain(host: &str) -> String {
    if is_ip_literal(host) {
        return host.to_string();
    }
    format!("*.{}", base_domain(host))
}

/// Host wildcard for the host of a URL, `None` when the URL has no host.
pub fn wildcard_for_url(url: &str) -> Option<String> {
    let host = extract_host(url)?;
    if host.is_empty() {
        return None;
    }
    Some(wildcard_for_domain(&host.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ip_literal() {
        assert!(is_ip_literal("127.0.0.1"));
        assert!(is_ip_literal("::1"));
        assert!(is_ip_literal("fe80::1"));
        assert!(!is_ip_literal("example.com"));
        assert!(!is_ip_literal(""));
    }

    #[test]
    fn test_base_domain() {
        assert_eq!(base_domain("someinternaldomain"), "someinternaldomain");
        assert_eq!(base_domain("a.b.example.com"), "example.com");
        assert_eq!(base_domain("example.com."), "example.com");
        assert_eq!(base_domain("www.example.co.uk"), "example.co.uk");
        assert_eq!(base_domain("10.0.0.1"), "10.0.0.1");
    }

    #[test]
    fn test_base_domain_multi_label_suffixes() {
        assert_eq!(base_domain("www.example.com.ar"), "example.com.ar");
        assert_eq!(base_domain("shop.example.co.id"), "example.co.id");
        assert_eq!(base_domain("a.b.example.org.br"), "example.org.br");
        assert_eq!(base_domain("user.github.io"), "user.github.io");
        // A bare suffix has no registrable domain.
        assert_eq!(base_domain("com.ar"), "com.ar");
        assert_eq!(wildcard_for_domain("shop.example.co.id"), "*.example.co.id");
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(wildcard_for_domain("192.168.0.1"), "192.168.0.1");
        assert_eq!(wildcard_for_url("https://WWW.Example.com/x"), Some("*.example.com".to_string()));
        assert_eq!(wildcard_for_url("http://[::1]/"), Some("::1".to_string()));
        assert_eq!(wildcard_for_url("not a url"), None);
    }
}
