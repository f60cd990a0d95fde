//! IP address and CIDR utilities
//!
//! Parsing never fails loudly: anything that is not an IPv4 or IPv6
//! literal (optionally bracketed, optionally with `/prefixLength`) is
//! reported as `None`.

use std::net::IpAddr;

use ipnet::IpNet;

/// Parse an address or network.
///
/// Accepts `1.2.3.4`, `::1`, `[::1]`, `10.0.0.0/8` and `[fe80::]/10`. A bare
/// address gets the full-width prefix of its family. Host bits are kept.
pub fn parse_ip(text: &str) -> Option<IpNet> {
    let text = text.trim();
    let (addr, prefix) = match text.strip_prefix('[') {
        Some(rest) => {
            let close = rest.find(']')?;
            let tail = &rest[close + 1..];
            let prefix = if tail.is_empty() {
                None
            } else {
                Some(tail.strip_prefix('/')?)
            };
            (&rest[..close], prefix)
        }
        None => match text.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (text, None),
        },
    };

    let addr: IpAddr = addr.parse().ok()?;
    let prefix_len = match prefix {
        Some(prefix) => prefix.parse::<u8>().ok()?,
        None => max_prefix_len(&addr),
    };
    IpNet::new(addr, prefix_len).ok()
}

/// Parse a bare address (optionally bracketed), rejecting networks.
pub fn parse_addr(text: &str) -> Option<IpAddr> {
    let net = parse_ip(text)?;
    (net.prefix_len() == net.max_prefix_len()).then(|| net.addr())
}

/// Canonical text of an address: dotted quad or compressed IPv6.
pub fn normalize_ip(addr: &IpAddr) -> String {
    addr.to_string()
}

/// Full-width prefix length of the address family.
pub fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// The prefix of a network as a mask address (`255.255.255.0` for `/24`).
pub fn subnet_mask(net: &IpNet) -> IpAddr {
    net.netmask()
}

/// Check whether `addr` belongs to `network`. Families never mix.
pub fn is_in_subnet(addr: &IpAddr, network: &IpNet) -> bool {
    match (addr, network) {
        (IpAddr::V4(_), IpNet::V4(_)) | (IpAddr::V6(_), IpNet::V6(_)) => network.contains(addr),
        _ => false,
    }
}
