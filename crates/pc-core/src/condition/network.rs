//! IP network conditions

use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::{ConditionError, Result};
use crate::expr::{BinaryOp, Node, UnaryOp};
use crate::ip::{is_in_subnet, normalize_ip, parse_addr, parse_ip, subnet_mask};
use crate::types::ConditionKind;

/// Parsed network of an IP condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAnalysis {
    /// Network including the original host bits
    pub network: IpNet,
    /// Canonical text of the address
    pub normalized: String,
    /// Canonical text of the subnet mask
    pub mask: String,
}

impl IpAnalysis {
    /// Analyze an `ip` field (optionally bracketed) with its prefix length.
    pub fn analyze(ip: &str, prefix_length: u8) -> Result<Self> {
        let ip = ip
            .strip_prefix('[')
            .and_then(|ip| ip.strip_suffix(']'))
            .unwrap_or(ip);
        let invalid = || ConditionError::InvalidIp(format!("{}/{}", ip, prefix_length));
        let addr: IpAddr = ip.parse().map_err(|_| invalid())?;
        let network = IpNet::new(addr, prefix_length).map_err(|_| invalid())?;
        Ok(Self::from_network(network))
    }

    pub(crate) fn from_network(network: IpNet) -> Self {
        Self {
            normalized: normalize_ip(&network.addr()),
            mask: normalize_ip(&subnet_mask(&network)),
            network,
        }
    }

    pub fn is_v4(&self) -> bool {
        matches!(self.network, IpNet::V4(_))
    }

    /// The host must be an address literal of the same family inside the
    /// network.
    pub fn matches(&self, host: &str) -> bool {
        parse_addr(host).is_some_and(|addr| is_in_subnet(&addr, &self.network))
    }

    pub fn compile(&self) -> Node {
        let host = || Node::ident("host");
        let looks_like_ip = if self.is_v4() {
            host()
                .index(host().member("length").binary(BinaryOp::Sub, Node::number(1)))
                .binary(BinaryOp::Ge, Node::number(0))
        } else {
            host()
                .method("indexOf", vec![Node::string(":")])
                .binary(BinaryOp::Ge, Node::number(0))
        };

        if self.network.prefix_len() == 0 {
            return looks_like_ip;
        }

        let is_in_net = Node::ident("isInNet").call(vec![
            host(),
            Node::string(self.normalized.as_str()),
            Node::string(self.mask.as_str()),
        ]);
        if self.is_v4() {
            return looks_like_ip.and(is_in_net);
        }

        // isInNetEx is the IPv6-aware extension; older runtimes only have isInNet.
        let is_in_net_ex = Node::ident("isInNetEx").call(vec![
            host(),
            Node::string(format!("{}/{}", self.normalized, self.network.prefix_len())),
        ]);
        let has_ex = Node::unary(UnaryOp::Typeof, Node::ident("isInNetEx"))
            .strict_eq(Node::string("function"));
        looks_like_ip.and(Node::conditional(has_ex, is_in_net_ex, is_in_net))
    }
}

/// `ip/prefix` text form.
pub fn ip_string_form(ip: &str, prefix_length: u8) -> String {
    format!("{}/{}", ip, prefix_length)
}

/// Parse the text form of an IP condition.
///
/// Text that is not an address falls back to `0.0.0.0/0`, which matches
/// every IPv4 host.
pub fn ip_kind_from_text(text: &str) -> ConditionKind {
    match parse_ip(text) {
        Some(net) => ConditionKind::Ip {
            ip: normalize_ip(&net.addr()),
            prefix_length: net.prefix_len(),
        },
        None => {
            log::warn!("Invalid IP condition {:?}, using 0.0.0.0/0", text);
            ConditionKind::Ip {
                ip: "0.0.0.0".to_string(),
                prefix_length: 0,
            }
        }
    }
}
