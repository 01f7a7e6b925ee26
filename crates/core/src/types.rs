//! Domain types — shared data structures for label-driven firewall management.
//!
//! These types flow between the policy compiler, the rule compiler, and the
//! UFW control-plane adapter. They are deliberately plain data: all parsing
//! and validation lives in the `ufwguard-firewall` crate.

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Transport protocol of an exposed port or firewall rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl Protocol {
    /// Parses `"tcp"` or `"udp"`. Any other string yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Network half of a selector: the wildcard, a single host, or a subnet.
///
/// Renders exactly as UFW expects it on the command line (`any`, a bare
/// address, or CIDR notation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Net {
    /// Matches every address (`any`).
    Any,
    /// A single host address.
    Host(IpAddr),
    /// A CIDR subnet.
    Subnet(IpNetwork),
}

impl From<IpAddr> for Net {
    fn from(addr: IpAddr) -> Self {
        Self::Host(addr)
    }
}

impl fmt::Display for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Host(addr) => write!(f, "{addr}"),
            Self::Subnet(net) => write!(f, "{net}"),
        }
    }
}

/// A published container port with an actual host binding.
///
/// Docker reports the port map as `"80/tcp" -> [bindings]`; only entries with
/// a non-empty binding list are considered exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExposedPort {
    /// Container-side port number (1-65535).
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl ExposedPort {
    /// Parses a Docker port-map key such as `"80/tcp"`.
    ///
    /// Returns `None` for malformed keys, a port outside 1-65535, or an
    /// unknown protocol.
    pub fn from_port_key(key: &str) -> Option<Self> {
        let (port, proto) = key.split_once('/')?;
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(Self {
            port,
            protocol: Protocol::parse(proto)?,
        })
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Stable key attributing UFW rules to the container that created them.
///
/// Rendered as `name:short_id` and embedded as the rule comment at creation
/// time; teardown matches the same key against `ufw status numbered` output.
/// The id component makes the tag unique even when container names are
/// reused across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerTag {
    /// Container name (human-readable half of the key).
    pub name: String,
    /// First 12 characters of the container id.
    pub short_id: String,
}

impl OwnerTag {
    /// Builds a tag from a container name and full id.
    pub fn new(name: impl Into<String>, container_id: &str) -> Self {
        let short_id = container_id[..12.min(container_id.len())].to_owned();
        Self {
            name: name.into(),
            short_id,
        }
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.short_id)
    }
}

/// Kind of a compiled rule operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Permit ingress from a declared source to an exposed container port.
    AllowIn,
    /// Permit the container's replies to an allowed ingress source.
    ///
    /// Only emitted under deny-outgoing, where the terminal deny rule would
    /// otherwise drop response traffic of an already-allowed inbound flow.
    AllowReply,
    /// Permit egress from the container to an allow-listed destination.
    AllowOut,
    /// Deny all remaining egress from the container.
    DenyOutAll,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllowIn => write!(f, "allow-in"),
            Self::AllowReply => write!(f, "allow-reply"),
            Self::AllowOut => write!(f, "allow-out"),
            Self::DenyOutAll => write!(f, "deny-out-all"),
        }
    }
}

/// One concrete access-control rule mutation.
///
/// A `RuleOp` is write-once: it is either fully applied to the control plane
/// or not applied at all. Every op carries the [`OwnerTag`] of the container
/// it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOp {
    /// What the rule does.
    pub kind: RuleKind,
    /// Transport protocol, if the rule is protocol-specific.
    pub proto: Option<Protocol>,
    /// Source network.
    pub from: Net,
    /// Source port (reply rules only).
    pub from_port: Option<u16>,
    /// Destination network.
    pub to: Net,
    /// Destination port, if the rule is port-specific.
    pub to_port: Option<u16>,
    /// Owning container.
    pub owner: OwnerTag,
}

impl RuleOp {
    /// Ingress allow: `source -> container_addr:port/proto`.
    pub fn allow_in(
        proto: Protocol,
        source: Net,
        container_addr: IpAddr,
        port: u16,
        owner: OwnerTag,
    ) -> Self {
        Self {
            kind: RuleKind::AllowIn,
            proto: Some(proto),
            from: source,
            from_port: None,
            to: Net::Host(container_addr),
            to_port: Some(port),
            owner,
        }
    }

    /// Reply allow: `container_addr:port/proto -> source`.
    pub fn allow_reply(
        proto: Protocol,
        container_addr: IpAddr,
        port: u16,
        source: Net,
        owner: OwnerTag,
    ) -> Self {
        Self {
            kind: RuleKind::AllowReply,
            proto: Some(proto),
            from: Net::Host(container_addr),
            from_port: Some(port),
            to: source,
            to_port: None,
            owner,
        }
    }

    /// Egress allow: `container_addr -> dest[:port][/proto]`.
    pub fn allow_out(
        proto: Option<Protocol>,
        container_addr: IpAddr,
        dest: Net,
        port: Option<u16>,
        owner: OwnerTag,
    ) -> Self {
        Self {
            kind: RuleKind::AllowOut,
            proto,
            from: Net::Host(container_addr),
            from_port: None,
            to: dest,
            to_port: port,
            owner,
        }
    }

    /// Terminal egress deny: `container_addr -> any`.
    pub fn deny_out_all(container_addr: IpAddr, owner: OwnerTag) -> Self {
        Self {
            kind: RuleKind::DenyOutAll,
            proto: None,
            from: Net::Host(container_addr),
            from_port: None,
            to: Net::Any,
            to_port: None,
            owner,
        }
    }
}

impl fmt::Display for RuleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.kind)?;
        if let Some(proto) = self.proto {
            write!(f, "proto {proto} ")?;
        }
        write!(f, "from {}", self.from)?;
        if let Some(port) = self.from_port {
            write!(f, " port {port}")?;
        }
        write!(f, " to {}", self.to)?;
        if let Some(port) = self.to_port {
            write!(f, " port {port}")?;
        }
        write!(f, " [{}]", self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    #[test]
    fn protocol_parse_and_display() {
        assert_eq!(Protocol::parse("tcp"), Some(Protocol::Tcp));
        assert_eq!(Protocol::parse("udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::parse("ftp"), None);
        assert_eq!(Protocol::parse("TCP"), None);
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::Udp.to_string(), "udp");
    }

    #[test]
    fn net_display() {
        assert_eq!(Net::Any.to_string(), "any");
        assert_eq!(Net::Host(addr("172.17.0.2")).to_string(), "172.17.0.2");
        assert_eq!(
            Net::Subnet("10.0.0.0/24".parse().unwrap()).to_string(),
            "10.0.0.0/24"
        );
    }

    #[test]
    fn exposed_port_from_port_key() {
        assert_eq!(
            ExposedPort::from_port_key("80/tcp"),
            Some(ExposedPort {
                port: 80,
                protocol: Protocol::Tcp,
            })
        );
        assert_eq!(
            ExposedPort::from_port_key("53/udp"),
            Some(ExposedPort {
                port: 53,
                protocol: Protocol::Udp,
            })
        );
        assert_eq!(ExposedPort::from_port_key("80"), None);
        assert_eq!(ExposedPort::from_port_key("0/tcp"), None);
        assert_eq!(ExposedPort::from_port_key("80/ftp"), None);
        assert_eq!(ExposedPort::from_port_key("99999/tcp"), None);
        assert_eq!(ExposedPort::from_port_key(""), None);
    }

    #[test]
    fn exposed_port_ordering() {
        let mut ports = vec![
            ExposedPort::from_port_key("443/tcp").unwrap(),
            ExposedPort::from_port_key("80/udp").unwrap(),
            ExposedPort::from_port_key("80/tcp").unwrap(),
        ];
        ports.sort();
        assert_eq!(ports[0].to_string(), "80/tcp");
        assert_eq!(ports[1].to_string(), "80/udp");
        assert_eq!(ports[2].to_string(), "443/tcp");
    }

    #[test]
    fn owner_tag_truncates_long_id() {
        let tag = OwnerTag::new("web", "abc123def456789deadbeef");
        assert_eq!(tag.short_id, "abc123def456");
        assert_eq!(tag.to_string(), "web:abc123def456");
    }

    #[test]
    fn owner_tag_keeps_short_id() {
        let tag = OwnerTag::new("web", "abc");
        assert_eq!(tag.to_string(), "web:abc");
    }

    #[test]
    fn owner_tag_unique_across_name_reuse() {
        let first = OwnerTag::new("web", "aaaaaaaaaaaa1111");
        let second = OwnerTag::new("web", "bbbbbbbbbbbb2222");
        assert_ne!(first, second);
    }

    #[test]
    fn rule_op_display_allow_in() {
        let op = RuleOp::allow_in(
            Protocol::Tcp,
            Net::Any,
            addr("172.17.0.2"),
            80,
            OwnerTag::new("web", "abc123def456"),
        );
        assert_eq!(
            op.to_string(),
            "allow-in proto tcp from any to 172.17.0.2 port 80 [web:abc123def456]"
        );
    }

    #[test]
    fn rule_op_display_deny_out_all() {
        let op = RuleOp::deny_out_all(addr("172.17.0.2"), OwnerTag::new("web", "abc123def456"));
        assert_eq!(
            op.to_string(),
            "deny-out-all from 172.17.0.2 to any [web:abc123def456]"
        );
    }

    #[test]
    fn rule_op_display_allow_reply() {
        let op = RuleOp::allow_reply(
            Protocol::Tcp,
            addr("172.17.0.2"),
            8080,
            Net::Subnet("10.0.0.0/24".parse().unwrap()),
            OwnerTag::new("api", "abc123def456"),
        );
        assert_eq!(
            op.to_string(),
            "allow-reply proto tcp from 172.17.0.2 port 8080 to 10.0.0.0/24 [api:abc123def456]"
        );
    }
}
