//! Selector parsing — label strings to structured network selectors.
//!
//! Everything here is pure string processing: literal networks, the `any`
//! wildcard, `port[/proto]` suffixes, and syntactic hostname validation
//! (regex only, no network I/O). Hostname *resolution* lives in
//! [`resolver`](crate::resolver).

use std::net::IpAddr;
use std::sync::LazyLock;

use ipnetwork::IpNetwork;
use regex::Regex;

use ufwguard_core::error::PolicyError;
use ufwguard_core::types::{Net, Protocol};

/// `port[/proto]` grammar: bare digits, digits/proto, or bare proto.
static PORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([0-9]{1,5})(?:/(tcp|udp))?|(tcp|udp))$").expect("port grammar regex")
});

/// One dot-separated hostname label: 1-63 chars of letters, digits,
/// hyphen, underscore; must not start or end with a hyphen.
static HOST_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_](?:[A-Za-z0-9_-]{0,61}[A-Za-z0-9_])?$").expect("host label regex")
});

/// Maximum total hostname length.
const MAX_HOSTNAME_LEN: usize = 255;

/// Host half of a destination selector: either a concrete network or a
/// hostname still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSelector {
    /// Literal network (`any`, IP, or CIDR).
    Net(Net),
    /// Syntactically valid hostname; resolved at policy-compile time.
    Hostname(String),
}

/// One parsed `host[:port[/proto]]` destination entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestSelector {
    /// Destination host pattern.
    pub host: HostSelector,
    /// Destination port, if given.
    pub port: Option<u16>,
    /// Transport protocol, if given.
    pub proto: Option<Protocol>,
}

/// Parses a `port[/proto]` string.
///
/// Grammar: empty -> `(None, None)`; `tcp`/`udp` -> `(None, proto)`;
/// `1..=65535` digits -> `(port, None)`; `digits/proto` -> both. Anything
/// else — including `"/tcp"`, `"80/"`, `"80/ftp"`, `"0"`, or `"70000"` —
/// is [`PolicyError::InvalidPort`].
pub fn parse_port(raw: &str) -> Result<(Option<u16>, Option<Protocol>), PolicyError> {
    if raw.is_empty() {
        return Ok((None, None));
    }

    let invalid = || PolicyError::InvalidPort {
        value: raw.to_owned(),
    };
    let caps = PORT_RE.captures(raw).ok_or_else(invalid)?;

    if let Some(proto) = caps.get(3) {
        return Ok((None, Protocol::parse(proto.as_str())));
    }

    let digits = caps.get(1).ok_or_else(invalid)?;
    let port: u32 = digits.as_str().parse().map_err(|_| invalid())?;
    if !(1..=65535).contains(&port) {
        return Err(invalid());
    }
    // port fits in u16 after the range check
    let port = port as u16;

    let proto = caps.get(2).and_then(|m| Protocol::parse(m.as_str()));
    Ok((Some(port), proto))
}

/// Checks whether a string is a syntactically valid hostname.
///
/// Rules: at most 255 chars total; dot-separated labels of 1-63 chars from
/// `[A-Za-z0-9_-]`, not starting or ending with a hyphen; empty labels are
/// invalid; the last label must not be all digits (that shape is an
/// address, not a name).
pub fn validate_hostname(raw: &str) -> bool {
    if raw.is_empty() || raw.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    let labels: Vec<&str> = raw.split('.').collect();
    if !labels.iter().all(|label| HOST_LABEL_RE.is_match(label)) {
        return false;
    }

    let last = labels[labels.len() - 1];
    !last.chars().all(|c| c.is_ascii_digit())
}

/// Parses a literal network: the `any` wildcard (case-insensitive), a bare
/// IP address, or a CIDR subnet. Hostnames are rejected here.
pub fn parse_net(raw: &str) -> Result<Net, PolicyError> {
    if raw.eq_ignore_ascii_case("any") {
        return Ok(Net::Any);
    }
    if let Ok(addr) = raw.parse::<IpAddr>() {
        return Ok(Net::Host(addr));
    }
    if let Ok(net) = raw.parse::<IpNetwork>() {
        return Ok(Net::Subnet(net));
    }
    Err(PolicyError::InvalidSelector {
        value: raw.to_owned(),
    })
}

/// Parses a `;`-separated ingress source list (IP/CIDR/`any` only).
///
/// Empty items (trailing `;`) are skipped. The first invalid item fails
/// the whole list — the caller disables ingress for that container rather
/// than applying a partial source list.
pub fn parse_source_list(raw: &str) -> Result<Vec<Net>, PolicyError> {
    raw.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_net)
        .collect()
}

/// Parses a `;`-separated `host[:port[/proto]]` destination list.
///
/// Each item is split once on `:`; the host part must be a literal network
/// or a syntactically valid hostname. The first invalid item fails the
/// whole list.
pub fn parse_destination_list(raw: &str) -> Result<Vec<DestSelector>, PolicyError> {
    raw.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_destination)
        .collect()
}

fn parse_destination(item: &str) -> Result<DestSelector, PolicyError> {
    let (host_raw, port_raw) = match item.split_once(':') {
        Some((host, port)) => (host, port),
        None => (item, ""),
    };

    let (port, proto) = parse_port(port_raw)?;

    let host = match parse_net(host_raw) {
        Ok(net) => HostSelector::Net(net),
        Err(_) if validate_hostname(host_raw) => HostSelector::Hostname(host_raw.to_owned()),
        Err(_) => {
            return Err(PolicyError::InvalidHostname {
                value: host_raw.to_owned(),
            });
        }
    };

    Ok(DestSelector { host, port, proto })
}
