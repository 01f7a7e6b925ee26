//! Policy compilation — container labels to a normalized [`Policy`].
//!
//! [`PolicyCompiler::compile`] never fails: every label is parsed
//! independently and a malformed value degrades only its own feature to
//! disabled, recorded as a [`PolicyWarning`]. A broken `UFW_ALLOW_FROM`
//! must not stop a valid `UFW_ALLOW_TO` from taking effect, and vice
//! versa.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use ufwguard_core::error::PolicyError;
use ufwguard_core::types::{Net, Protocol};

use crate::resolver::HostnameResolver;
use crate::selector::{self, HostSelector};

/// Opt-in gate; management is enabled iff the value equals `"true"`
/// case-insensitively.
pub const LABEL_MANAGED: &str = "UFW_MANAGED";
/// `;`-separated IP/CIDR/`any` list of permitted ingress sources.
pub const LABEL_ALLOW_FROM: &str = "UFW_ALLOW_FROM";
/// `"true"` switches egress from default-allow to default-deny-with-allowlist.
pub const LABEL_DENY_OUTGOING: &str = "UFW_DENY_OUTGOING";
/// `;`-separated `host[:port[/proto]]` egress allow-list; only consulted
/// when deny-outgoing is set.
pub const LABEL_ALLOW_TO: &str = "UFW_ALLOW_TO";

/// One egress allow-list entry after hostname expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressAllow {
    /// Concrete destination network.
    pub dest: Net,
    /// Destination port, if restricted.
    pub port: Option<u16>,
    /// Transport protocol, if restricted.
    pub proto: Option<Protocol>,
}

/// A label problem recorded during compilation.
///
/// Warnings are operator-visible: the reconciler logs each one with the
/// container name attached.
#[derive(Debug, Clone)]
pub struct PolicyWarning {
    /// Label whose value was rejected.
    pub label: &'static str,
    /// The offending raw value.
    pub value: String,
    /// Why it was rejected or degraded.
    pub reason: String,
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}: {}", self.label, self.value, self.reason)
    }
}

/// Normalized per-container security intent derived from labels.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Management gate; when false the container is untouched and no other
    /// field is meaningful.
    pub managed: bool,
    /// Permitted ingress sources. `None` means ingress was disabled by a
    /// parse failure (fail closed: no ingress rule is written). Defaults
    /// to `Some([Any])` when the label is absent.
    pub ingress_sources: Option<Vec<Net>>,
    /// Default-deny egress mode.
    pub deny_outgoing: bool,
    /// Expanded egress allow-list; `None` means the allow-list was
    /// disabled by a parse failure (the deny-all fallback still applies).
    pub egress_allow: Option<Vec<EgressAllow>>,
    /// Label problems encountered during compilation.
    pub warnings: Vec<PolicyWarning>,
}

impl Policy {
    fn unmanaged() -> Self {
        Self::default()
    }
}

/// Compiles container labels into a [`Policy`], expanding hostname
/// selectors through a [`HostnameResolver`].
pub struct PolicyCompiler<R> {
    resolver: R,
}

impl<R: HostnameResolver> PolicyCompiler<R> {
    /// Creates a compiler around the given resolver.
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Compiles a label map into a normalized [`Policy`]. Never fails;
    /// all label problems degrade to disabled features plus a warning.
    pub async fn compile(&self, labels: &HashMap<String, String>) -> Policy {
        let managed = label_is_true(labels, LABEL_MANAGED);
        if !managed {
            return Policy::unmanaged();
        }

        let mut warnings = Vec::new();

        let ingress_sources = match labels.get(LABEL_ALLOW_FROM) {
            None => Some(vec![Net::Any]),
            Some(raw) => match selector::parse_source_list(raw) {
                Ok(nets) => Some(nets),
                Err(e) => {
                    warnings.push(PolicyWarning {
                        label: LABEL_ALLOW_FROM,
                        value: raw.clone(),
                        reason: format!("ingress disabled: {e}"),
                    });
                    None
                }
            },
        };

        let deny_outgoing = label_is_true(labels, LABEL_DENY_OUTGOING);

        let egress_allow = if deny_outgoing {
            match labels.get(LABEL_ALLOW_TO) {
                None => Some(Vec::new()),
                Some(raw) => match selector::parse_destination_list(raw) {
                    Ok(dests) => Some(self.expand_destinations(dests, &mut warnings).await),
                    Err(e) => {
                        warnings.push(PolicyWarning {
                            label: LABEL_ALLOW_TO,
                            value: raw.clone(),
                            reason: format!("egress allow-list disabled: {e}"),
                        });
                        None
                    }
                },
            }
        } else {
            None
        };

        Policy {
            managed,
            ingress_sources,
            deny_outgoing,
            egress_allow,
            warnings,
        }
    }

    /// Expands hostname selectors into concrete entries. Each distinct
    /// hostname is resolved once per pass; an unresolvable name yields
    /// zero entries and a warning, not an error.
    async fn expand_destinations(
        &self,
        dests: Vec<selector::DestSelector>,
        warnings: &mut Vec<PolicyWarning>,
    ) -> Vec<EgressAllow> {
        let mut resolved: HashMap<String, Vec<std::net::IpAddr>> = HashMap::new();
        let mut out = Vec::new();

        for dest in dests {
            match dest.host {
                HostSelector::Net(net) => out.push(EgressAllow {
                    dest: net,
                    port: dest.port,
                    proto: dest.proto,
                }),
                HostSelector::Hostname(host) => {
                    if !resolved.contains_key(&host) {
                        let addrs = self.resolver.resolve(&host).await;
                        debug!(host = host.as_str(), count = addrs.len(), "resolved egress hostname");
                        resolved.insert(host.clone(), addrs);
                    }
                    let addrs = &resolved[&host];
                    if addrs.is_empty() {
                        warnings.push(PolicyWarning {
                            label: LABEL_ALLOW_TO,
                            value: host.clone(),
                            reason: PolicyError::ResolutionEmpty { host: host.clone() }
                                .to_string(),
                        });
                        continue;
                    }
                    for addr in addrs {
                        out.push(EgressAllow {
                            dest: Net::Host(*addr),
                            port: dest.port,
                            proto: dest.proto,
                        });
                    }
                }
            }
        }

        out
    }
}

fn label_is_true(labels: &HashMap<String, String>, key: &str) -> bool {
    labels
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MockResolver;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn compiler() -> PolicyCompiler<MockResolver> {
        PolicyCompiler::new(MockResolver::new())
    }

    #[tokio::test]
    async fn unmanaged_without_label() {
        let policy = compiler().compile(&labels(&[])).await;
        assert!(!policy.managed);
        assert!(policy.warnings.is_empty());
    }

    #[tokio::test]
    async fn unmanaged_with_non_true_value() {
        for value in ["false", "yes", "1", ""] {
            let policy = compiler()
                .compile(&labels(&[(LABEL_MANAGED, value)]))
                .await;
            assert!(!policy.managed, "{value:?} must not enable management");
        }
    }

    #[tokio::test]
    async fn managed_gate_is_case_insensitive() {
        for value in ["true", "TRUE", "True"] {
            let policy = compiler()
                .compile(&labels(&[(LABEL_MANAGED, value)]))
                .await;
            assert!(policy.managed);
        }
    }

    #[tokio::test]
    async fn ingress_defaults_to_any() {
        let policy = compiler()
            .compile(&labels(&[(LABEL_MANAGED, "true")]))
            .await;
        assert_eq!(policy.ingress_sources, Some(vec![Net::Any]));
        assert!(!policy.deny_outgoing);
        assert!(policy.egress_allow.is_none());
    }

    #[tokio::test]
    async fn ingress_sources_parsed_in_order() {
        let policy = compiler()
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_ALLOW_FROM, "10.0.0.0/24;192.168.1.7"),
            ]))
            .await;
        let sources = policy.ingress_sources.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], Net::Subnet("10.0.0.0/24".parse().unwrap()));
        assert_eq!(sources[1], Net::Host("192.168.1.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn malformed_ingress_disables_ingress_only() {
        let policy = compiler()
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_ALLOW_FROM, "not-an-ip"),
                (LABEL_DENY_OUTGOING, "true"),
                (LABEL_ALLOW_TO, "10.5.0.0/16:443/tcp"),
            ]))
            .await;

        assert!(policy.managed);
        assert!(policy.ingress_sources.is_none());
        assert!(policy.deny_outgoing);
        // Egress is unaffected by the ingress failure.
        let egress = policy.egress_allow.unwrap();
        assert_eq!(egress.len(), 1);
        assert_eq!(egress[0].port, Some(443));
        assert_eq!(policy.warnings.len(), 1);
        assert_eq!(policy.warnings[0].label, LABEL_ALLOW_FROM);
    }

    #[tokio::test]
    async fn malformed_egress_keeps_deny_all_fallback() {
        let policy = compiler()
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_DENY_OUTGOING, "true"),
                (LABEL_ALLOW_TO, "example.org:80/ftp"),
            ]))
            .await;

        // Allow-list disabled, but deny-outgoing still set: the rule
        // compiler will emit the terminal deny with no egress allows.
        assert!(policy.deny_outgoing);
        assert!(policy.egress_allow.is_none());
        assert_eq!(policy.ingress_sources, Some(vec![Net::Any]));
        assert_eq!(policy.warnings.len(), 1);
        assert_eq!(policy.warnings[0].label, LABEL_ALLOW_TO);
    }

    #[tokio::test]
    async fn deny_outgoing_without_allow_to_is_empty_allow_list() {
        let policy = compiler()
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_DENY_OUTGOING, "true"),
            ]))
            .await;
        assert_eq!(policy.egress_allow, Some(Vec::new()));
    }

    #[tokio::test]
    async fn allow_to_ignored_without_deny_outgoing() {
        let policy = compiler()
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_ALLOW_TO, "10.5.0.0/16"),
            ]))
            .await;
        assert!(!policy.deny_outgoing);
        assert!(policy.egress_allow.is_none());
    }

    #[tokio::test]
    async fn hostname_expands_to_resolved_addresses() {
        let compiler = PolicyCompiler::new(
            MockResolver::new().with_host("example.org", &["93.184.216.34", "93.184.216.35"]),
        );
        let policy = compiler
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_DENY_OUTGOING, "true"),
                (LABEL_ALLOW_TO, "example.org:443/tcp"),
            ]))
            .await;

        let egress = policy.egress_allow.unwrap();
        assert_eq!(egress.len(), 2);
        assert_eq!(egress[0].dest, Net::Host("93.184.216.34".parse().unwrap()));
        assert_eq!(egress[1].dest, Net::Host("93.184.216.35".parse().unwrap()));
        // Port/proto carried onto every expanded entry.
        assert!(egress.iter().all(|e| e.port == Some(443)));
        assert!(egress.iter().all(|e| e.proto == Some(Protocol::Tcp)));
    }

    #[tokio::test]
    async fn unresolvable_hostname_yields_no_entries_but_warns() {
        let compiler = PolicyCompiler::new(
            MockResolver::new().with_host("alive.example", &["10.9.0.1"]),
        );
        let policy = compiler
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_DENY_OUTGOING, "true"),
                (LABEL_ALLOW_TO, "dead.example:443;alive.example:80"),
            ]))
            .await;

        let egress = policy.egress_allow.unwrap();
        assert_eq!(egress.len(), 1);
        assert_eq!(egress[0].dest, Net::Host("10.9.0.1".parse().unwrap()));
        assert_eq!(policy.warnings.len(), 1);
        assert!(policy.warnings[0].reason.contains("dead.example"));
    }

    #[tokio::test]
    async fn literal_entries_keep_label_order_around_hostnames() {
        let compiler =
            PolicyCompiler::new(MockResolver::new().with_host("example.org", &["10.1.1.1"]));
        let policy = compiler
            .compile(&labels(&[
                (LABEL_MANAGED, "true"),
                (LABEL_DENY_OUTGOING, "true"),
                (LABEL_ALLOW_TO, "10.5.0.0/16;example.org;192.168.0.1:53/udp"),
            ]))
            .await;

        let egress = policy.egress_allow.unwrap();
        assert_eq!(egress.len(), 3);
        assert_eq!(egress[0].dest, Net::Subnet("10.5.0.0/16".parse().unwrap()));
        assert_eq!(egress[1].dest, Net::Host("10.1.1.1".parse().unwrap()));
        assert_eq!(egress[2].dest, Net::Host("192.168.0.1".parse().unwrap()));
        assert_eq!(egress[2].proto, Some(Protocol::Udp));
    }

    #[tokio::test]
    async fn unmanaged_reads_no_other_labels() {
        // Malformed labels on an unmanaged container must produce no
        // warnings: the gate short-circuits everything.
        let policy = compiler()
            .compile(&labels(&[
                (LABEL_ALLOW_FROM, "garbage"),
                (LABEL_ALLOW_TO, "also garbage"),
            ]))
            .await;
        assert!(!policy.managed);
        assert!(policy.warnings.is_empty());
    }
}
