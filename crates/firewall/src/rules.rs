//! Rule compilation — a [`Policy`] plus container facts to an ordered
//! list of [`RuleOp`]s.
//!
//! Pure and deterministic: same policy, ports, and address always produce
//! the same ops in the same order. Ordering matters because UFW evaluates
//! rules first-match: every allow must precede the container's terminal
//! deny, and reply allows must exist before egress is clamped.

use std::net::IpAddr;

use ufwguard_core::types::{ExposedPort, OwnerTag, RuleOp};

use crate::policy::Policy;

/// Compiles a policy against a container's exposed ports and address.
///
/// Emits, in order:
/// 1. per exposed port, per ingress source: an ingress allow, immediately
///    followed by its reply allow when deny-outgoing is set;
/// 2. one egress allow per allow-list entry, in label order;
/// 3. a single terminal deny-all-egress when deny-outgoing is set.
///
/// An unmanaged policy compiles to no ops.
pub fn compile(
    policy: &Policy,
    exposed: &[ExposedPort],
    container_addr: IpAddr,
    owner: &OwnerTag,
) -> Vec<RuleOp> {
    if !policy.managed {
        return Vec::new();
    }

    let mut ops = Vec::new();

    if let Some(sources) = &policy.ingress_sources {
        for port in exposed {
            for source in sources {
                ops.push(RuleOp::allow_in(
                    port.protocol,
                    source.clone(),
                    container_addr,
                    port.port,
                    owner.clone(),
                ));
                if policy.deny_outgoing {
                    // Without this the terminal deny below would drop the
                    // response half of an allowed inbound flow.
                    ops.push(RuleOp::allow_reply(
                        port.protocol,
                        container_addr,
                        port.port,
                        source.clone(),
                        owner.clone(),
                    ));
                }
            }
        }
    }

    if policy.deny_outgoing {
        if let Some(egress) = &policy.egress_allow {
            for entry in egress {
                ops.push(RuleOp::allow_out(
                    entry.proto,
                    container_addr,
                    entry.dest.clone(),
                    entry.port,
                    owner.clone(),
                ));
            }
        }
        ops.push(RuleOp::deny_out_all(container_addr, owner.clone()));
    }

    ops
}
