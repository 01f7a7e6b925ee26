//! Event-driven rule lifecycle reconciliation.
//!
//! [`Reconciler::handle_event`] takes `&mut self`, so a single owner
//! processes events strictly in order; rules for one container are never
//! applied concurrently with their own teardown.
//!
//! Nothing in here returns an error to the caller: a failed inspect, a
//! rejected rule, or a wedged delete degrades that one container and is
//! logged. The daemon keeps consuming events regardless.

use tracing::{debug, info, warn};

use ufwguard_core::error::DockerError;
use ufwguard_core::types::OwnerTag;

use crate::docker::{ContainerMeta, DockerClient};
use crate::event::LifecycleEvent;
use crate::policy::PolicyCompiler;
use crate::resolver::HostnameResolver;
use crate::rules;
use crate::ufw::UfwBackend;

/// Applies and tears down firewall rules in response to container
/// lifecycle events.
pub struct Reconciler<D, U, R> {
    docker: D,
    ufw: U,
    compiler: PolicyCompiler<R>,
}

impl<D, U, R> Reconciler<D, U, R>
where
    D: DockerClient,
    U: UfwBackend,
    R: HostnameResolver,
{
    /// Creates a reconciler over the given Docker client, firewall
    /// backend, and hostname resolver.
    pub fn new(docker: D, ufw: U, resolver: R) -> Self {
        Self {
            docker,
            ufw,
            compiler: PolicyCompiler::new(resolver),
        }
    }

    /// Processes one lifecycle event to completion.
    pub async fn handle_event(&mut self, event: &LifecycleEvent) {
        if event.action.is_stop() {
            self.on_stop(&event.container_id, event.container_name.as_deref())
                .await;
        } else {
            self.on_start(&event.container_id).await;
        }
    }

    /// Applies rules for every running managed container.
    ///
    /// Run once at startup so containers started while the daemon was
    /// down still get their rules.
    pub async fn sync_running(&mut self) {
        let ids = match self.docker.list_managed_running().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "startup sync failed to list containers");
                return;
            }
        };
        info!(count = ids.len(), "syncing rules for running containers");
        for id in ids {
            self.on_start(&id).await;
        }
    }

    async fn on_start(&mut self, container_id: &str) {
        let meta = match self.docker.inspect_container(container_id).await {
            Ok(meta) => meta,
            Err(e @ DockerError::ContainerVanished(_)) => {
                debug!(container_id, error = %e, "container vanished before inspect, skipping");
                return;
            }
            Err(e) => {
                warn!(container_id, error = %e, "inspect failed, skipping container");
                return;
            }
        };

        let policy = self.compiler.compile(&meta.labels).await;
        for warning in &policy.warnings {
            warn!(container = meta.name.as_str(), %warning, "label problem");
        }
        if !policy.managed {
            debug!(container = meta.name.as_str(), "container not managed, skipping");
            return;
        }

        let Some(addr) = meta.routable_address() else {
            warn!(
                container = meta.name.as_str(),
                network_mode = meta.network_mode.as_deref().unwrap_or("default"),
                "no routable address, skipping container"
            );
            return;
        };

        let owner = meta.owner_tag();
        let ops = rules::compile(&policy, &meta.exposed_ports, addr, &owner);
        if ops.is_empty() {
            debug!(container = meta.name.as_str(), "policy compiles to no rules");
            return;
        }

        let mut applied = 0usize;
        for op in &ops {
            match self.ufw.apply(op).await {
                Ok(()) => {
                    applied += 1;
                    debug!(container = meta.name.as_str(), rule = %op, "rule applied");
                }
                Err(e) => {
                    warn!(container = meta.name.as_str(), rule = %op, error = %e, "rule apply failed");
                }
            }
        }
        info!(
            container = meta.name.as_str(),
            owner = %owner,
            applied,
            total = ops.len(),
            "container rules applied"
        );
    }

    async fn on_stop(&mut self, container_id: &str, name_hint: Option<&str>) {
        let Some(owner) = self.owner_for_stop(container_id, name_hint).await else {
            warn!(container_id, "cannot determine owner tag, skipping teardown");
            return;
        };

        // Teardown is always attempted, even for containers this process
        // never saw start. Rules from a previous daemon run must still go.
        let initial = match self.ufw.owned_rule_numbers(&owner).await {
            Ok(numbers) => numbers,
            Err(e) => {
                warn!(owner = %owner, error = %e, "rule lookup failed, skipping teardown");
                return;
            }
        };
        if initial.is_empty() {
            debug!(owner = %owner, "no rules owned, nothing to tear down");
            return;
        }

        // Deleting renumbers the table, so re-query before every delete
        // and always take the first match. Bounded by the initial count
        // so a rule that refuses to die cannot loop forever.
        let mut deleted = 0usize;
        for _ in 0..initial.len() {
            let numbers = match self.ufw.owned_rule_numbers(&owner).await {
                Ok(numbers) => numbers,
                Err(e) => {
                    warn!(owner = %owner, error = %e, "rule lookup failed mid-teardown");
                    break;
                }
            };
            let Some(&first) = numbers.first() else {
                break;
            };
            match self.ufw.delete_rule(first).await {
                Ok(()) => {
                    deleted += 1;
                    debug!(owner = %owner, number = first, "rule deleted");
                }
                Err(e) => {
                    warn!(owner = %owner, number = first, error = %e, "rule delete failed");
                }
            }
        }
        info!(owner = %owner, deleted, total = initial.len(), "container rules torn down");
    }

    /// Builds the owner tag for teardown. Prefers the name from the event
    /// (the container is often already gone); falls back to an inspect.
    async fn owner_for_stop(
        &self,
        container_id: &str,
        name_hint: Option<&str>,
    ) -> Option<OwnerTag> {
        if let Some(name) = name_hint {
            return Some(OwnerTag::new(name, container_id));
        }
        match self.docker.inspect_container(container_id).await {
            Ok(meta) => Some(meta.owner_tag()),
            Err(_) => None,
        }
    }
}
