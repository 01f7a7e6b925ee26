//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API so the
//! reconciler can run against [`MockDockerClient`] in tests while
//! production uses [`BollardDockerClient`]. Inspection is reduced to a
//! [`ContainerMeta`] carrying exactly the facts policy compilation needs:
//! labels, networks, and the published port map.

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use bollard::models::ContainerInspectResponse;
use futures::Stream;

use ufwguard_core::error::DockerError;
use ufwguard_core::types::{ExposedPort, OwnerTag};

use crate::event::LifecycleEvent;
use crate::policy::LABEL_MANAGED;

/// Validates a container id before handing it to the Docker API.
///
/// Ids arrive from the event stream, but an id also ends up inside shell
/// arguments via the owner tag, so only hex ids of sane length pass.
fn validate_container_id(id: &str) -> Result<(), DockerError> {
    if id.is_empty() || id.len() > 64 {
        return Err(DockerError::Api(format!(
            "invalid container id: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DockerError::Api(
            "invalid container id: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// Container facts extracted from an inspect response.
#[derive(Debug, Clone, Default)]
pub struct ContainerMeta {
    /// Full container id.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// All container labels.
    pub labels: HashMap<String, String>,
    /// `HostConfig.NetworkMode`, when set.
    pub network_mode: Option<String>,
    /// Attached networks with a parseable address.
    pub networks: HashMap<String, IpAddr>,
    /// Published ports with at least one host binding, sorted.
    pub exposed_ports: Vec<ExposedPort>,
}

impl ContainerMeta {
    /// Reduces a raw inspect response to the facts we act on.
    pub fn from_inspect(details: ContainerInspectResponse) -> Self {
        let id = details.id.unwrap_or_default();
        let name = details
            .name
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        let labels = details
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default();
        let network_mode = details.host_config.and_then(|h| h.network_mode);

        let mut networks = HashMap::new();
        let mut exposed_ports = Vec::new();
        if let Some(settings) = details.network_settings {
            if let Some(endpoints) = settings.networks {
                for (network, endpoint) in endpoints {
                    if let Some(ip) = endpoint
                        .ip_address
                        .as_deref()
                        .filter(|ip| !ip.is_empty())
                        .and_then(|ip| ip.parse().ok())
                    {
                        networks.insert(network, ip);
                    }
                }
            }
            if let Some(ports) = settings.ports {
                for (key, bindings) in ports {
                    // Only ports with an actual host binding are exposed.
                    let bound = bindings.is_some_and(|b| !b.is_empty());
                    if bound {
                        if let Some(port) = ExposedPort::from_port_key(&key) {
                            exposed_ports.push(port);
                        }
                    }
                }
            }
        }
        // Deterministic rule order regardless of map iteration order.
        exposed_ports.sort();

        Self {
            id,
            name,
            labels,
            network_mode,
            networks,
            exposed_ports,
        }
    }

    /// The address rules are written against.
    ///
    /// A container on a user-defined network gets that network's address;
    /// otherwise the default bridge address. `None` for host/none network
    /// modes and containers with no parseable address.
    pub fn routable_address(&self) -> Option<IpAddr> {
        if let Some(mode) = self.network_mode.as_deref() {
            if mode != "default" && mode != "bridge" {
                return self.networks.get(mode).copied();
            }
        }
        self.networks.get("bridge").copied()
    }

    /// Ownership key for this container's rules.
    pub fn owner_tag(&self) -> OwnerTag {
        OwnerTag::new(self.name.clone(), &self.id)
    }
}

/// Trait abstracting the Docker API operations the reconciler needs.
pub trait DockerClient: Send + Sync + 'static {
    /// Inspects a container. A container that no longer exists (it
    /// vanished between the event and the inspect) yields
    /// [`DockerError::ContainerVanished`].
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerMeta, DockerError>> + Send;

    /// Lists ids of running containers carrying the management label.
    fn list_managed_running(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, DockerError>> + Send;

    /// Checks daemon connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), DockerError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Cheap to clone; the underlying connection is shared.
#[derive(Clone)]
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects to Docker using the default local socket.
    pub fn connect_local() -> Result<Self, DockerError> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::Connection(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, DockerError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    DockerError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Subscribes to container start/die/kill events.
    ///
    /// Filtering happens server-side; [`LifecycleEvent::from_message`]
    /// re-checks on our side and drops anything it cannot decode. The
    /// stream ends when the daemon connection is lost; the caller decides
    /// whether to reconnect.
    pub fn lifecycle_events(
        &self,
    ) -> impl Stream<Item = Result<Option<LifecycleEvent>, DockerError>> + '_ {
        use bollard::system::EventsOptions;
        use futures::StreamExt;

        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);
        filters.insert(
            "event".to_owned(),
            vec!["start".to_owned(), "die".to_owned(), "kill".to_owned()],
        );

        self.docker
            .events(Some(EventsOptions::<String> {
                since: None,
                until: None,
                filters,
            }))
            .map(|item| match item {
                Ok(message) => Ok(LifecycleEvent::from_message(&message)),
                Err(e) => Err(DockerError::Connection(format!("event stream failed: {e}"))),
            })
    }
}

impl DockerClient for BollardDockerClient {
    async fn inspect_container(&self, id: &str) -> Result<ContainerMeta, DockerError> {
        validate_container_id(id)?;

        match self.docker.inspect_container(id, None).await {
            Ok(details) => Ok(ContainerMeta::from_inspect(details)),
            Err(e) if e.to_string().contains("404") => {
                Err(DockerError::ContainerVanished(id.to_owned()))
            }
            Err(e) => Err(DockerError::Api(format!("inspect container failed: {e}"))),
        }
    }

    async fn list_managed_running(&self) -> Result<Vec<String>, DockerError> {
        use bollard::container::ListContainersOptions;

        let mut filters = HashMap::new();
        // Label presence only; the policy compiler decides whether the
        // value actually enables management.
        filters.insert("label".to_owned(), vec![LABEL_MANAGED.to_owned()]);

        let options = ListContainersOptions::<String> {
            all: false,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| DockerError::Api(format!("list containers failed: {e}")))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| c.id)
            .collect())
    }

    async fn ping(&self) -> Result<(), DockerError> {
        self.docker
            .ping()
            .await
            .map_err(|e| DockerError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// Test Docker client with a fixed container table.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    containers: Vec<ContainerMeta>,
    fail_inspects: bool,
}

#[cfg(test)]
impl MockDockerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(mut self, meta: ContainerMeta) -> Self {
        self.containers.push(meta);
        self
    }

    pub fn with_failing_inspects(mut self) -> Self {
        self.fail_inspects = true;
        self
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn inspect_container(&self, id: &str) -> Result<ContainerMeta, DockerError> {
        if self.fail_inspects {
            return Err(DockerError::Api("mock failure".to_owned()));
        }
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DockerError::ContainerVanished(id.to_owned()))
    }

    async fn list_managed_running(&self) -> Result<Vec<String>, DockerError> {
        Ok(self
            .containers
            .iter()
            .filter(|c| c.labels.contains_key(LABEL_MANAGED))
            .map(|c| c.id.clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), DockerError> {
        Ok(())
    }
}
