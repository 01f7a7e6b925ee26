//! Label-driven UFW rule management for Docker containers.
//!
//! This crate turns container labels into UFW rules and keeps them in
//! sync with the container lifecycle:
//!
//! - [`selector`] parses the label grammar (sources, destinations, ports)
//! - [`policy`] compiles labels into a normalized [`Policy`] with
//!   per-label fault isolation
//! - [`resolver`] expands hostname selectors through DNS
//! - [`rules`] compiles a policy into an ordered list of rule operations
//! - [`ufw`] executes operations against the `ufw` command line
//! - [`docker`] wraps the Docker API behind a mockable trait
//! - [`event`] decodes the Docker event stream
//! - [`reconciler`] drives apply/teardown from lifecycle events

pub mod docker;
pub mod event;
pub mod policy;
pub mod reconciler;
pub mod resolver;
pub mod rules;
pub mod selector;
pub mod ufw;

pub use docker::{BollardDockerClient, ContainerMeta, DockerClient};
pub use event::{LifecycleAction, LifecycleEvent};
pub use policy::{EgressAllow, Policy, PolicyCompiler, PolicyWarning};
pub use reconciler::Reconciler;
pub use resolver::{HostnameResolver, SystemResolver};
pub use ufw::{UfwBackend, UfwCli};
