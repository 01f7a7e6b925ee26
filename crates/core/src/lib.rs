//! Shared types, errors, and configuration for ufwguard.
//!
//! ufwguard watches the Docker event stream and manages host-level UFW
//! rules for containers that opt in via labels. This crate holds the data
//! model shared by the firewall engine and the daemon:
//!
//! - [`types`]: domain types ([`Protocol`], [`Net`], [`ExposedPort`],
//!   [`OwnerTag`], [`RuleOp`])
//! - [`error`]: the error taxonomy ([`UfwGuardError`] and friends)
//! - [`config`]: `ufwguard.toml` parsing and validation ([`UfwGuardConfig`])

pub mod config;
pub mod error;
pub mod types;

// --- Public API re-exports ---

pub use config::UfwGuardConfig;
pub use error::{ConfigError, ControlPlaneError, DockerError, PolicyError, UfwGuardError};
pub use types::{ExposedPort, Net, OwnerTag, Protocol, RuleKind, RuleOp};
