//! Error types — domain error taxonomy for ufwguard.
//!
//! None of these errors should terminate the daemon: parse-level errors are
//! caught at the feature boundary (ingress vs. egress) and degrade that
//! feature to disabled, control-plane errors are caught per rule operation.
//! The reconciler is a long-running service and keeps consuming the event
//! stream regardless of any single container's policy or UFW hiccups.

/// Top-level ufwguard error.
#[derive(Debug, thiserror::Error)]
pub enum UfwGuardError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Label/policy parse error
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Docker collaborator error
    #[error("docker error: {0}")]
    Docker(#[from] DockerError),

    /// UFW control-plane error
    #[error("control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file missing
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was looked up
        path: String,
    },

    /// TOML parse failure
    #[error("failed to parse config: {reason}")]
    ParseFailed {
        /// Parser diagnostic
        reason: String,
    },

    /// Semantically invalid value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Label parsing and selector validation errors.
///
/// These are always caught at the feature boundary: a failing label disables
/// its feature for that container and never aborts other labels.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Port/protocol suffix does not match the `port[/proto]` grammar.
    #[error("invalid port spec '{value}' (expected e.g. '80', '80/tcp', or 'udp')")]
    InvalidPort {
        /// Offending raw value
        value: String,
    },

    /// Item is neither an IP, a CIDR, `any`, nor a valid hostname.
    #[error("invalid selector '{value}'")]
    InvalidSelector {
        /// Offending raw value
        value: String,
    },

    /// Destination host is neither a literal network nor a syntactically
    /// valid hostname.
    #[error("invalid hostname '{value}'")]
    InvalidHostname {
        /// Offending raw value
        value: String,
    },

    /// Hostname resolved to zero addresses (non-fatal; the selector simply
    /// contributes no rules).
    #[error("hostname '{host}' resolved to no addresses")]
    ResolutionEmpty {
        /// Hostname that was looked up
        host: String,
    },
}

/// Docker collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    /// Socket connection failure
    #[error("docker connection error: {0}")]
    Connection(String),

    /// API call failure
    #[error("docker api error: {0}")]
    Api(String),

    /// Container disappeared between the event and the lookup (non-fatal;
    /// the event is ignored, racing fast-exiting containers is expected).
    #[error("container vanished: {0}")]
    ContainerVanished(String),
}

/// UFW control-plane errors, one per adapter operation.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// `apply` failed
    #[error("failed to apply rule ({rule}): {reason}")]
    ApplyFailed {
        /// Rendered rule text
        rule: String,
        /// Failure detail
        reason: String,
    },

    /// `delete` failed
    #[error("failed to delete rule {number}: {reason}")]
    DeleteFailed {
        /// Control-plane rule number
        number: u32,
        /// Failure detail
        reason: String,
    },

    /// Rule-table query failed
    #[error("failed to query rule table: {reason}")]
    QueryFailed {
        /// Failure detail
        reason: String,
    },

    /// Invocation exceeded its bounded timeout. Treated as a failure for
    /// that operation; never retried.
    #[error("ufw invocation timed out after {secs}s")]
    Timeout {
        /// Configured timeout
        secs: u64,
    },
}
