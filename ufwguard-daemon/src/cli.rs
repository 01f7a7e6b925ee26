//! CLI argument definitions for ufwguard-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Label-driven UFW firewall management for Docker containers.
///
/// Watches the Docker event stream and applies/removes UFW rules as
/// containers labelled `UFW_MANAGED=true` start and stop.
#[derive(Parser, Debug)]
#[command(name = "ufwguard-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to ufwguard.toml configuration file.
    #[arg(short, long, default_value = "/etc/ufwguard/ufwguard.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::try_parse_from(["ufwguard-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/ufwguard/ufwguard.toml"));
        assert!(cli.log_level.is_none());
        assert!(cli.log_format.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_and_validate_flag() {
        let cli = DaemonCli::try_parse_from([
            "ufwguard-daemon",
            "--config",
            "/tmp/custom.toml",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/custom.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert!(cli.validate);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(DaemonCli::try_parse_from(["ufwguard-daemon", "--bogus"]).is_err());
    }
}
