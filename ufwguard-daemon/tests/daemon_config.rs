//! Daemon configuration wiring tests.
//!
//! Exercises the same load path main() uses: a config file named on the
//! command line, with CLI flags taking precedence over file values.

use clap::Parser;

use ufwguard_core::config::UfwGuardConfig;
use ufwguard_daemon::cli::DaemonCli;

#[tokio::test]
async fn loads_config_from_cli_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ufwguard.toml");
    tokio::fs::write(
        &path,
        "[docker]\nsocket = \"/run/user/1000/docker.sock\"\nreconnect_delay_secs = 2\n",
    )
    .await
    .unwrap();

    let cli =
        DaemonCli::try_parse_from(["ufwguard-daemon", "--config", path.to_str().unwrap()])
            .unwrap();
    let config = UfwGuardConfig::load(&cli.config).await.unwrap();

    assert_eq!(config.docker.socket, "/run/user/1000/docker.sock");
    assert_eq!(config.docker.reconnect_delay_secs, 2);
    // Untouched sections keep defaults.
    assert!(config.ufw.use_sudo);
}

#[tokio::test]
async fn cli_flags_beat_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ufwguard.toml");
    tokio::fs::write(&path, "[general]\nlog_level = \"info\"\nlog_format = \"json\"\n")
        .await
        .unwrap();

    let cli = DaemonCli::try_parse_from([
        "ufwguard-daemon",
        "--config",
        path.to_str().unwrap(),
        "--log-level",
        "debug",
        "--log-format",
        "pretty",
    ])
    .unwrap();

    let mut config = UfwGuardConfig::load(&cli.config).await.unwrap();
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config.validate().unwrap();

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
}

#[tokio::test]
async fn missing_config_file_fails_load() {
    let cli = DaemonCli::try_parse_from([
        "ufwguard-daemon",
        "--config",
        "/nonexistent/ufwguard.toml",
    ])
    .unwrap();
    assert!(UfwGuardConfig::load(&cli.config).await.is_err());
}

#[tokio::test]
async fn invalid_cli_override_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ufwguard.toml");
    tokio::fs::write(&path, "").await.unwrap();

    let cli = DaemonCli::try_parse_from([
        "ufwguard-daemon",
        "--config",
        path.to_str().unwrap(),
        "--log-level",
        "loud",
    ])
    .unwrap();

    let mut config = UfwGuardConfig::load(&cli.config).await.unwrap();
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    assert!(config.validate().is_err());
}
