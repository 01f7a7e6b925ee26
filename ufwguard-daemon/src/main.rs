use anyhow::{Context, Result};
use clap::Parser;

use ufwguard_core::config::UfwGuardConfig;
use ufwguard_daemon::{cli::DaemonCli, logging, run};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = UfwGuardConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    // CLI flags beat both the file and environment variables.
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config.validate().context("configuration invalid")?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config.display(),
        "ufwguard-daemon starting"
    );

    run::run(config).await?;

    tracing::info!("ufwguard-daemon shut down");
    Ok(())
}
