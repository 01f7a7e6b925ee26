//! Daemon run loop — Docker connection, event consumption, reconnection.
//!
//! The loop owns exactly one [`Reconciler`] per Docker connection and
//! feeds it events strictly in arrival order. Losing the connection (or
//! the event stream ending) triggers a delayed reconnect; after every
//! successful reconnect the running containers are re-synced so events
//! missed during the outage are not lost forever.

use std::pin::pin;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tracing::{info, warn};

use ufwguard_core::config::UfwGuardConfig;
use ufwguard_firewall::{BollardDockerClient, DockerClient, Reconciler, SystemResolver, UfwCli};

/// Runs the daemon until a shutdown signal arrives.
///
/// Only returns `Err` for failures before the loop starts; once running,
/// every fault is logged and retried.
pub async fn run(config: UfwGuardConfig) -> Result<()> {
    let reconnect_delay = Duration::from_secs(config.docker.reconnect_delay_secs);
    let ufw = UfwCli::new(config.ufw.use_sudo, config.ufw.command_timeout_secs);

    loop {
        let client = match connect(&config.docker.socket).await {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, delay_secs = reconnect_delay.as_secs(), "docker unavailable, retrying");
                if wait_or_shutdown(reconnect_delay).await {
                    return Ok(());
                }
                continue;
            }
        };
        info!(socket = config.docker.socket.as_str(), "connected to docker daemon");

        let mut reconciler =
            Reconciler::new(client.clone(), ufw.clone(), SystemResolver::new());
        if config.ufw.sync_on_start {
            reconciler.sync_running().await;
        }

        let mut events = pin!(client.lifecycle_events());
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
                item = events.next() => match item {
                    Some(Ok(Some(event))) => reconciler.handle_event(&event).await,
                    Some(Ok(None)) => {} // filtered out during decode
                    Some(Err(e)) => {
                        warn!(error = %e, "event stream error");
                        break;
                    }
                    None => {
                        warn!("event stream ended");
                        break;
                    }
                }
            }
        }

        warn!(delay_secs = reconnect_delay.as_secs(), "docker connection lost, reconnecting");
        if wait_or_shutdown(reconnect_delay).await {
            return Ok(());
        }
    }
}

async fn connect(socket: &str) -> Result<BollardDockerClient> {
    let client = BollardDockerClient::connect_with_socket(socket)?;
    client.ping().await?;
    Ok(client)
}

/// Sleeps for `delay`, returning `true` if a shutdown signal arrived
/// during the wait.
async fn wait_or_shutdown(delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            true
        }
        _ = tokio::time::sleep(delay) => false,
    }
}
