//! The `serve` subcommand: run the daemon against a configuration file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use netconfd_dhcp::DoraClient;
use netconfd_net::{RtnetlinkAdapter, SystemFiles};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{Config, InterfaceConfig};
use crate::engine::{DhcpEngine, Engine, StaticEngine};
use crate::{logging, supervisor};

pub async fn run(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    config.validate().context("invalid configuration")?;

    logging::init(&config.logging);
    info!(config_file = %config_path.display(), "starting daemon");

    let net = Arc::new(RtnetlinkAdapter::new().context("failed to open netlink socket")?);
    let files = Arc::new(SystemFiles);
    let transport = Arc::new(DoraClient);

    // One engine per policy entry; entries that fail to instantiate (absent
    // interface, bad static block) are skipped, not fatal.
    let mut engines: Vec<Box<dyn Engine>> = Vec::new();
    for (name, iface_config) in &config.interfaces {
        match build_engine(name, iface_config, &transport, &net, &files).await {
            Ok(engine) => engines.push(engine),
            Err(err) => {
                error!(interface = %name, error = %err, "failed to create interface engine");
            }
        }
    }

    if engines.is_empty() {
        warn!("no interface engines created");
        return Ok(());
    }
    info!(engine_count = engines.len(), "starting interface engines");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx)?;

    supervisor::run(engines, shutdown_rx).await;
    Ok(())
}

async fn build_engine(
    name: &str,
    iface_config: &InterfaceConfig,
    transport: &Arc<DoraClient>,
    net: &Arc<RtnetlinkAdapter>,
    files: &Arc<SystemFiles>,
) -> Result<Box<dyn Engine>> {
    if iface_config.dhcp {
        let engine =
            DhcpEngine::new(name, transport.clone(), net.clone(), files.clone()).await?;
        info!(component = "dhcp", interface = %name, "created DHCP engine");
        Ok(Box::new(engine))
    } else if let Some(static_config) = &iface_config.static_ {
        let engine = StaticEngine::new(name, static_config, net.clone()).await?;
        info!(component = "static", interface = %name,
            ip = %static_config.ip, netmask = %static_config.netmask,
            gateway = ?static_config.gateway, "created static engine");
        Ok(Box::new(engine))
    } else {
        bail!("invalid interface configuration: must specify either dhcp or static");
    }
}

/// Flip the shutdown channel on the first INT or TERM.
fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) -> Result<()> {
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => info!(signal = "SIGINT", "received shutdown signal"),
            _ = terminate.recv() => info!(signal = "SIGTERM", "received shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });
    Ok(())
}
