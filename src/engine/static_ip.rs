//! Static engine: enforce a fixed address against drift.
//!
//! A fixed 30-second ticker (with an immediate first pass) re-resolves the
//! interface, heals a downed link, and re-runs the reconciler whenever the
//! configured IP is missing. The drift check compares addresses only: an
//! interface holding the right IP under a different prefix is left alone.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use netconfd_net::{reconcile, DesiredState, Ipv4Cidr, LinkHandle, Netlink};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::StaticConfig;
use super::Engine;

/// Cadence of the drift check.
pub const TICK_PERIOD: Duration = Duration::from_secs(30);

/// Idempotent reconciler loop for one statically configured interface.
pub struct StaticEngine<N> {
    iface: String,
    target: DesiredState,
    net: Arc<N>,
}

impl<N> StaticEngine<N>
where
    N: Netlink,
{
    /// Parse and validate the policy, verifying the interface exists.
    /// Configuration errors here are fatal for this engine only.
    pub async fn new(iface: &str, config: &StaticConfig, net: Arc<N>) -> Result<Self> {
        let target = parse_target(config)?;

        let link = net
            .link_by_name(iface)
            .await
            .with_context(|| format!("interface not found: {}", iface))?;
        debug!(component = "static", interface = %iface, mac = %link.mac_string(),
            "resolved interface");

        Ok(Self {
            iface: iface.to_string(),
            target,
            net,
        })
    }

    /// One drift-check pass.
    async fn tick(&self) -> Result<()> {
        let link = self.net.link_by_name(&self.iface).await?;
        let link = self.ensure_link_up(link).await?;

        let addrs = self.net.list_ipv4_addrs(&link).await?;
        if addrs.iter().any(|a| a.addr == self.target.cidr.addr) {
            debug!(component = "static", interface = %self.iface,
                ip = %self.target.cidr, "address present, nothing to do");
            return Ok(());
        }

        warn!(component = "static", interface = %self.iface, ip = %self.target.cidr,
            "address missing from interface, reapplying configuration");
        reconcile(self.net.as_ref(), &link, &self.target).await?;
        info!(component = "static", interface = %self.iface, "static configuration reapplied");
        Ok(())
    }

    async fn ensure_link_up(&self, link: LinkHandle) -> Result<LinkHandle> {
        if link.is_up {
            return Ok(link);
        }
        warn!(component = "static", interface = %self.iface, "link is down, bringing it up");
        self.net.set_link_up(&link).await?;
        Ok(LinkHandle {
            is_up: true,
            ..link
        })
    }
}

/// Parse the textual policy into a reconciler target. IPv4 only; the
/// netmask must be contiguous; the gateway is optional.
fn parse_target(config: &StaticConfig) -> Result<DesiredState> {
    let ip: Ipv4Addr = config
        .ip
        .parse()
        .map_err(|_| anyhow!("invalid IP address: {}", config.ip))?;
    let netmask: Ipv4Addr = config
        .netmask
        .parse()
        .map_err(|_| anyhow!("invalid netmask: {}", config.netmask))?;
    let cidr = Ipv4Cidr::from_mask(ip, netmask)?;

    let gateway = match config.gateway.as_deref().filter(|gw| !gw.is_empty()) {
        Some(gw) => Some(
            gw.parse::<Ipv4Addr>()
                .map_err(|_| anyhow!("invalid gateway address: {}", gw))?,
        ),
        None => None,
    };

    Ok(DesiredState {
        cidr,
        gateway,
        lifetimes: None,
    })
}

#[async_trait]
impl<N> Engine for StaticEngine<N>
where
    N: Netlink,
{
    fn interface_name(&self) -> &str {
        &self.iface
    }

    async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(component = "static", interface = %self.iface,
            ip = %self.target.cidr, gateway = ?self.target.gateway,
            "starting static engine");

        // The first tick completes immediately, so the initial apply does
        // not wait out a full period.
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(component = "static", interface = %self.iface, "static engine stopped");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(component = "static", interface = %self.iface,
                            error = %err, "configuration check failed");
                    }
                }
            }
        }
    }
}
