//! DHCP engine: acquire a lease, apply it, sleep until renewal, repeat.
//!
//! Each cycle retries the transport up to [`MAX_ATTEMPTS`] times; a fully
//! failed cycle rearms the timer for [`FAILURE_REARM`] without touching
//! kernel state. A successful lease drives one reconciliation pass and, when
//! the lease names DNS servers, a resolver-file update. Renewal is a fresh
//! full exchange.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use netconfd_dhcp::{LeaseSnapshot, LeaseTransport};
use netconfd_net::{reconcile, AddrLifetimes, DesiredState, FileStore, Ipv4Cidr, Netlink};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::resolver;
use super::Engine;

/// Deadline for one DISCOVER/OFFER/REQUEST/ACK exchange.
pub const ATTEMPT_DEADLINE: Duration = Duration::from_secs(15);

/// Total exchange attempts per cycle.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts within a cycle.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Timer rearm after a fully failed cycle.
pub const FAILURE_REARM: Duration = Duration::from_secs(30);

/// Lease state machine for one DHCP-managed interface.
pub struct DhcpEngine<T, N, F> {
    iface: String,
    transport: Arc<T>,
    net: Arc<N>,
    files: Arc<F>,
}

enum Acquire {
    Lease(LeaseSnapshot),
    Failed,
    Cancelled,
}

impl<T, N, F> DhcpEngine<T, N, F>
where
    T: LeaseTransport,
    N: Netlink,
    F: FileStore,
{
    /// Build the engine, verifying the interface exists on the host.
    pub async fn new(
        iface: &str,
        transport: Arc<T>,
        net: Arc<N>,
        files: Arc<F>,
    ) -> Result<Self> {
        let link = net
            .link_by_name(iface)
            .await
            .with_context(|| format!("interface not found: {}", iface))?;
        debug!(component = "dhcp", interface = %iface, mac = %link.mac_string(),
            "resolved interface");

        Ok(Self {
            iface: iface.to_string(),
            transport,
            net,
            files,
        })
    }

    /// One timer firing: acquire, apply, compute the next delay.
    /// Returns `None` when cancellation was observed mid-cycle.
    async fn cycle(&self, shutdown: &mut watch::Receiver<bool>) -> Option<Duration> {
        let lease = match self.acquire(shutdown).await {
            Acquire::Lease(lease) => lease,
            Acquire::Failed => return Some(FAILURE_REARM),
            Acquire::Cancelled => return None,
        };

        if let Err(err) = self.apply(&lease).await {
            error!(component = "dhcp", interface = %self.iface, error = %err,
                "failed to apply lease");
        } else {
            info!(component = "dhcp", interface = %self.iface, "interface configured");
        }

        if !lease.dns_servers.is_empty() {
            if let Err(err) = resolver::update(self.files.as_ref(), &lease.dns_servers) {
                warn!(component = "dhcp", interface = %self.iface, error = %err,
                    "failed to update resolver configuration");
            }
        }

        let renewal = lease.renewal();
        info!(component = "dhcp", interface = %self.iface,
            renewal_secs = renewal.as_secs(), "sleeping until renewal");
        Some(renewal)
    }

    /// Retry the transport up to [`MAX_ATTEMPTS`] times with a fixed pause
    /// between attempts. Cancellation is observed during the pause.
    async fn acquire(&self, shutdown: &mut watch::Receiver<bool>) -> Acquire {
        for attempt in 1..=MAX_ATTEMPTS {
            debug!(component = "dhcp", interface = %self.iface,
                attempt, max_attempts = MAX_ATTEMPTS, "requesting lease");

            match self
                .transport
                .request_lease(&self.iface, ATTEMPT_DEADLINE)
                .await
            {
                Ok(lease) => {
                    info!(component = "dhcp", interface = %self.iface,
                        ip = %lease.yiaddr, attempt, "obtained lease");
                    return Acquire::Lease(lease);
                }
                Err(err) => {
                    error!(component = "dhcp", interface = %self.iface,
                        attempt, error = %err, "lease request failed");
                }
            }

            if attempt < MAX_ATTEMPTS {
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return Acquire::Cancelled;
                        }
                    }
                }
            }
        }

        error!(component = "dhcp", interface = %self.iface,
            attempts = MAX_ATTEMPTS, rearm_secs = FAILURE_REARM.as_secs(),
            "all lease attempts failed, rescheduling");
        Acquire::Failed
    }

    /// Translate the lease into a desired state and run the reconciler.
    async fn apply(&self, lease: &LeaseSnapshot) -> Result<()> {
        // Re-resolve the link: the kernel index can change across link
        // removal and recreation.
        let link = self.net.link_by_name(&self.iface).await?;

        let cidr = Ipv4Cidr::from_mask(lease.yiaddr, lease.subnet_mask_or_default())?;
        let lease_secs = lease.lease().as_secs() as u32;
        let desired = DesiredState {
            cidr,
            gateway: lease.gateway(),
            lifetimes: Some(AddrLifetimes {
                valid_secs: lease_secs,
                preferred_secs: lease_secs,
            }),
        };

        info!(component = "dhcp", interface = %self.iface, ip = %cidr,
            gateway = ?desired.gateway, lease_secs, "applying lease");
        reconcile(self.net.as_ref(), &link, &desired).await?;
        Ok(())
    }
}

#[async_trait]
impl<T, N, F> Engine for DhcpEngine<T, N, F>
where
    T: LeaseTransport,
    N: Netlink,
    F: FileStore,
{
    fn interface_name(&self) -> &str {
        &self.iface
    }

    async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(component = "dhcp", interface = %self.iface, "starting DHCP engine");

        // Minimal initial delay so the first acquisition runs immediately.
        let mut delay = Duration::from_millis(1);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(component = "dhcp", interface = %self.iface, "DHCP engine stopped");
                        return Ok(());
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    match self.cycle(&mut shutdown).await {
                        Some(next) => delay = next,
                        None => {
                            info!(component = "dhcp", interface = %self.iface, "DHCP engine stopped");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
