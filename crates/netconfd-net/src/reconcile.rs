//! Edit-to-match reconciliation of an interface's layer-3 state.
//!
//! One pass transitions the kernel's address set and default route for a
//! single link toward a [`DesiredState`], touching only what differs. The
//! pass is idempotent and safe to re-run at any time: when the target
//! address (or route) is already present nothing is added and nothing is
//! deleted, so a converged interface sees zero kernel mutations.
//!
//! Ordering within a pass: link admin-up, then address work, then route
//! work; within each, deletions of conflicting objects precede the add of
//! the target. Deletion failures are tolerated (logged and skipped); a
//! failure to add the target fails the pass.

use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::netlink::Netlink;
use crate::types::{DesiredState, LinkHandle, RouteEntry};

/// Run one idempotent reconciliation pass against `link`.
pub async fn reconcile<N>(net: &N, link: &LinkHandle, desired: &DesiredState) -> Result<()>
where
    N: Netlink + ?Sized,
{
    if !link.is_up {
        info!(interface = %link.name, "bringing link up");
        net.set_link_up(link).await?;
    }

    reconcile_addresses(net, link, desired).await?;

    if let Some(gateway) = desired.gateway {
        reconcile_default_route(net, link, gateway).await?;
    }

    Ok(())
}

async fn reconcile_addresses<N>(net: &N, link: &LinkHandle, desired: &DesiredState) -> Result<()>
where
    N: Netlink + ?Sized,
{
    let current = net.list_ipv4_addrs(link).await?;

    if current.iter().any(|c| *c == desired.cidr) {
        debug!(interface = %link.name, ip = %desired.cidr, "address already configured, skipping");
        return Ok(());
    }

    // Remove addresses carrying a different IP before installing the target.
    for addr in current.iter().filter(|c| c.addr != desired.cidr.addr) {
        match net.del_addr(link, *addr).await {
            Ok(()) => {
                debug!(interface = %link.name, address = %addr, "removed existing address");
            }
            Err(err) => {
                warn!(interface = %link.name, address = %addr, error = %err,
                    "failed to remove existing address");
            }
        }
    }

    match net.add_addr(link, desired.cidr, desired.lifetimes).await {
        Ok(()) => {
            info!(interface = %link.name, ip = %desired.cidr, "added address");
            Ok(())
        }
        Err(err) if err.is_exists() => {
            debug!(interface = %link.name, ip = %desired.cidr, "address already exists, ignoring");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn reconcile_default_route<N>(net: &N, link: &LinkHandle, gateway: Ipv4Addr) -> Result<()>
where
    N: Netlink + ?Sized,
{
    let routes = net.list_ipv4_routes().await?;

    let is_target = |r: &RouteEntry| {
        r.is_default() && r.gateway == Some(gateway) && r.link_index == link.index
    };

    if routes.iter().any(|r| is_target(r)) {
        debug!(interface = %link.name, gateway = %gateway, "default route already exists, skipping");
        return Ok(());
    }

    // Prune competing defaults before installing the target.
    for route in routes.iter().filter(|r| r.is_default() && !is_target(r)) {
        match net.del_route(route).await {
            Ok(()) => {
                debug!(interface = %link.name, route = %route, "removed existing default route");
            }
            Err(err) => {
                warn!(interface = %link.name, route = %route, error = %err,
                    "failed to remove existing default route");
            }
        }
    }

    let target = RouteEntry {
        dst: None,
        gateway: Some(gateway),
        link_index: link.index,
    };
    match net.add_route(&target).await {
        Ok(()) => {
            info!(interface = %link.name, gateway = %gateway, "added default route");
            Ok(())
        }
        Err(err) if err.is_exists() => {
            debug!(interface = %link.name, gateway = %gateway,
                "default route already exists, ignoring");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
