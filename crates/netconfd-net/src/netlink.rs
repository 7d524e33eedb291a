//! Typed wrapper over the kernel's route netlink API.
//!
//! [`Netlink`] is the capability set the reconciler and the engines are
//! written against; [`RtnetlinkAdapter`] implements it over an async
//! rtnetlink socket. Kernel errno codes are mapped to the kinded variants
//! of [`NetError`] so callers can distinguish "already exists" and "not
//! found" from real failures.

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use futures::TryStreamExt;
use rtnetlink::packet_route::address::{AddressAttribute, AddressMessage, CacheInfo};
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags};
use rtnetlink::LinkUnspec;
use rtnetlink::packet_route::route::{RouteAddress, RouteAttribute};
use rtnetlink::packet_route::AddressFamily;
use rtnetlink::{Handle, RouteMessageBuilder};

use crate::error::{NetError, Result};
use crate::types::{AddrLifetimes, Ipv4Cidr, LinkHandle, RouteEntry};

// Kernel errno values surfaced through netlink error messages.
const EEXIST: i32 = 17;
const ENOENT: i32 = 2;
const ESRCH: i32 = 3;
const ENODEV: i32 = 19;

// Route table the daemon manages; local/broadcast tables are never touched.
const RT_TABLE_MAIN: u8 = 254;

/// Capability set over the kernel's per-link address table, the IPv4 route
/// table, and link administrative state.
#[async_trait]
pub trait Netlink: Send + Sync {
    /// Resolve a link by interface name.
    async fn link_by_name(&self, name: &str) -> Result<LinkHandle>;

    /// List the IPv4 addresses currently present on the link.
    async fn list_ipv4_addrs(&self, link: &LinkHandle) -> Result<Vec<Ipv4Cidr>>;

    /// Add an IPv4 address, optionally with valid/preferred lifetimes.
    async fn add_addr(
        &self,
        link: &LinkHandle,
        cidr: Ipv4Cidr,
        lifetimes: Option<AddrLifetimes>,
    ) -> Result<()>;

    /// Delete an IPv4 address from the link.
    async fn del_addr(&self, link: &LinkHandle, cidr: Ipv4Cidr) -> Result<()>;

    /// List IPv4 routes from the main routing table.
    async fn list_ipv4_routes(&self) -> Result<Vec<RouteEntry>>;

    /// Add an IPv4 route.
    async fn add_route(&self, route: &RouteEntry) -> Result<()>;

    /// Delete an IPv4 route.
    async fn del_route(&self, route: &RouteEntry) -> Result<()>;

    /// Bring the link administratively up.
    async fn set_link_up(&self, link: &LinkHandle) -> Result<()>;
}

/// Production [`Netlink`] implementation over an rtnetlink socket.
///
/// The netlink connection task is spawned onto the current tokio runtime at
/// construction and lives as long as the handle.
pub struct RtnetlinkAdapter {
    handle: Handle,
}

impl RtnetlinkAdapter {
    /// Open a netlink socket and spawn its connection driver.
    pub fn new() -> Result<Self> {
        let (connection, handle, _) = rtnetlink::new_connection()?;
        tokio::spawn(connection);
        Ok(Self { handle })
    }
}

#[async_trait]
impl Netlink for RtnetlinkAdapter {
    async fn link_by_name(&self, name: &str) -> Result<LinkHandle> {
        let mut links = self
            .handle
            .link()
            .get()
            .match_name(name.to_string())
            .execute();

        let msg = match links.try_next().await {
            Ok(Some(msg)) => msg,
            Ok(None) => return Err(NetError::LinkNotFound(name.to_string())),
            Err(err) => {
                return Err(match map_rtnetlink_err(err) {
                    NetError::NotFound => NetError::LinkNotFound(name.to_string()),
                    other => other,
                })
            }
        };

        let mut mac = None;
        for attr in &msg.attributes {
            if let LinkAttribute::Address(addr) = attr {
                if addr.len() == 6 {
                    let mut buf = [0u8; 6];
                    buf.copy_from_slice(&addr[..6]);
                    mac = Some(buf);
                }
            }
        }

        Ok(LinkHandle {
            name: name.to_string(),
            index: msg.header.index,
            mac,
            is_up: msg.header.flags.contains(LinkFlags::Up),
        })
    }

    async fn list_ipv4_addrs(&self, link: &LinkHandle) -> Result<Vec<Ipv4Cidr>> {
        let mut stream = self
            .handle
            .address()
            .get()
            .set_link_index_filter(link.index)
            .execute();

        let mut addrs = Vec::new();
        while let Some(msg) = stream.try_next().await.map_err(map_rtnetlink_err)? {
            if msg.header.family != AddressFamily::Inet {
                continue;
            }
            // IFA_LOCAL carries the interface address; IFA_ADDRESS is the
            // peer on point-to-point links and equals local otherwise.
            let mut local = None;
            let mut address = None;
            for attr in &msg.attributes {
                match attr {
                    AddressAttribute::Local(IpAddr::V4(v4)) => local = Some(*v4),
                    AddressAttribute::Address(IpAddr::V4(v4)) => address = Some(*v4),
                    _ => {}
                }
            }
            if let Some(addr) = local.or(address) {
                addrs.push(Ipv4Cidr {
                    addr,
                    prefix_len: msg.header.prefix_len,
                });
            }
        }
        Ok(addrs)
    }

    async fn add_addr(
        &self,
        link: &LinkHandle,
        cidr: Ipv4Cidr,
        lifetimes: Option<AddrLifetimes>,
    ) -> Result<()> {
        let mut req = self
            .handle
            .address()
            .add(link.index, IpAddr::V4(cidr.addr), cidr.prefix_len);

        if let Some(lt) = lifetimes {
            let mut info = CacheInfo::default();
            info.ifa_valid = lt.valid_secs;
            info.ifa_preferred = lt.preferred_secs;
            req.message_mut()
                .attributes
                .push(AddressAttribute::CacheInfo(info));
        }

        req.execute().await.map_err(map_rtnetlink_err)
    }

    async fn del_addr(&self, link: &LinkHandle, cidr: Ipv4Cidr) -> Result<()> {
        let mut msg = AddressMessage::default();
        msg.header.family = AddressFamily::Inet;
        msg.header.prefix_len = cidr.prefix_len;
        msg.header.index = link.index;
        msg.attributes
            .push(AddressAttribute::Address(IpAddr::V4(cidr.addr)));
        msg.attributes
            .push(AddressAttribute::Local(IpAddr::V4(cidr.addr)));

        self.handle
            .address()
            .del(msg)
            .execute()
            .await
            .map_err(map_rtnetlink_err)
    }

    async fn list_ipv4_routes(&self) -> Result<Vec<RouteEntry>> {
        let dump = RouteMessageBuilder::<Ipv4Addr>::default().build();
        let mut stream = self.handle.route().get(dump).execute();

        let mut routes = Vec::new();
        while let Some(msg) = stream.try_next().await.map_err(map_rtnetlink_err)? {
            if msg.header.table != RT_TABLE_MAIN {
                continue;
            }
            let dst_len = msg.header.destination_prefix_length;
            let mut dst = None;
            let mut gateway = None;
            let mut link_index = 0;
            for attr in &msg.attributes {
                match attr {
                    RouteAttribute::Destination(RouteAddress::Inet(v4)) => {
                        dst = Some(Ipv4Cidr {
                            addr: *v4,
                            prefix_len: dst_len,
                        });
                    }
                    RouteAttribute::Gateway(RouteAddress::Inet(v4)) => gateway = Some(*v4),
                    RouteAttribute::Oif(idx) => link_index = *idx,
                    _ => {}
                }
            }
            routes.push(RouteEntry {
                dst,
                gateway,
                link_index,
            });
        }
        Ok(routes)
    }

    async fn add_route(&self, route: &RouteEntry) -> Result<()> {
        self.handle
            .route()
            .add(build_route_message(route))
            .execute()
            .await
            .map_err(map_rtnetlink_err)
    }

    async fn del_route(&self, route: &RouteEntry) -> Result<()> {
        self.handle
            .route()
            .del(build_route_message(route))
            .execute()
            .await
            .map_err(map_rtnetlink_err)
    }

    async fn set_link_up(&self, link: &LinkHandle) -> Result<()> {
        self.handle
            .link()
            .set(LinkUnspec::new_with_index(link.index).up().build())
            .execute()
            .await
            .map_err(map_rtnetlink_err)
    }
}

fn build_route_message(
    route: &RouteEntry,
) -> rtnetlink::packet_route::route::RouteMessage {
    let mut builder = RouteMessageBuilder::<Ipv4Addr>::default();
    if let Some(dst) = route.dst {
        builder = builder.destination_prefix(dst.addr, dst.prefix_len);
    }
    if let Some(gw) = route.gateway {
        builder = builder.gateway(gw);
    }
    if route.link_index != 0 {
        builder = builder.output_interface(route.link_index);
    }
    builder.build()
}

/// Map rtnetlink failures onto the kinded error variants.
fn map_rtnetlink_err(err: rtnetlink::Error) -> NetError {
    if let rtnetlink::Error::NetlinkError(ref msg) = err {
        match -msg.raw_code() {
            EEXIST => return NetError::Exists,
            ENOENT | ESRCH | ENODEV => return NetError::NotFound,
            _ => {}
        }
    }
    NetError::Netlink(err)
}
