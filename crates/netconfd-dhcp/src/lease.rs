//! Lease values extracted from a DHCPv4 ACK.

use std::net::Ipv4Addr;
use std::time::Duration;

use dhcproto::v4::{DhcpOption, Message, OptionCode};

/// Subnet mask assumed when the ACK carries none.
pub const DEFAULT_SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Lease time assumed when the ACK carries none.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

/// Renewal (T1) time assumed when the ACK carries none.
pub const DEFAULT_RENEWAL: Duration = Duration::from_secs(30);

/// The outcome of one successful DHCPv4 exchange.
///
/// Snapshots are values: created from an ACK, consumed by one
/// reconciliation pass, then discarded. Option accessors apply the protocol
/// defaults so callers never see a half-specified lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseSnapshot {
    /// The address the server assigned (yiaddr).
    pub yiaddr: Ipv4Addr,
    /// Subnet mask from option 1, if present.
    pub subnet_mask: Option<Ipv4Addr>,
    /// Gateways from option 3, in server order.
    pub routers: Vec<Ipv4Addr>,
    /// Resolver addresses from option 6, in server order.
    pub dns_servers: Vec<Ipv4Addr>,
    /// Lease time in seconds from option 51, if present.
    pub lease_secs: Option<u32>,
    /// Renewal (T1) time in seconds from option 58, if present.
    pub renewal_secs: Option<u32>,
    /// Server identifier from option 54, if present.
    pub server_id: Option<Ipv4Addr>,
}

impl LeaseSnapshot {
    /// Extract the lease fields from an ACK message.
    pub fn from_ack(ack: &Message) -> Self {
        let opts = ack.opts();

        let subnet_mask = opts.get(OptionCode::SubnetMask).and_then(|opt| {
            if let DhcpOption::SubnetMask(mask) = opt {
                Some(*mask)
            } else {
                None
            }
        });

        let routers = opts
            .get(OptionCode::Router)
            .and_then(|opt| {
                if let DhcpOption::Router(routers) = opt {
                    Some(routers.clone())
                } else {
                    None
                }
            })
            .unwrap_or_default();

        let dns_servers = opts
            .get(OptionCode::DomainNameServer)
            .and_then(|opt| {
                if let DhcpOption::DomainNameServer(servers) = opt {
                    Some(servers.clone())
                } else {
                    None
                }
            })
            .unwrap_or_default();

        let lease_secs = opts.get(OptionCode::AddressLeaseTime).and_then(|opt| {
            if let DhcpOption::AddressLeaseTime(secs) = opt {
                Some(*secs)
            } else {
                None
            }
        });

        let renewal_secs = opts.get(OptionCode::Renewal).and_then(|opt| {
            if let DhcpOption::Renewal(secs) = opt {
                Some(*secs)
            } else {
                None
            }
        });

        let server_id = opts.get(OptionCode::ServerIdentifier).and_then(|opt| {
            if let DhcpOption::ServerIdentifier(addr) = opt {
                Some(*addr)
            } else {
                None
            }
        });

        Self {
            yiaddr: ack.yiaddr(),
            subnet_mask,
            routers,
            dns_servers,
            lease_secs,
            renewal_secs,
            server_id,
        }
    }

    /// The subnet mask, defaulting to /24 when the server sent none.
    pub fn subnet_mask_or_default(&self) -> Ipv4Addr {
        self.subnet_mask.unwrap_or(DEFAULT_SUBNET_MASK)
    }

    /// The first router, if any. The engine only ever uses the first.
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.routers.first().copied()
    }

    /// Lease duration, defaulting to 60 seconds.
    pub fn lease(&self) -> Duration {
        self.lease_secs
            .map(|s| Duration::from_secs(s.into()))
            .unwrap_or(DEFAULT_LEASE)
    }

    /// Renewal (T1) duration, defaulting to 30 seconds.
    pub fn renewal(&self) -> Duration {
        self.renewal_secs
            .map(|s| Duration::from_secs(s.into()))
            .unwrap_or(DEFAULT_RENEWAL)
    }
}
