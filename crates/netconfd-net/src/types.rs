//! Core value types shared by the adapters and the reconciler.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{NetError, Result};

/// An IPv4 address paired with a prefix length.
///
/// The only address form the reconciler manipulates. Dotted-quad netmasks
/// from the configuration boundary are converted with [`Ipv4Cidr::from_mask`];
/// non-contiguous masks are rejected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    pub addr: Ipv4Addr,
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    /// Create a CIDR, rejecting prefix lengths above 32.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(NetError::InvalidPrefixLen(prefix_len));
        }
        Ok(Self { addr, prefix_len })
    }

    /// Create a CIDR from an address and a dotted-quad netmask.
    pub fn from_mask(addr: Ipv4Addr, mask: Ipv4Addr) -> Result<Self> {
        Ok(Self {
            addr,
            prefix_len: mask_to_prefix(mask)?,
        })
    }

    /// The dotted-quad netmask equivalent of the prefix length.
    pub fn netmask(&self) -> Ipv4Addr {
        prefix_to_mask(self.prefix_len)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// Convert a dotted-quad netmask to a prefix length by counting leading
/// ones. Masks whose set bits are not a single leading run are rejected.
pub fn mask_to_prefix(mask: Ipv4Addr) -> Result<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    if bits != prefix_bits(ones as u8) {
        return Err(NetError::NonContiguousMask(mask));
    }
    Ok(ones as u8)
}

/// Convert a prefix length to its dotted-quad netmask.
pub fn prefix_to_mask(prefix_len: u8) -> Ipv4Addr {
    Ipv4Addr::from(prefix_bits(prefix_len))
}

fn prefix_bits(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => u32::MAX << (32 - n),
    }
}

/// A resolved kernel link with cached metadata.
///
/// Handles are short-lived: kernel indices can change when a link is removed
/// and recreated, so callers re-resolve by name before each reconciliation
/// pass.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    pub name: String,
    pub index: u32,
    pub mac: Option<[u8; 6]>,
    /// Administrative up flag, snapshotted at resolution time.
    pub is_up: bool,
}

impl LinkHandle {
    /// Hardware address formatted for logging, or "unknown".
    pub fn mac_string(&self) -> String {
        match self.mac {
            Some(m) => format!(
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                m[0], m[1], m[2], m[3], m[4], m[5]
            ),
            None => "unknown".to_string(),
        }
    }
}

/// One IPv4 route as seen by, or destined for, the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination; `None` means the kernel carried no destination, which
    /// is equivalent to `0.0.0.0/0`.
    pub dst: Option<Ipv4Cidr>,
    pub gateway: Option<Ipv4Addr>,
    pub link_index: u32,
}

impl RouteEntry {
    /// True when this route is an IPv4 default route.
    pub fn is_default(&self) -> bool {
        match self.dst {
            None => true,
            Some(cidr) => cidr.prefix_len == 0,
        }
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dst {
            Some(dst) => write!(f, "{}", dst)?,
            None => write!(f, "default")?,
        }
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        write!(f, " dev #{}", self.link_index)
    }
}

/// Valid/preferred address lifetimes in seconds, attached to DHCP-acquired
/// addresses so the kernel ages them with the lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrLifetimes {
    pub valid_secs: u32,
    pub preferred_secs: u32,
}

/// The target an interface is reconciled toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredState {
    /// The one IPv4 CIDR the interface must carry.
    pub cidr: Ipv4Cidr,
    /// Default-route nexthop through this interface, if any. When unset,
    /// route reconciliation is skipped entirely.
    pub gateway: Option<Ipv4Addr>,
    /// Address lifetimes; set on the DHCP path, absent for static targets.
    pub lifetimes: Option<AddrLifetimes>,
}
