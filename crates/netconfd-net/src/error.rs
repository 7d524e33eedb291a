//! Error types for kernel-plane operations.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Error type for netlink and file adapter operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// No link with the requested name exists on the host
    #[error("link not found: {0}")]
    LinkNotFound(String),

    /// The address or route being added is already present
    #[error("object already exists")]
    Exists,

    /// The address or route being deleted is not present
    #[error("object not found")]
    NotFound,

    /// Prefix length outside 0..=32
    #[error("invalid IPv4 prefix length: {0}")]
    InvalidPrefixLen(u8),

    /// Netmask whose set bits are not a leading run
    #[error("non-contiguous netmask: {0}")]
    NonContiguousMask(Ipv4Addr),

    /// Any other netlink failure
    #[error("netlink request failed: {0}")]
    Netlink(#[source] rtnetlink::Error),

    /// I/O failure outside the netlink socket
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NetError {
    /// True when an add operation failed because the object already exists.
    pub fn is_exists(&self) -> bool {
        matches!(self, NetError::Exists)
    }

    /// True when a delete or lookup failed because the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetError::NotFound | NetError::LinkNotFound(_))
    }
}

/// Result type for kernel-plane operations.
pub type Result<T> = std::result::Result<T, NetError>;
