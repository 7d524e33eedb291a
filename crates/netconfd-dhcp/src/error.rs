//! Error types for the DHCPv4 transport.

use std::time::Duration;

use thiserror::Error;

/// Error type for one lease exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The named interface does not exist or exposes no hardware address
    #[error("interface unavailable: {name}: {source}")]
    InterfaceUnavailable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The full exchange did not complete within the deadline
    #[error("DHCP exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with something other than a valid lease
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Socket-level failure
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
