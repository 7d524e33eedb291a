//! Kernel-plane adapters and the address/route reconciler.
//!
//! This crate provides everything an interface engine needs to observe and
//! mutate the kernel's layer-3 state:
//!
//! - [`Netlink`]: a typed capability trait over the kernel's route netlink
//!   API (link lookup, IPv4 address and route manipulation, link admin-up),
//!   with [`RtnetlinkAdapter`] as the production implementation.
//! - [`FileStore`]: small-file read/write with atomic replacement, used for
//!   the resolver configuration file.
//! - [`reconcile`]: the idempotent edit-to-match pass that transitions an
//!   interface's address set and default route toward a [`DesiredState`],
//!   touching only what differs.
//!
//! Engines depend on the traits, not the implementations, so every policy
//! decision in this crate is testable against in-memory mocks.

pub mod error;
pub mod files;
pub mod netlink;
pub mod reconcile;
pub mod types;

pub use error::{NetError, Result};
pub use files::{FileStore, SystemFiles};
pub use netlink::{Netlink, RtnetlinkAdapter};
pub use reconcile::reconcile;
pub use types::{AddrLifetimes, DesiredState, Ipv4Cidr, LinkHandle, RouteEntry};
