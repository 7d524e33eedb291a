//! Per-interface reconciliation engines.
//!
//! One engine instance owns one interface for the lifetime of the daemon.
//! Engines share nothing with each other; the supervisor runs each on its
//! own task and fans a single shutdown signal out to all of them.

pub mod dhcp;
pub mod static_ip;

#[cfg(test)]
pub mod testutil;

use async_trait::async_trait;
use tokio::sync::watch;

pub use dhcp::DhcpEngine;
pub use static_ip::StaticEngine;

/// A per-interface reconciliation loop.
///
/// `run` drives the interface until the shutdown channel flips to `true`
/// (or its sender is dropped), then returns. Recoverable failures never
/// escape the loop; whatever `run` returns, the engine is finished.
#[async_trait]
pub trait Engine: Send {
    /// Name of the interface this engine manages.
    fn interface_name(&self) -> &str;

    /// Run the reconciliation loop until cancelled.
    async fn run(&mut self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()>;
}
