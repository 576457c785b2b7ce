pub mod icmp;
pub mod icmp_packet;
pub mod link;

use async_trait::async_trait;
use std::time::Duration;

pub use icmp::IcmpProbe;
pub use link::LinkProbe;

/// Outcome of one reachability probe. Every failure cause reads as
/// unreachable; the cause is only logged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reachability {
    Reachable { rtt: Duration },
    Unreachable,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable { .. })
    }

    pub fn rtt(&self) -> Option<Duration> {
        match self {
            Reachability::Reachable { rtt } => Some(*rtt),
            Reachability::Unreachable => None,
        }
    }
}

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Sends one echo and waits for the reply, bounded by the probe's timeout.
    async fn probe(&self) -> Reachability;
}

#[async_trait]
pub trait InterfaceProbe: Send + Sync {
    /// Whether the interface is administratively up and has a link.
    async fn is_up(&self) -> bool;
}
