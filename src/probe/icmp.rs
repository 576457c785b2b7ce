pub mod client;

use crate::probe::icmp_packet::IcmpPacket;
use crate::probe::{Reachability, ReachabilityProbe};
use crate::utils::resolve_host;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use client::{IcmpClient, ReplyToken};
use parking_lot::Mutex;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PAYLOAD: &[u8] = b"ping-monitor landmark probe";

/// Echo probe against the landmark host.
///
/// Hostnames are resolved again on every probe so that a DNS failure shows
/// up as unreachable; IP literals skip resolution. Sockets are opened
/// lazily, one per address family, and reopened on the next probe if
/// opening fails.
pub struct IcmpProbe {
    landmark: String,
    literal: Option<IpAddr>,
    timeout: Duration,
    ident: u16,
    seq: AtomicU16,
    client_v4: Mutex<Option<Arc<IcmpClient>>>,
    client_v6: Mutex<Option<Arc<IcmpClient>>>,
    socket_warned: AtomicBool,
}

impl IcmpProbe {
    pub fn new(landmark: impl Into<String>, timeout: Duration) -> Self {
        let landmark = landmark.into();
        let literal = landmark.parse::<IpAddr>().ok();
        Self {
            landmark,
            literal,
            timeout,
            ident: (std::process::id() % u16::MAX as u32) as u16,
            seq: AtomicU16::new(0),
            client_v4: Mutex::new(None),
            client_v6: Mutex::new(None),
            socket_warned: AtomicBool::new(false),
        }
    }

    async fn target(&self) -> Result<IpAddr> {
        match self.literal {
            Some(addr) => Ok(addr),
            None => Ok(resolve_host(&self.landmark).await?),
        }
    }

    fn client(&self, v6: bool) -> Result<Arc<IcmpClient>> {
        let slot = if v6 { &self.client_v6 } else { &self.client_v4 };
        let mut guard = slot.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = match IcmpClient::new(v6) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                if self.first_socket_failure() {
                    warn!(error = %e, v6, "cannot open ICMP socket, probes will fail until it can be opened");
                } else {
                    debug!(error = %e, v6, "cannot open ICMP socket");
                }
                return Err(e).context("Failed to open ICMP socket");
            }
        };
        if self.socket_warned.swap(false, Ordering::Relaxed) {
            info!(v6, "ICMP socket opened after earlier failures");
        }
        debug!(v6, sock_type = ?client.socket().sock_type(), "opened ICMP socket");
        *guard = Some(client.clone());
        Ok(client)
    }

    /// True only for the first failure since the last successful open.
    fn first_socket_failure(&self) -> bool {
        !self.socket_warned.swap(true, Ordering::Relaxed)
    }

    async fn echo(&self) -> Result<Duration> {
        let target = self.target().await?;
        let client = self.client(target.is_ipv6())?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        let token = ReplyToken(target, client.reply_ident(self.ident), seq);
        let mut waiter = client.register(token);

        let packet = IcmpPacket::echo_request(client.is_v6(), self.ident, seq, PAYLOAD.to_vec());
        let sent_at = Instant::now();
        client
            .socket()
            .send_to(&packet.encode(), &SocketAddr::new(target, 0))
            .await
            .with_context(|| format!("Failed to send echo to {}", target))?;

        let reply = waiter
            .recv()
            .await
            .ok_or_else(|| anyhow!("ICMP receiver stopped"))?;
        debug!(%target, seq = reply.packet.sequence, "echo reply");
        Ok(reply.received_at.saturating_duration_since(sent_at))
    }
}

#[async_trait]
impl ReachabilityProbe for IcmpProbe {
    async fn probe(&self) -> Reachability {
        match tokio::time::timeout(self.timeout, self.echo()).await {
            Ok(Ok(rtt)) => Reachability::Reachable { rtt },
            Ok(Err(e)) => {
                debug!(landmark = %self.landmark, error = %format!("{:#}", e), "probe failed");
                Reachability::Unreachable
            }
            Err(_) => {
                debug!(landmark = %self.landmark, timeout = ?self.timeout, "probe timed out");
                Reachability::Unreachable
            }
        }
    }
}
