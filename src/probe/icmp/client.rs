use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use tracing::debug;

use crate::probe::icmp_packet::IcmpPacket;

/// Non-blocking ICMP socket. Unprivileged `SOCK_DGRAM` is tried first and
/// `SOCK_RAW` is the fallback.
#[derive(Clone)]
pub struct AsyncSocket {
    inner: Arc<AsyncFd<std::net::UdpSocket>>,
    sock_type: Type,
}

impl AsyncSocket {
    pub fn new(v6: bool) -> io::Result<Self> {
        let (domain, proto) = if v6 {
            (Domain::IPV6, Protocol::ICMPV6)
        } else {
            (Domain::IPV4, Protocol::ICMPV4)
        };

        let (sock_type, socket) = match Socket::new(domain, Type::DGRAM, Some(proto)) {
            Ok(sock) => (Type::DGRAM, sock),
            Err(_) => (Type::RAW, Socket::new(domain, Type::RAW, Some(proto))?),
        };
        socket.set_nonblocking(true)?;

        // recv_from/send_to on a UdpSocket are plain recvfrom/sendto calls,
        // which is all an ICMP socket needs.
        let std_sock = std::net::UdpSocket::from(socket);

        Ok(Self {
            inner: Arc::new(AsyncFd::with_interest(
                std_sock,
                Interest::READABLE | Interest::WRITABLE,
            )?),
            sock_type,
        })
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| inner.get_ref().recv_from(buf)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    pub async fn send_to(&self, buf: &[u8], target: &SocketAddr) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.writable().await?;
            match guard.try_io(|inner| inner.get_ref().send_to(buf, target)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    pub fn sock_type(&self) -> Type {
        self.sock_type
    }
}

/// Identifies an outstanding echo. The identifier is `None` on DGRAM
/// sockets, where the kernel rewrites it.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct ReplyToken(pub IpAddr, pub Option<u16>, pub u16);

#[derive(Debug)]
pub struct Reply {
    pub received_at: Instant,
    pub packet: IcmpPacket,
}

#[derive(Clone, Default)]
struct ReplyMap {
    inner: Arc<Mutex<HashMap<ReplyToken, oneshot::Sender<Reply>>>>,
}

impl ReplyMap {
    fn insert(&self, token: ReplyToken) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(token, tx);
        rx
    }

    fn remove(&self, token: &ReplyToken) {
        self.inner.lock().remove(token);
    }

    fn dispatch(&self, token: &ReplyToken, reply: Reply) -> bool {
        match self.inner.lock().remove(token) {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Registered interest in one reply. Dropping it, e.g. on timeout or when
/// the probe is cancelled, removes the registration.
pub struct Waiter {
    token: ReplyToken,
    map: ReplyMap,
    rx: oneshot::Receiver<Reply>,
}

impl Waiter {
    pub async fn recv(&mut self) -> Option<Reply> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.map.remove(&self.token);
    }
}

/// One socket per address family plus a task routing replies to waiters.
pub struct IcmpClient {
    socket: AsyncSocket,
    v6: bool,
    reply_map: ReplyMap,
    recv_task: JoinHandle<()>,
}

impl IcmpClient {
    pub fn new(v6: bool) -> io::Result<Self> {
        let socket = AsyncSocket::new(v6)?;
        let reply_map = ReplyMap::default();

        let recv_task = task::spawn(receive_loop(socket.clone(), reply_map.clone(), v6));

        Ok(Self {
            socket,
            v6,
            reply_map,
            recv_task,
        })
    }

    pub fn socket(&self) -> &AsyncSocket {
        &self.socket
    }

    pub fn is_v6(&self) -> bool {
        self.v6
    }

    /// Identifier used for matching replies on this client's socket type.
    pub fn reply_ident(&self, ident: u16) -> Option<u16> {
        if self.socket.sock_type() == Type::DGRAM {
            None
        } else {
            Some(ident)
        }
    }

    pub fn register(&self, token: ReplyToken) -> Waiter {
        let rx = self.reply_map.insert(token);
        Waiter {
            token,
            map: self.reply_map.clone(),
            rx,
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.reply_map.len()
    }
}

impl Drop for IcmpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn receive_loop(socket: AsyncSocket, reply_map: ReplyMap, v6: bool) {
    let mut buf = [0u8; 2048];
    loop {
        let (size, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                debug!(error = %e, "icmp receive failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let received_at = Instant::now();

        let icmp_bytes = if v6 { &buf[..size] } else { strip_ipv4_header(&buf[..size]) };
        let Ok(packet) = IcmpPacket::decode(icmp_bytes) else {
            continue;
        };
        if !packet.is_echo_reply(v6) {
            continue;
        }

        let ident = if socket.sock_type() == Type::DGRAM {
            None
        } else {
            Some(packet.identifier)
        };
        let token = ReplyToken(addr.ip(), ident, packet.sequence);
        reply_map.dispatch(&token, Reply { received_at, packet });
    }
}

/// RAW sockets, and DGRAM sockets on some platforms, deliver the IPv4
/// header in front of the ICMP message.
fn strip_ipv4_header(data: &[u8]) -> &[u8] {
    if data.len() >= 20 && (data[0] >> 4) == 4 {
        let ihl = (data[0] & 0x0f) as usize * 4;
        if data.len() >= ihl {
            return &data[ihl..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_strip_ipv4_header() {
        let mut datagram = vec![0x45, 0, 0, 28, 0, 0, 0, 0, 64, 1, 0, 0, 8, 8, 8, 8, 10, 0, 0, 1];
        datagram.extend_from_slice(&[0, 0, 0, 0, 0, 1, 0, 2]);
        assert_eq!(strip_ipv4_header(&datagram), &[0, 0, 0, 0, 0, 1, 0, 2]);

        // a bare ICMP reply is left alone
        let bare = [0u8, 0, 0xff, 0xff, 0, 1, 0, 2];
        assert_eq!(strip_ipv4_header(&bare), &bare);
    }

    #[test]
    fn test_reply_map_dispatch() {
        let map = ReplyMap::default();
        let token = ReplyToken(IpAddr::V4(Ipv4Addr::LOCALHOST), None, 9);
        let mut rx = map.insert(token);

        let other = ReplyToken(IpAddr::V4(Ipv4Addr::LOCALHOST), None, 10);
        let reply = || Reply {
            received_at: Instant::now(),
            packet: IcmpPacket::echo_request(false, 0, 9, vec![]),
        };
        assert!(!map.dispatch(&other, reply()));
        assert!(map.dispatch(&token, reply()));
        assert_eq!(rx.try_recv().unwrap().packet.sequence, 9);
        assert_eq!(map.len(), 0);
    }

    #[tokio::test]
    async fn test_dropped_waiter_unregisters() {
        // Socket creation needs either ping_group_range or CAP_NET_RAW.
        let Ok(client) = IcmpClient::new(false) else {
            return;
        };
        let token = ReplyToken(IpAddr::V4(Ipv4Addr::LOCALHOST), client.reply_ident(1), 1);
        let waiter = client.register(token);
        assert_eq!(client.pending(), 1);
        drop(waiter);
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn test_socket_registers_with_runtime() {
        let Ok(socket) = AsyncSocket::new(false) else {
            return;
        };
        let sock_type = socket.sock_type();
        assert!(sock_type == Type::DGRAM || sock_type == Type::RAW);

        // write readiness comes from the registration
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let request = IcmpPacket::echo_request(false, 1, 1, vec![0; 8]).encode();
        assert_eq!(socket.send_to(&request, &target).await.unwrap(), request.len());
    }
}
