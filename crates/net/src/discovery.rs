//! UDP LAN session discovery (C4): periodic broadcast announce, a listener
//! that upserts discovered sessions into a shared directory, and the
//! directory itself.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;

/// A session as advertised by a peer's announce loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub name: String,
    pub addr: SocketAddr,
    pub udp_port: u16,
}

/// Mapping from session name to descriptor, guarded by a mutex shared
/// between the listener (writer) and the UI's refresh path (reader).
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: Mutex<HashMap<String, SessionDescriptor>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        SessionDirectory::default()
    }

    pub async fn upsert(&self, descriptor: SessionDescriptor) {
        self.sessions
            .lock()
            .await
            .insert(descriptor.name.clone(), descriptor);
    }

    pub async fn get(&self, name: &str) -> Option<SessionDescriptor> {
        self.sessions.lock().await.get(name).cloned()
    }

    pub async fn snapshot(&self) -> Vec<SessionDescriptor> {
        self.sessions.lock().await.values().cloned().collect()
    }
}

/// Finds the local IPv4 address used to route outbound traffic, via the
/// well-known "UDP connect trick": bind a socket, `connect` it to an
/// arbitrary external address (no packet is actually sent), then read back
/// the address the kernel chose. No interface-enumeration crate is grounded
/// anywhere in this codebase's dependency pack, so this is the simplification
/// used in place of one (see DESIGN.md).
fn local_ipv4() -> std::io::Result<Ipv4Addr> {
    let probe = std::net::UdpSocket::bind("0.0.0.0:0")?;
    probe.connect("8.8.8.8:80")?;
    match probe.local_addr()?.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(_) => Ok(Ipv4Addr::LOCALHOST),
    }
}

/// Broadcast address for `local`, assuming a /24 netmask — the other half of
/// the simplification above; a real implementation would read the
/// interface's actual netmask.
fn broadcast_addr(local: Ipv4Addr) -> Ipv4Addr {
    let o = local.octets();
    Ipv4Addr::new(o[0], o[1], o[2], 255)
}

/// Broadcasts `SESSION|<name>|<tcp_port>|<udp_port>` on every port in
/// `config.port_range`, every `config.announce_interval`, until `quit` is
/// set.
pub async fn announce_loop(
    session_name: &str,
    tcp_port: u16,
    udp_port: u16,
    config: &DiscoveryConfig,
    quit: Arc<AtomicBool>,
) -> Result<(), DiscoveryError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    let broadcast = broadcast_addr(local_ipv4()?);
    let message = format!("SESSION|{session_name}|{tcp_port}|{udp_port}");

    while !quit.load(Ordering::Relaxed) {
        for port in config.port_range.start..=config.port_range.end {
            let dest = SocketAddr::new(IpAddr::V4(broadcast), port);
            if let Err(err) = socket.send_to(message.as_bytes(), dest).await {
                tracing::warn!(%err, port, "failed to send discovery announce");
            }
        }
        tokio::time::sleep(config.announce_interval).await;
    }
    Ok(())
}

/// Binds a UDP listen socket within `config.port_range`, retrying up to
/// `config.bind_attempts` times, and returns it together with the port it
/// landed on. Split out from [`listen_loop`] so a caller that needs to
/// advertise its own listen port (the announce loop embeds it in every
/// datagram) can learn it before the blocking receive loop starts — the same
/// reason `Host::bind` returns its TCP port synchronously before
/// `accept_loop` is spawned.
pub async fn bind_listener(config: &DiscoveryConfig) -> Result<(UdpSocket, u16), DiscoveryError> {
    bind_in_range(config).await
}

/// Runs the receive side of discovery on an already-bound `socket`: upserts
/// every well-formed, non-self `SESSION|...` datagram into `directory` until
/// `quit` is set.
pub async fn run_listener(
    socket: UdpSocket,
    local_udp_port: u16,
    directory: Arc<SessionDirectory>,
    quit: Arc<AtomicBool>,
) {
    let local = local_ipv4().unwrap_or(Ipv4Addr::LOCALHOST);

    let mut buf = [0u8; 1024];
    while !quit.load(Ordering::Relaxed) {
        let received =
            tokio::time::timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await;
        let (len, from) = match received {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                tracing::warn!(%err, "discovery recv failed");
                continue;
            }
            Err(_) => continue, // timeout: recheck quit and loop
        };

        let datagram = String::from_utf8_lossy(&buf[..len]);
        match parse_datagram(&datagram) {
            Some((name, tcp_port, udp_port)) => {
                if is_self_echo(from, local, local_udp_port, udp_port) {
                    continue;
                }
                directory
                    .upsert(SessionDescriptor {
                        name,
                        addr: SocketAddr::new(from.ip(), tcp_port),
                        udp_port,
                    })
                    .await;
            }
            None => {
                tracing::debug!(datagram = %datagram, "dropping malformed discovery datagram");
            }
        }
    }
}

/// Binds within `config.port_range` and runs [`run_listener`] on the result,
/// for callers that don't need the port before the loop starts.
pub async fn listen_loop(
    directory: Arc<SessionDirectory>,
    config: &DiscoveryConfig,
    quit: Arc<AtomicBool>,
) -> Result<u16, DiscoveryError> {
    let (socket, local_udp_port) = bind_listener(config).await?;
    run_listener(socket, local_udp_port, directory, quit).await;
    Ok(local_udp_port)
}

async fn bind_in_range(config: &DiscoveryConfig) -> Result<(UdpSocket, u16), DiscoveryError> {
    let mut rng = rand::thread_rng();
    for _ in 0..config.bind_attempts {
        let port = rng.gen_range(config.port_range.start..=config.port_range.end);
        if let Ok(socket) = UdpSocket::bind(("0.0.0.0", port)).await {
            return Ok((socket, port));
        }
    }
    Err(DiscoveryError::PortRangeExhausted {
        attempts: config.bind_attempts,
        start: config.port_range.start,
        end: config.port_range.end,
    })
}

fn is_self_echo(from: SocketAddr, local: Ipv4Addr, local_udp_port: u16, msg_udp_port: u16) -> bool {
    from.ip() == IpAddr::V4(local) && msg_udp_port == local_udp_port
}

fn parse_datagram(s: &str) -> Option<(String, u16, u16)> {
    let parts: Vec<&str> = s.trim().split('|').collect();
    if parts.len() != 4 || parts[0] != "SESSION" {
        return None;
    }
    let name = parts[1].to_string();
    let tcp_port = parts[2].parse().ok()?;
    let udp_port = parts[3].parse().ok()?;
    Some((name, tcp_port, udp_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_datagram() {
        let (name, tcp_port, udp_port) = parse_datagram("SESSION|Session-4242|4242|12340").unwrap();
        assert_eq!(name, "Session-4242");
        assert_eq!(tcp_port, 4242);
        assert_eq!(udp_port, 12340);
    }

    #[test]
    fn rejects_a_datagram_with_the_wrong_field_count() {
        assert!(parse_datagram("SESSION|only|three").is_none());
    }

    #[test]
    fn rejects_a_datagram_with_the_wrong_leading_tag() {
        assert!(parse_datagram("OTHER|name|1|2").is_none());
    }

    #[test]
    fn rejects_non_numeric_ports() {
        assert!(parse_datagram("SESSION|name|abc|2").is_none());
    }

    #[test]
    fn broadcast_address_assumes_a_slash_24() {
        assert_eq!(
            broadcast_addr(Ipv4Addr::new(192, 168, 1, 42)),
            Ipv4Addr::new(192, 168, 1, 255)
        );
    }

    #[test]
    fn a_datagram_from_our_own_address_and_port_is_a_self_echo() {
        let local = Ipv4Addr::new(192, 168, 1, 5);
        let from = SocketAddr::new(IpAddr::V4(local), 12345);
        assert!(is_self_echo(from, local, 12345, 12345));
        assert!(!is_self_echo(from, local, 12345, 12346));
    }

    #[tokio::test]
    async fn directory_upsert_then_get_round_trips() {
        let dir = SessionDirectory::new();
        let descriptor = SessionDescriptor {
            name: "Session-1".into(),
            addr: "127.0.0.1:9000".parse().unwrap(),
            udp_port: 12340,
        };
        dir.upsert(descriptor.clone()).await;
        assert_eq!(dir.get("Session-1").await, Some(descriptor));
        assert_eq!(dir.snapshot().await.len(), 1);
    }
}
