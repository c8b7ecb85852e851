//! Coordinator discovery
//!
//! Listens for the UDP announcements coordinators broadcast and keeps
//! a deduplicated directory of what has been seen. Discovery shares
//! its port with whatever else broadcasts on the subnet, so anything
//! that fails to parse is discarded without comment.

use log::{debug, warn};
use shared::wire;
use shared::MAX_DATAGRAM_BYTES;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// One coordinator seen via discovery. The IP address comes from the
/// receiving socket, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCoordinator {
    pub ip: IpAddr,
    pub control_port: u16,
    pub label: String,
    pub player_count: usize,
    pub capacity: usize,
}

impl DiscoveredCoordinator {
    fn from_announcement(ip: IpAddr, announce: wire::Announcement) -> Self {
        Self {
            ip,
            control_port: announce.control_port,
            label: announce.label,
            player_count: announce.player_count,
            capacity: announce.capacity,
        }
    }

    /// Address of this coordinator's control channel.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.control_port)
    }
}

/// Directory of discovered coordinators, written by the listener
/// callback and read by the UI under its own lock. Entries are keyed
/// by `(ip, control_port)`; a repeat announcement replaces the stored
/// entry so advertised counts stay current.
#[derive(Clone, Default)]
pub struct CoordinatorDirectory {
    entries: Arc<Mutex<Vec<DiscoveredCoordinator>>>,
}

impl CoordinatorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, found: DiscoveredCoordinator) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.ip == found.ip && entry.control_port == found.control_port {
                *entry = found;
                return;
            }
        }
        entries.push(found);
    }

    pub fn entries(&self) -> Vec<DiscoveredCoordinator> {
        self.entries.lock().unwrap().clone()
    }

    /// Forgets every entry, e.g. when leaving the lobby browser.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background receiver for coordinator announcements.
pub struct Listener {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Binds the discovery port and starts the receive loop. Every
    /// parseable announcement is handed to `on_discovered` together
    /// with the sender address reported by the socket; everything else
    /// is dropped. The receive wait is bounded by `poll_timeout` so
    /// `stop` is always observed promptly.
    pub async fn start<F>(port: u16, on_discovered: F, poll_timeout: Duration) -> io::Result<Self>
    where
        F: Fn(DiscoveredCoordinator) + Send + 'static,
    {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        let local_addr = socket.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_BYTES];
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    received = timeout(poll_timeout, socket.recv_from(&mut buffer)) => match received {
                        Ok(Ok((len, src))) => {
                            let msg = String::from_utf8_lossy(&buffer[..len]);
                            match wire::parse_announcement(&msg) {
                                Some(announce) => on_discovered(
                                    DiscoveredCoordinator::from_announcement(src.ip(), announce),
                                ),
                                None => debug!("Ignoring unrelated datagram from {}", src),
                            }
                        }
                        Ok(Err(e)) => {
                            warn!("Discovery receive error: {}", e);
                            sleep(Duration::from_millis(10)).await;
                        }
                        // Receive timeout; go around and re-check shutdown.
                        Err(_) => {}
                    },
                }
            }
        });

        Ok(Listener {
            local_addr,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the receive loop and waits for it to exit.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn coordinator(ip: &str, port: u16, player_count: usize) -> DiscoveredCoordinator {
        DiscoveredCoordinator {
            ip: ip.parse().unwrap(),
            control_port: port,
            label: "Room".to_string(),
            player_count,
            capacity: 4,
        }
    }

    #[test]
    fn repeat_announcements_update_the_entry_in_place() {
        let directory = CoordinatorDirectory::new();

        directory.record(coordinator("192.168.1.10", 25565, 1));
        directory.record(coordinator("192.168.1.10", 25565, 3));

        let entries = directory.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].player_count, 3);
    }

    #[test]
    fn distinct_coordinators_get_distinct_entries() {
        let directory = CoordinatorDirectory::new();

        directory.record(coordinator("192.168.1.10", 25565, 1));
        directory.record(coordinator("192.168.1.10", 25570, 2));
        directory.record(coordinator("192.168.1.11", 25565, 0));

        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn clear_forgets_everything() {
        let directory = CoordinatorDirectory::new();
        directory.record(coordinator("192.168.1.10", 25565, 1));

        directory.clear();

        assert!(directory.is_empty());
        assert_eq!(directory.entries(), vec![]);
    }

    #[test]
    fn control_addr_combines_ip_and_port() {
        let found = coordinator("192.168.1.10", 25565, 1);
        assert_eq!(found.control_addr().to_string(), "192.168.1.10:25565");
    }

    #[tokio::test]
    async fn listener_starts_on_an_ephemeral_port_and_stops_cleanly() {
        let mut listener =
            tokio_test::assert_ok!(Listener::start(0, |_| {}, Duration::from_millis(20)).await);
        assert_ne!(listener.local_addr().port(), 0);

        listener.stop().await;
        assert!(listener.handle.is_none());
    }
}
