//! Periodic discovery announcements over UDP broadcast
//!
//! A coordinator advertises itself by sending a small announcement
//! datagram to the local broadcast address once per interval. The
//! announcement source is re-evaluated on every send so the advertised
//! participant counts stay current.

use log::warn;
use shared::wire::{self, Announcement};
use shared::MAX_DATAGRAM_BYTES;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub struct Broadcaster {
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Broadcaster {
    /// Starts announcing to the limited broadcast address on `port`.
    pub async fn start<F, Fut>(port: u16, source: F, interval: Duration) -> io::Result<Self>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Announcement> + Send,
    {
        Self::start_to(SocketAddr::from((Ipv4Addr::BROADCAST, port)), source, interval).await
    }

    /// Starts announcing to one explicit target instead of the
    /// broadcast address (a directed announce).
    pub async fn start_to<F, Fut>(
        target: SocketAddr,
        source: F,
        interval: Duration,
    ) -> io::Result<Self>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Announcement> + Send,
    {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            loop {
                let payload = wire::encode_announcement(&source().await);
                if payload.len() >= MAX_DATAGRAM_BYTES {
                    warn!(
                        "Announcement payload too large ({} bytes), dropped",
                        payload.len()
                    );
                } else if let Err(e) = socket.send_to(payload.as_bytes(), target).await {
                    warn!("Failed to send announcement to {}: {}", target, e);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(interval) => {}
                }
            }
        });

        Ok(Broadcaster {
            shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Signals the send loop and waits for it to exit.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
