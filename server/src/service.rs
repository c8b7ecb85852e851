//! Coordinator control channel
//!
//! Accepts participant connections and serves the three request types:
//! join, fetch-text, and submit-progress. Each connection carries
//! exactly one exchange: a request line in, raw response bytes out,
//! then the connection closes.

use crate::state::SessionState;
use log::{debug, error, info, warn};
use shared::wire;
use shared::{Request, SESSION_FULL_SENTINEL};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// How long a connected participant gets to send its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// The coordinator's request/response service.
///
/// An accept loop runs as a background task and hands every accepted
/// connection to its own short-lived handler task. Correctness under
/// concurrent requests rests entirely on the session-state lock, which
/// is held only across an individual read or mutation and never across
/// socket I/O.
pub struct Coordinator {
    state: Arc<RwLock<SessionState>>,
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    accept_handle: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Binds the control port and starts serving requests.
    pub async fn start(bind_addr: &str, text: String, capacity: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Coordinator listening on {}", local_addr);

        let state = Arc::new(RwLock::new(SessionState::new(text, capacity)));
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let accept_state = Arc::clone(&state);
        let accept_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let state = Arc::clone(&accept_state);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, state).await {
                                    debug!("Request from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept failed: {}", e);
                            sleep(Duration::from_millis(10)).await;
                        }
                    },
                }
            }
        });

        Ok(Coordinator {
            state,
            local_addr,
            shutdown_tx,
            accept_handle: Some(accept_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared handle to the session state, used to keep discovery
    /// announcements current.
    pub fn state(&self) -> Arc<RwLock<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Stops accepting connections and waits for the accept loop to
    /// exit. Exchanges already in flight are allowed to finish.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.await;
        }
    }
}

/// Serves one connection. Unparseable requests are dropped without a
/// response; a peer that sends garbage must not take the session down.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<RwLock<SessionState>>,
) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    match timeout(REQUEST_READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(read) => {
            read?;
        }
        Err(_) => {
            debug!("{} sent no request within the read timeout", peer);
            return Ok(());
        }
    }

    let request = match Request::parse(&line) {
        Some(request) => request,
        None => {
            warn!("Dropping unparseable request from {}", peer);
            return Ok(());
        }
    };

    let response = match request {
        Request::Join => {
            let mut session = state.write().await;
            match session.join() {
                Some(id) => id.to_string().into_bytes(),
                None => SESSION_FULL_SENTINEL.to_string().into_bytes(),
            }
        }
        Request::FetchText => state.read().await.text().as_bytes().to_vec(),
        Request::SubmitProgress { id, progress } => {
            // One lock acquisition covers the write and the copy, so
            // the returned snapshot always reflects the caller's own
            // update.
            let mut session = state.write().await;
            session.set_progress(id, progress);
            wire::encode_snapshot(&session.snapshot()).into_bytes()
        }
    };

    write_half.write_all(&response).await?;
    write_half.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio_test::assert_ok;

    async fn raw_request(addr: SocketAddr, line: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
        stream.shutdown().await.unwrap();

        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();
        body
    }

    #[tokio::test]
    async fn join_returns_dense_identities_then_sentinel() {
        let mut coordinator =
            tokio_test::assert_ok!(Coordinator::start("127.0.0.1:0", "abc".to_string(), 2).await);
        let addr = coordinator.local_addr();

        assert_eq!(raw_request(addr, "JOIN").await, "0");
        assert_eq!(raw_request(addr, "JOIN").await, "1");
        assert_eq!(raw_request(addr, "JOIN").await, "-1");

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn fetch_text_returns_the_shared_passage() {
        let mut coordinator =
            Coordinator::start("127.0.0.1:0", "line one\nline two".to_string(), 2)
                .await
                .unwrap();
        let addr = coordinator.local_addr();

        assert_eq!(raw_request(addr, "TEXT").await, "line one\nline two");

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn submit_progress_returns_the_updated_snapshot() {
        let mut coordinator = Coordinator::start("127.0.0.1:0", "abc".to_string(), 2)
            .await
            .unwrap();
        let addr = coordinator.local_addr();

        raw_request(addr, "JOIN").await;
        raw_request(addr, "JOIN").await;

        let body = raw_request(addr, "PROGRESS 0 5").await;
        assert_eq!(wire::decode_snapshot(&body), Some(vec![5, 0]));

        let body = raw_request(addr, "PROGRESS 1 12").await;
        assert_eq!(wire::decode_snapshot(&body), Some(vec![5, 12]));

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn progress_for_unknown_identity_is_ignored_not_fatal() {
        let mut coordinator = Coordinator::start("127.0.0.1:0", "abc".to_string(), 2)
            .await
            .unwrap();
        let addr = coordinator.local_addr();

        raw_request(addr, "JOIN").await;

        let body = raw_request(addr, "PROGRESS 9 99").await;
        assert_eq!(wire::decode_snapshot(&body), Some(vec![0]));

        // The service keeps working afterwards.
        assert_eq!(raw_request(addr, "JOIN").await, "1");

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn unparseable_request_gets_no_response() {
        let mut coordinator = Coordinator::start("127.0.0.1:0", "abc".to_string(), 2)
            .await
            .unwrap();
        let addr = coordinator.local_addr();

        assert_eq!(raw_request(addr, "NONSENSE 1 2 3").await, "");

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn stop_waits_for_the_accept_loop_and_refuses_new_connections() {
        let mut coordinator = Coordinator::start("127.0.0.1:0", "abc".to_string(), 2)
            .await
            .unwrap();
        let addr = coordinator.local_addr();

        coordinator.stop().await;

        let refused = TcpStream::connect(addr).await;
        assert!(refused.is_err());
    }
}
