//! Participant-side networking: joining a coordinator and keeping
//! progress synchronized in the background.

use log::{info, warn};
use shared::wire;
use shared::Request;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Default cadence for the background progress exchange.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// How long one request/response exchange may take end to end.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    /// The coordinator is unreachable, refused the connection, or the
    /// exchange timed out. Fatal only to this operation.
    #[error("connection failed: {0}")]
    Connection(#[from] io::Error),

    /// The session has no free slot; this coordinator cannot be
    /// joined for the rest of its run.
    #[error("session is full")]
    SessionFull,

    /// The coordinator answered with something the protocol does not
    /// allow.
    #[error("malformed coordinator response: {0:?}")]
    MalformedResponse(String),
}

/// Fields shared between the caller and the sync loop. Each lock is
/// held only long enough to copy one value in or out.
struct SyncState {
    pending_progress: Mutex<u32>,
    latest_snapshot: Mutex<Vec<u32>>,
}

/// A joined participant's view of the session.
///
/// The presentation layer pushes keystrokes through
/// [`Client::submit_local_progress`] and pulls the latest standings
/// with [`Client::latest_snapshot`]; the background loop started by
/// [`Client::start_sync_loop`] does all the network traffic.
pub struct Client {
    coordinator_addr: SocketAddr,
    participant_id: u32,
    sync_state: Arc<SyncState>,
    shutdown_tx: broadcast::Sender<()>,
    sync_handle: Option<JoinHandle<()>>,
}

impl Client {
    /// Joins the coordinator at `addr`. A full session and an
    /// unreachable coordinator are distinct errors so the caller can
    /// present the right message. Joining twice yields two identities;
    /// there is no resume.
    pub async fn connect_and_join(addr: SocketAddr) -> Result<Self, ClientError> {
        let body = request(addr, &Request::Join).await?;
        let text = String::from_utf8_lossy(&body);
        let id: i32 = text
            .trim()
            .parse()
            .map_err(|_| ClientError::MalformedResponse(text.to_string()))?;
        if id < 0 {
            return Err(ClientError::SessionFull);
        }

        info!("Joined coordinator {} as participant {}", addr, id);
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Client {
            coordinator_addr: addr,
            participant_id: id as u32,
            sync_state: Arc::new(SyncState {
                pending_progress: Mutex::new(0),
                latest_snapshot: Mutex::new(Vec::new()),
            }),
            shutdown_tx,
            sync_handle: None,
        })
    }

    pub fn participant_id(&self) -> u32 {
        self.participant_id
    }

    /// Fetches the session's shared passage.
    pub async fn fetch_shared_text(&self) -> Result<String, ClientError> {
        let body = request(self.coordinator_addr, &Request::FetchText).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Records the progress value the next sync tick will send.
    /// Performs no I/O; safe to call per keystroke.
    pub fn submit_local_progress(&self, progress: u32) {
        *self.sync_state.pending_progress.lock().unwrap() = progress;
    }

    /// Copy of the most recently received snapshot, indexed by
    /// participant identity. Never blocks on the network; safe to call
    /// per frame.
    pub fn latest_snapshot(&self) -> Vec<u32> {
        self.sync_state.latest_snapshot.lock().unwrap().clone()
    }

    /// One immediate submit-progress exchange: sends the pending local
    /// progress and stores (and returns) the snapshot that came back.
    pub async fn sync_now(&self) -> Result<Vec<u32>, ClientError> {
        sync_tick(self.coordinator_addr, self.participant_id, &self.sync_state).await
    }

    /// Starts the background sync loop. Each tick performs one
    /// submit-progress exchange; a failed tick is logged and the loop
    /// carries on. Starting an already-running loop is a no-op.
    pub fn start_sync_loop(&mut self, interval: Duration) {
        if self.sync_handle.is_some() {
            return;
        }

        let addr = self.coordinator_addr;
        let id = self.participant_id;
        let sync_state = Arc::clone(&self.sync_state);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.sync_handle = Some(tokio::spawn(async move {
            loop {
                if let Err(e) = sync_tick(addr, id, &sync_state).await {
                    warn!("Progress sync tick failed: {}", e);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(interval) => {}
                }
            }
        }));
    }

    /// Signals the sync loop and waits for it to exit. A tick already
    /// in flight finishes first; once this returns, no further
    /// snapshot update can occur.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.sync_handle.take() {
            let _ = handle.await;
        }
    }
}

async fn sync_tick(
    addr: SocketAddr,
    id: u32,
    sync_state: &SyncState,
) -> Result<Vec<u32>, ClientError> {
    let progress = *sync_state.pending_progress.lock().unwrap();
    let body = request(addr, &Request::SubmitProgress { id, progress }).await?;
    let text = String::from_utf8_lossy(&body);
    let snapshot = wire::decode_snapshot(&text)
        .ok_or_else(|| ClientError::MalformedResponse(text.to_string()))?;
    *sync_state.latest_snapshot.lock().unwrap() = snapshot.clone();
    Ok(snapshot)
}

/// One request/response exchange: connect, send the request line,
/// half-close, read the response until the coordinator closes.
async fn request(addr: SocketAddr, request: &Request) -> Result<Vec<u8>, ClientError> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(request.encode().as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await?;
        io::Result::Ok(body)
    };

    match timeout(REQUEST_TIMEOUT, exchange).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::Connection(io::Error::new(
            io::ErrorKind::TimedOut,
            "request timed out",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_unreachable_coordinator_is_a_connection_error() {
        // A port nothing listens on.
        let unreachable: SocketAddr = "127.0.0.1:1".parse().unwrap();

        match Client::connect_and_join(unreachable).await {
            Err(ClientError::Connection(_)) => {}
            other => panic!("expected a connection error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn error_messages_distinguish_full_from_unreachable() {
        let full = ClientError::SessionFull.to_string();
        let refused = ClientError::Connection(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))
        .to_string();

        assert!(full.contains("full"));
        assert!(refused.contains("connection failed"));
        assert_ne!(full, refused);
    }
}
