//! TCP session transport (C5): host accept loop + per-peer send/receive
//! tasks, and the guest's dial/bootstrap/receive-only counterpart.
//!
//! Both roles hand their receive loop direct access to the shared document
//! and remote-cursor registry, rather than bouncing decoded ops through
//! `net` → `editor` → back into a lock: the concurrency model (see the crate
//! root and `rga`'s docs) already specifies these as the two locks a receive
//! task acquires, so there is nothing for an intermediate layer to add.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rga::{Document, Operation, RemoteCursorRegistry};
use tokio::net::{TcpListener, TcpStream};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, Mutex, RwLock};

use protocol::{CodecError, Snapshot, WireOp};

use crate::error::TransportError;

pub type SharedDocument = Arc<Mutex<Document>>;
pub type SharedRegistry = Arc<RwLock<RemoteCursorRegistry>>;

type ClientId = u64;

/// The host's per-client outbound channel map, as returned by
/// [`Host::clients`] — exposed so a caller that generates a local op itself
/// (the host has no incoming socket to read its own edits from) can fan it
/// out the same way the receive loop relays everyone else's.
pub type ClientMap = Arc<Mutex<HashMap<ClientId, mpsc::UnboundedSender<WireOp>>>>;

/// Applies a decoded wire op to whichever shared state it targets: the
/// document (`Insert`/`Delete`) or the remote-cursor registry (`Move`) —
/// the locking split the open questions in the design notes resolve.
async fn apply_wire_op(
    doc: &SharedDocument,
    registry: &SharedRegistry,
    wire: &WireOp,
) -> Result<Operation, CodecError> {
    let op = Operation::try_from(wire.clone())?;
    match &op {
        Operation::Move { site, position } => {
            registry.write().await.record_move(site.clone(), *position);
        }
        _ => {
            doc.lock().await.apply_remote(&op);
        }
    }
    Ok(op)
}

/// The host side of a session: owns the TCP listener and the set of
/// connected guests' outbound channels.
pub struct Host {
    tcp_port: u16,
    listener: TcpListener,
    clients: ClientMap,
    next_client_id: AtomicU64,
}

impl Host {
    /// Binds an ephemeral TCP port on every interface.
    pub async fn bind() -> Result<Self, TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", 0)).await?;
        let tcp_port = listener.local_addr()?.port();
        Ok(Host {
            tcp_port,
            listener,
            clients: Arc::new(Mutex::new(HashMap::new())),
            next_client_id: AtomicU64::new(0),
        })
    }

    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    /// Session name derived from the bound port, carried over from the
    /// original prototype's `Session-<port>` naming (see DESIGN.md).
    pub fn session_name(&self) -> String {
        format!("Session-{}", self.tcp_port)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Exposes the client-channel map directly so a caller that generated a
    /// local op itself (the host has no incoming socket to read its own
    /// edits from) can fan it out the same way `host_receive_loop` does.
    pub fn clients(&self) -> ClientMap {
        self.clients.clone()
    }

    /// Accepts connections until `quit` is set. For each: sends the current
    /// document as a snapshot, then spawns a write task (draining the
    /// client's outbound channel) and a receive task (applying incoming ops
    /// and relaying them to every other connected client).
    pub async fn accept_loop(
        self,
        doc: SharedDocument,
        registry: SharedRegistry,
        changes: mpsc::Sender<()>,
        read_deadline: Duration,
        quit: Arc<AtomicBool>,
    ) {
        let Host {
            tcp_port: _,
            listener,
            clients,
            next_client_id,
        } = self;

        loop {
            if quit.load(Ordering::Relaxed) {
                break;
            }

            let (stream, peer_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(%err, "failed to accept connection");
                    continue;
                }
            };

            let client_id = next_client_id.fetch_add(1, Ordering::Relaxed);
            let (read_half, mut write_half) = stream.into_split();

            let snapshot = {
                let doc_guard = doc.lock().await;
                let reg_guard = registry.read().await;
                Snapshot::capture(&doc_guard, &reg_guard)
            };
            if let Err(err) = protocol::write_snapshot(&mut write_half, &snapshot).await {
                tracing::warn!(%err, peer = %peer_addr, "failed to send snapshot to new peer");
                continue;
            }

            let (tx, rx) = mpsc::unbounded_channel::<WireOp>();
            clients.lock().await.insert(client_id, tx);

            tokio::spawn(write_task(write_half, rx));
            tokio::spawn(host_receive_loop(
                client_id,
                read_half,
                doc.clone(),
                registry.clone(),
                clients.clone(),
                changes.clone(),
                read_deadline,
                quit.clone(),
            ));

            tracing::info!(client_id, peer = %peer_addr, "peer connected");
        }
    }
}

async fn write_task(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<WireOp>) {
    while let Some(op) = rx.recv().await {
        if let Err(err) = protocol::write_op(&mut write_half, &op).await {
            tracing::warn!(%err, "failed to send operation to peer");
            break;
        }
    }
}

/// Reads one length-prefixed operation frame from `read_half`, checking
/// `quit` every `read_deadline` without cancelling a read already in
/// flight. `protocol::read_op` issues `read_u32` then `read_exact` for the
/// body — neither step is cancellation-safe, so wrapping the whole call in
/// `tokio::time::timeout` and re-issuing it on every tick would, if the
/// deadline lands between the two steps, drop the bytes already read off
/// the socket and desync the stream for every frame after it. Polling the
/// same pinned future across loop iterations instead means the deadline
/// only ever interrupts the *wait* for the next frame, never a frame
/// that's partway through being read. Returns `None` once `quit` is
/// observed with no frame pending.
async fn read_op_until_quit(
    read_half: &mut OwnedReadHalf,
    read_deadline: Duration,
    quit: &AtomicBool,
) -> Option<Result<WireOp, CodecError>> {
    let op_fut = protocol::read_op(read_half);
    tokio::pin!(op_fut);
    loop {
        tokio::select! {
            result = &mut op_fut => return Some(result),
            _ = tokio::time::sleep(read_deadline) => {
                if quit.load(Ordering::Relaxed) {
                    return None;
                }
            }
        }
    }
}

async fn host_receive_loop(
    client_id: ClientId,
    mut read_half: OwnedReadHalf,
    doc: SharedDocument,
    registry: SharedRegistry,
    clients: ClientMap,
    changes: mpsc::Sender<()>,
    read_deadline: Duration,
    quit: Arc<AtomicBool>,
) {
    loop {
        if quit.load(Ordering::Relaxed) {
            break;
        }

        match read_op_until_quit(&mut read_half, read_deadline, quit.as_ref()).await {
            None => break, // quit requested while waiting for the next frame
            Some(Err(CodecError::Io(_))) => break, // peer disconnected
            Some(Err(err)) => {
                tracing::debug!(%err, "dropping malformed operation frame");
                continue;
            }
            Some(Ok(wire)) => match apply_wire_op(&doc, &registry, &wire).await {
                Ok(_) => {
                    let _ = changes.try_send(());
                    let targets = clients.lock().await;
                    for (id, sender) in targets.iter() {
                        if *id != client_id {
                            let _ = sender.send(wire.clone());
                        }
                    }
                }
                Err(err) => tracing::debug!(%err, "dropping operation with invalid wire shape"),
            },
        }
    }

    clients.lock().await.remove(&client_id);
    tracing::info!(client_id, "peer disconnected");
}

/// The guest side of a session: a channel to send locally-generated ops to
/// the host, and a handle to the spawned receive loop so the caller can
/// notice when the connection to the host is lost.
pub struct Guest {
    op_tx: mpsc::UnboundedSender<WireOp>,
    pub receive_task: tokio::task::JoinHandle<()>,
}

impl Guest {
    /// Sends a locally-generated op to the host. Silently dropped if the
    /// connection is already gone — per the design, local edits keep
    /// mutating the guest's own document even after the host disappears.
    pub fn send(&self, op: &Operation) {
        let _ = self.op_tx.send(WireOp::from(op));
    }

    pub fn is_connected(&self) -> bool {
        !self.receive_task.is_finished()
    }
}

/// Dials `addr`, bootstraps `doc`/`registry` from the host's snapshot
/// (verifying its checksum), and spawns the send/receive tasks.
pub async fn connect(
    addr: SocketAddr,
    doc: SharedDocument,
    registry: SharedRegistry,
    local_site: String,
    changes: mpsc::Sender<()>,
    read_deadline: Duration,
    quit: Arc<AtomicBool>,
) -> Result<Guest, TransportError> {
    let stream = TcpStream::connect(addr).await?;
    let (mut read_half, write_half) = stream.into_split();

    let snapshot = protocol::read_snapshot(&mut read_half).await?;
    snapshot
        .verify_checksum()
        .map_err(|_| TransportError::ChecksumMismatch)?;

    {
        let mut doc_guard = doc.lock().await;
        *doc_guard = Document::from_elements(local_site, 0, snapshot.elements);
    }
    {
        let mut reg_guard = registry.write().await;
        for cursor in &snapshot.remote_cursors {
            reg_guard.record_move(cursor.site.clone(), cursor.position);
        }
    }

    let (tx, rx) = mpsc::unbounded_channel::<WireOp>();
    tokio::spawn(write_task(write_half, rx));

    let receive_task = tokio::spawn(async move {
        guest_receive_loop(read_half, doc, registry, changes, read_deadline, quit).await;
        tracing::warn!("lost connection to host");
    });

    Ok(Guest {
        op_tx: tx,
        receive_task,
    })
}

async fn guest_receive_loop(
    mut read_half: OwnedReadHalf,
    doc: SharedDocument,
    registry: SharedRegistry,
    changes: mpsc::Sender<()>,
    read_deadline: Duration,
    quit: Arc<AtomicBool>,
) {
    loop {
        if quit.load(Ordering::Relaxed) {
            break;
        }

        match read_op_until_quit(&mut read_half, read_deadline, quit.as_ref()).await {
            None => break,
            Some(Err(CodecError::Io(_))) => break,
            Some(Err(err)) => {
                tracing::debug!(%err, "dropping malformed operation frame");
                continue;
            }
            Some(Ok(wire)) => match apply_wire_op(&doc, &registry, &wire).await {
                Ok(_) => {
                    let _ = changes.try_send(());
                }
                Err(err) => tracing::debug!(%err, "dropping operation with invalid wire shape"),
            },
        }
    }
}
