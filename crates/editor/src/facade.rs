//! The Editor Facade (C6): the one object a UI drives. It owns the RGA
//! document and remote cursor registry, translates edit intents into CRDT
//! ops, fans each op out over whatever role (`host`/`join`/neither) the
//! session is currently in, and coalesces a change notification onto a
//! bounded channel the UI polls for redraws.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rga::{Document, Operation, RemoteCursor, RemoteCursorRegistry};
use tokio::sync::{mpsc, Mutex, OnceCell, RwLock};
use tokio::task::JoinHandle;

use net::{
    DiscoveryConfig, DiscoveryError, SessionDescriptor, SessionDirectory, SharedDocument,
    SharedRegistry,
};

use crate::error::JoinError;

/// What role this peer is currently playing in its session. A facade starts
/// `Standalone` (no network at all — purely local editing) and moves to
/// `Host` or `Guest` when the UI calls [`Editor::host`]/[`Editor::join`].
///
/// Each active role carries its own cancellation flag and task handles,
/// independent of the editor-wide shutdown flag that only governs the
/// discovery listener. This is what lets `join` tear down a stale
/// connection's receive task before swapping the document out from under it
/// (see the design notes on ownership across join) without disturbing
/// discovery or, if this peer was hosting, without that being possible at
/// the same time — a peer can only be one role at once.
enum Role {
    Standalone,
    Host {
        tcp_port: u16,
        clients: net::ClientMap,
        accept_handle: JoinHandle<()>,
        announce_handle: JoinHandle<Result<(), DiscoveryError>>,
        quit: Arc<AtomicBool>,
    },
    Guest {
        guest: net::Guest,
        quit: Arc<AtomicBool>,
    },
}

impl Role {
    /// Stops whatever tasks this role owns. Aborting rather than waiting on
    /// the cooperative `quit` flag gives `join` a hard guarantee that no
    /// stale receive task is still running when the document gets swapped.
    fn teardown(self) {
        match self {
            Role::Standalone => {}
            Role::Host {
                accept_handle,
                announce_handle,
                quit,
                tcp_port: _,
                clients: _,
            } => {
                quit.store(true, Ordering::Relaxed);
                accept_handle.abort();
                announce_handle.abort();
            }
            Role::Guest { guest, quit } => {
                quit.store(true, Ordering::Relaxed);
                guest.receive_task.abort();
            }
        }
    }
}

pub struct Editor {
    site: String,
    doc: SharedDocument,
    registry: SharedRegistry,
    role: Mutex<Role>,
    changes_tx: mpsc::Sender<()>,
    directory: Arc<SessionDirectory>,
    discovery_config: DiscoveryConfig,
    read_deadline: Duration,
    /// Lazily bound the first time discovery is needed (either because the
    /// UI wants to browse sessions, or because `host()` needs a UDP port to
    /// embed in its announce datagrams) and kept alive for the rest of the
    /// process.
    udp_port: OnceCell<u16>,
    /// Governs only the discovery listener's lifetime, not any role's.
    quit: Arc<AtomicBool>,
}

impl Editor {
    /// Opens a document already containing `initial_text` (as if every
    /// character had been typed in order) and leaves the local caret at
    /// index 0, per the document-open contract in §3. Returns the facade
    /// alongside the change-event receiver the UI should poll.
    pub fn new(site: impl Into<String>, initial_text: &str) -> (Self, mpsc::Receiver<()>) {
        let site = site.into();
        let mut doc = Document::new(site.clone());
        let char_count = initial_text.chars().count();
        for ch in initial_text.chars() {
            doc.local_insert(ch);
        }
        for _ in 0..char_count {
            doc.move_left();
        }

        let (changes_tx, changes_rx) = mpsc::channel(1);

        let editor = Editor {
            site,
            doc: Arc::new(Mutex::new(doc)),
            registry: Arc::new(RwLock::new(RemoteCursorRegistry::new())),
            role: Mutex::new(Role::Standalone),
            changes_tx,
            directory: Arc::new(SessionDirectory::new()),
            discovery_config: DiscoveryConfig::from_env(),
            read_deadline: net::read_deadline(),
            udp_port: OnceCell::new(),
            quit: Arc::new(AtomicBool::new(false)),
        };
        (editor, changes_rx)
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub async fn text(&self) -> String {
        self.doc.lock().await.text()
    }

    pub async fn checksum(&self) -> u32 {
        self.doc.lock().await.checksum()
    }

    pub async fn cursor_visible_index(&self) -> usize {
        self.doc.lock().await.cursor_visible_index()
    }

    pub async fn remote_cursors(&self) -> Vec<(String, RemoteCursor)> {
        self.registry
            .read()
            .await
            .iter()
            .map(|(site, cursor)| (site.clone(), cursor.clone()))
            .collect()
    }

    pub async fn is_host(&self) -> bool {
        matches!(&*self.role.lock().await, Role::Host { .. })
    }

    /// The bound TCP port while hosting, for a caller (tests, or a UI that
    /// wants to display a connect string) that needs it directly rather
    /// than through the discovery directory.
    pub async fn tcp_port(&self) -> Option<u16> {
        match &*self.role.lock().await {
            Role::Host { tcp_port, .. } => Some(*tcp_port),
            _ => None,
        }
    }

    /// `true` only while this peer is a guest whose receive task is still
    /// running; `false` once the host has disappeared (scenario 6 in the
    /// spec's end-to-end list).
    pub async fn is_guest_connected(&self) -> bool {
        match &*self.role.lock().await {
            Role::Guest { guest, .. } => guest.is_connected(),
            _ => false,
        }
    }

    pub async fn available_sessions(&self) -> Vec<SessionDescriptor> {
        self.directory.snapshot().await
    }

    // ---- intents -----------------------------------------------------

    pub async fn insert(&self, ch: char) {
        let (op, move_op) = {
            let mut doc = self.doc.lock().await;
            let op = doc.local_insert(ch);
            let move_op = Operation::Move {
                site: self.site.clone(),
                position: doc.cursor_visible_index(),
            };
            (op, move_op)
        };
        self.fan_out(&op).await;
        self.fan_out(&move_op).await;
        self.publish_change();
    }

    pub async fn delete_back(&self) {
        let outcome = {
            let mut doc = self.doc.lock().await;
            doc.local_delete().map(|op| {
                let move_op = Operation::Move {
                    site: self.site.clone(),
                    position: doc.cursor_visible_index(),
                };
                (op, move_op)
            })
        };
        if let Some((op, move_op)) = outcome {
            self.fan_out(&op).await;
            self.fan_out(&move_op).await;
            self.publish_change();
        }
    }

    pub async fn move_left(&self) {
        self.move_and_emit(Document::move_left).await;
    }

    pub async fn move_right(&self) {
        self.move_and_emit(Document::move_right).await;
    }

    pub async fn move_up(&self) {
        self.move_and_emit(Document::move_up).await;
    }

    pub async fn move_down(&self) {
        self.move_and_emit(Document::move_down).await;
    }

    async fn move_and_emit(&self, f: fn(&mut Document)) {
        let move_op = {
            let mut doc = self.doc.lock().await;
            f(&mut doc);
            Operation::Move {
                site: self.site.clone(),
                position: doc.cursor_visible_index(),
            }
        };
        self.fan_out(&move_op).await;
        self.publish_change();
    }

    fn publish_change(&self) {
        // Bounded at capacity 1: if the UI hasn't drained the previous
        // event yet, this one coalesces into it rather than blocking or
        // erroring — the UI only needs to know *that* something changed.
        let _ = self.changes_tx.try_send(());
    }

    async fn fan_out(&self, op: &Operation) {
        match &*self.role.lock().await {
            Role::Standalone => {}
            Role::Host { clients, .. } => {
                let wire = protocol::WireOp::from(op);
                let targets = clients.lock().await;
                for sender in targets.values() {
                    let _ = sender.send(wire.clone());
                }
            }
            Role::Guest { guest, .. } => guest.send(op),
        }
    }

    // ---- discovery -----------------------------------------------------

    /// Binds the discovery listener if it isn't already running, returning
    /// the UDP port it landed on. Idempotent: subsequent calls (e.g. `host`
    /// after the UI already started browsing sessions) just return the same
    /// port without rebinding.
    async fn ensure_discovery(&self) -> Result<u16, JoinError> {
        let port = self
            .udp_port
            .get_or_try_init(|| async {
                let (socket, port) = net::bind_listener(&self.discovery_config).await?;
                let directory = self.directory.clone();
                let quit = self.quit.clone();
                tokio::spawn(net::run_listener(socket, port, directory, quit));
                Ok::<u16, DiscoveryError>(port)
            })
            .await?;
        Ok(*port)
    }

    /// Starts browsing for sessions without hosting or joining one. Safe to
    /// call more than once; idempotent via [`Self::ensure_discovery`].
    pub async fn start_discovery(&self) -> anyhow::Result<()> {
        self.ensure_discovery().await?;
        Ok(())
    }

    // ---- session lifecycle ---------------------------------------------

    /// Starts hosting: binds a TCP listener, derives the session name from
    /// its port, and starts the announce loop. Returns the session name so
    /// the caller can display it.
    pub async fn host(&self) -> anyhow::Result<String> {
        let udp_port = self.ensure_discovery().await?;

        let host = net::Host::bind().await?;
        let tcp_port = host.tcp_port();
        let session_name = host.session_name();
        let clients = host.clients();

        let quit = Arc::new(AtomicBool::new(false));

        let doc = self.doc.clone();
        let registry = self.registry.clone();
        let changes = self.changes_tx.clone();
        let deadline = self.read_deadline;
        let accept_handle = tokio::spawn(host.accept_loop(
            doc,
            registry,
            changes,
            deadline,
            quit.clone(),
        ));

        let config = self.discovery_config.clone();
        let name = session_name.clone();
        let announce_quit = quit.clone();
        let announce_handle = tokio::spawn(async move {
            net::announce_loop(&name, tcp_port, udp_port, &config, announce_quit).await
        });

        let previous = std::mem::replace(
            &mut *self.role.lock().await,
            Role::Host {
                tcp_port,
                clients,
                accept_handle,
                announce_handle,
                quit,
            },
        );
        previous.teardown();

        tracing::info!(session = %session_name, tcp_port, "now hosting session");
        Ok(session_name)
    }

    /// Looks up `session_name` in the discovery directory and dials it.
    pub async fn join(&self, session_name: &str) -> anyhow::Result<()> {
        self.ensure_discovery().await?;

        let descriptor = self
            .directory
            .get(session_name)
            .await
            .ok_or_else(|| JoinError::UnknownSession(session_name.to_string()))?;

        self.join_addr(descriptor.addr).await
    }

    /// Dials `addr` directly, bypassing the discovery directory: the path
    /// `join` takes once it has resolved a session name, and a reasonable
    /// fallback for a UI to expose when a peer sits on a different
    /// broadcast domain and discovery never sees its announcements.
    ///
    /// Bootstraps the local document from the host's snapshot (verifying
    /// its checksum), tears down any prior role so no stale receive task
    /// survives the swap (see the design notes on ownership across join),
    /// and announces the local caret to the new peers.
    pub async fn join_addr(&self, addr: SocketAddr) -> anyhow::Result<()> {
        let quit = Arc::new(AtomicBool::new(false));
        let guest = net::connect(
            addr,
            self.doc.clone(),
            self.registry.clone(),
            self.site.clone(),
            self.changes_tx.clone(),
            self.read_deadline,
            quit.clone(),
        )
        .await?;

        let previous = std::mem::replace(&mut *self.role.lock().await, Role::Guest { guest, quit });
        previous.teardown();

        self.publish_change();

        let position = self.doc.lock().await.cursor_visible_index();
        self.fan_out(&Operation::Move {
            site: self.site.clone(),
            position,
        })
        .await;

        tracing::info!(%addr, "joined session");
        Ok(())
    }

    /// Stops discovery, hosting, and any guest connection. Local edits keep
    /// working afterwards (the document itself is untouched); only the
    /// network side is torn down.
    pub async fn shutdown(&self) {
        self.quit.store(true, Ordering::Relaxed);
        let previous = std::mem::replace(&mut *self.role.lock().await, Role::Standalone);
        previous.teardown();
    }
}
