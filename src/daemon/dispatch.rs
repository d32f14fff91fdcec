//! The daemon's event loop.
//!
//! Single-threaded cooperative dispatch: the daemon runs on a
//! current-thread tokio runtime, so the reactor is the readiness
//! multiplexer and every task below shares one OS thread. The loop selects
//! over five sources: termination signals, the command listener, the
//! worker-completion channel, the focus-event channel, and decoded frames
//! from client connections. All mutable state (session, waiting list,
//! write halves) is owned here; connection reader tasks only decode frames
//! and forward them.

use crate::daemon::core::{CompletedTurn, ConnId, DaemonCore};
use crate::error::Result;
use crate::ipc::codec::{self, FrameBuffer};
use crate::window::WindowSnapshot;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What a connection reader task reports back to the dispatcher.
enum ConnEvent {
    /// One complete, JSON-decoded frame.
    Frame {
        id: ConnId,
        frame: serde_json::Value,
    },
    /// EOF, read error, oversized line or malformed frame.
    Closed { id: ConnId },
}

pub struct Dispatcher {
    listener: UnixListener,
    socket_path: PathBuf,
    core: DaemonCore,
    completion_rx: mpsc::UnboundedReceiver<()>,
    focus_rx: Option<mpsc::UnboundedReceiver<WindowSnapshot>>,
    conn_tx: mpsc::UnboundedSender<ConnEvent>,
    conn_rx: mpsc::UnboundedReceiver<ConnEvent>,
    writers: HashMap<ConnId, OwnedWriteHalf>,
    next_conn_id: ConnId,
}

impl Dispatcher {
    pub fn new(
        listener: UnixListener,
        socket_path: PathBuf,
        core: DaemonCore,
        completion_rx: mpsc::UnboundedReceiver<()>,
        focus_rx: Option<mpsc::UnboundedReceiver<WindowSnapshot>>,
    ) -> Self {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        Self {
            listener,
            socket_path,
            core,
            completion_rx,
            focus_rx,
            conn_tx,
            conn_rx,
            writers: HashMap::new(),
            next_conn_id: 1,
        }
    }

    /// Run until a termination signal arrives, then execute the shutdown
    /// sequence.
    pub async fn run(mut self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        info!("daemon ready");

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("received SIGINT, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    break;
                }
                _ = self.completion_rx.recv() => {
                    if let Some(turn) = self.core.on_transcription_complete() {
                        self.deliver(turn).await;
                    }
                }
                focus = next_focus(&mut self.focus_rx) => {
                    match focus {
                        Some(snapshot) => self.core.set_focused_window(snapshot),
                        // Source gone (compositor exited); stop selecting on it.
                        None => self.focus_rx = None,
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => self.register_connection(stream),
                        Err(e) => warn!("accept failed: {}", e),
                    }
                }
                Some(event) = self.conn_rx.recv() => {
                    self.handle_conn_event(event).await;
                }
            }
        }

        self.shutdown().await
    }

    fn register_connection(&mut self, stream: UnixStream) {
        let id = self.next_conn_id;
        self.next_conn_id += 1;

        let (read_half, write_half) = stream.into_split();
        self.writers.insert(id, write_half);
        debug!("connection {} accepted", id);

        // Same OS thread: the runtime is current-thread, so this task only
        // runs while the dispatcher awaits.
        tokio::spawn(read_connection(id, read_half, self.conn_tx.clone()));
    }

    async fn handle_conn_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Frame { id, frame } => {
                let response = self.core.handle_frame(frame);
                if response.is_deferred() {
                    // Deferred: the eventual completion response goes to
                    // this connection instead of an immediate write.
                    self.core.add_waiting_client(id);
                } else if !self.write_response(id, &response).await {
                    self.drop_connection(id);
                }
            }
            ConnEvent::Closed { id } => {
                debug!("connection {} closed", id);
                self.drop_connection(id);
            }
        }
    }

    fn drop_connection(&mut self, id: ConnId) {
        self.writers.remove(&id);
        self.core.remove_waiting_client(id);
    }

    /// Write one frame; false when the connection is unusable.
    async fn write_response(&mut self, id: ConnId, response: &crate::ipc::protocol::Response) -> bool {
        let bytes = match codec::encode_frame(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to encode response: {}", e);
                return false;
            }
        };

        let Some(writer) = self.writers.get_mut(&id) else {
            return false;
        };

        match writer.write_all(&bytes).await {
            Ok(()) => true,
            Err(e) => {
                debug!("write to connection {} failed: {}", id, e);
                false
            }
        }
    }

    /// Fan the completed turn's response out to every waiter, in queue
    /// order. Waiters that disconnected in the meantime are skipped; a
    /// failed write to one never aborts delivery to the rest. Connections
    /// stay open afterwards (the client closes).
    async fn deliver(&mut self, turn: CompletedTurn) {
        for id in turn.waiters {
            if !self.write_response(id, &turn.response).await {
                debug!("waiter {} gone before completion", id);
                self.drop_connection(id);
            }
        }
    }

    /// Exit path: stop capture, synchronously consume any in-flight worker
    /// result, deliver it to still-connected waiters, release the socket.
    async fn shutdown(mut self) -> Result<()> {
        if let Some(turn) = self.core.shutdown() {
            self.deliver(turn).await;
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("socket cleanup failed: {}", e);
        }
        info!("daemon stopped");
        Ok(())
    }
}

/// Pending forever once the focus source is gone, so the select arm never
/// spins on a closed channel.
async fn next_focus(
    rx: &mut Option<mpsc::UnboundedReceiver<WindowSnapshot>>,
) -> Option<WindowSnapshot> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Per-connection reader: pull chunks, extract frames, forward them.
///
/// Drains every already-buffered frame per readiness, so a client that
/// pipelines requests gets them handled in order without extra wakeups.
async fn read_connection(id: ConnId, mut read_half: OwnedReadHalf, tx: mpsc::UnboundedSender<ConnEvent>) {
    let mut frames = FrameBuffer::new();
    let mut chunk = [0u8; 4096];

    'read: loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("connection {} read error: {}", id, e);
                break;
            }
        };

        if let Err(e) = frames.extend(&chunk[..n]) {
            warn!("connection {}: {}", id, e);
            break;
        }

        while let Some(frame) = frames.next_frame() {
            match frame {
                Ok(value) => {
                    if tx.send(ConnEvent::Frame { id, frame: value }).is_err() {
                        return; // dispatcher is gone
                    }
                }
                Err(e) => {
                    warn!("connection {}: {}", id, e);
                    break 'read;
                }
            }
        }
    }

    let _ = tx.send(ConnEvent::Closed { id });
}
