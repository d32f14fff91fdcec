//! Daemon assembly: builds the collaborators and runs the dispatcher.

pub mod core;
pub mod dispatch;

use crate::audio::capture::{AudioProducer, CpalProducer};
use crate::audio::ring::{self, RingConsumer};
use crate::config::Config;
use crate::error::{Result, SpeakError};
use crate::history::HistoryStore;
use crate::ipc::client::default_socket_path;
use crate::output::{self, OutputFactory};
use crate::session::Session;
use crate::stt::lan::LanTranscriber;
use crate::stt::transcriber::Transcriber;
use crate::sys;
use crate::window::{sway, WindowSnapshot};
use self::core::DaemonCore;
use self::dispatch::Dispatcher;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Everything the dispatcher needs, with collaborators injectable for
/// tests.
pub struct DaemonParts {
    pub config: Config,
    pub socket_path: PathBuf,
    pub producer: Box<dyn AudioProducer>,
    pub ring: RingConsumer,
    pub transcriber: Arc<dyn Transcriber>,
    pub history: HistoryStore,
    pub output_factory: OutputFactory,
    pub initial_focus: WindowSnapshot,
    pub focus_rx: Option<mpsc::UnboundedReceiver<WindowSnapshot>>,
}

/// Run the daemon with the real collaborators: cpal capture, LAN backend,
/// sway window source, on-disk history.
pub async fn run(config: Config, socket_path: Option<PathBuf>) -> Result<()> {
    sys::suppress_audio_warnings();

    let (ring_producer, ring_consumer) = ring::ring(config.ring_buffer_bytes());
    let producer = CpalProducer::new(
        config.audio.device.as_deref(),
        ring_producer,
        config.audio.sample_rate,
    )?;

    let transcriber: Arc<dyn Transcriber> = Arc::new(LanTranscriber::new(&config.backend));
    info!(
        "backend: {} ({})",
        config.backend.url, config.backend.api_format
    );

    let history = match HistoryStore::open(&HistoryStore::default_path()) {
        Ok(store) => store,
        Err(e) => {
            warn!("history disabled: {}", e);
            HistoryStore::disabled()
        }
    };

    let (initial_focus, focus_rx) = match sway::watch().await {
        Ok((snapshot, rx)) => {
            info!("sway IPC connected");
            (snapshot, Some(rx))
        }
        Err(e) => {
            info!("window context disabled: {}", e);
            (WindowSnapshot::default(), None)
        }
    };

    run_with(DaemonParts {
        config,
        socket_path: socket_path.unwrap_or_else(default_socket_path),
        producer: Box::new(producer),
        ring: ring_consumer,
        transcriber,
        history,
        output_factory: Box::new(output::make_output),
        initial_focus,
        focus_rx,
    })
    .await
}

/// Bind the command endpoint and run the dispatcher until shutdown.
pub async fn run_with(parts: DaemonParts) -> Result<()> {
    // Remove a stale socket from a previous run.
    if parts.socket_path.exists() {
        std::fs::remove_file(&parts.socket_path).map_err(|e| SpeakError::IpcSocket {
            message: format!("Failed to remove existing socket: {}", e),
        })?;
    }

    let listener = UnixListener::bind(&parts.socket_path).map_err(|e| SpeakError::IpcSocket {
        message: format!("Failed to bind {}: {}", parts.socket_path.display(), e),
    })?;
    info!("IPC listening on {}", parts.socket_path.display());

    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let session = Session::new(parts.ring, parts.producer);
    let mut core = DaemonCore::new(
        parts.config,
        session,
        parts.transcriber,
        parts.history,
        parts.output_factory,
        completion_tx,
    );
    core.set_focused_window(parts.initial_focus);

    Dispatcher::new(
        listener,
        parts.socket_path,
        core,
        completion_rx,
        parts.focus_rx,
    )
    .run()
    .await
}
