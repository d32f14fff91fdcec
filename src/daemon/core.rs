//! Command routing and transcription orchestration.
//!
//! `DaemonCore` owns everything a command can touch: the session state
//! machine, the focused-window cache, the waiting-client list, the history
//! store and the (at most one) transcription worker. It runs entirely on
//! the dispatcher thread; the worker thread only ever sees the data moved
//! into it.

use crate::config::Config;
use crate::error::{Result, SpeakError};
use crate::history::HistoryStore;
use crate::ipc::protocol::{HistoryEntryView, Request, Response};
use crate::output::{OutputFactory, OutputMethod};
use crate::session::{Session, SessionState};
use crate::stt::transcriber::{Transcriber, Transcript};
use crate::window::agent::AgentDetector;
use crate::window::WindowSnapshot;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identifies one client connection within the dispatcher.
pub type ConnId = u64;

/// Default number of history entries returned by the `history` command.
const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// What the worker thread hands back through its join handle.
///
/// The handle's return value is the single-writer result slot: the worker
/// writes it by returning, the dispatcher reads it after the completion
/// token arrives and the join supplies the happens-before edge.
struct WorkerOutcome {
    result: Result<Transcript>,
    context: WindowSnapshot,
    output: OutputMethod,
}

/// A finished session turn: the response to fan out and who gets it.
pub struct CompletedTurn {
    pub response: Response,
    pub waiters: Vec<ConnId>,
}

pub struct DaemonCore {
    config: Config,
    session: Session,
    transcriber: Arc<dyn Transcriber>,
    detector: AgentDetector,
    history: HistoryStore,
    output_factory: OutputFactory,
    completion_tx: mpsc::UnboundedSender<()>,
    focused_window: WindowSnapshot,
    pending_output: OutputMethod,
    waiting_clients: Vec<ConnId>,
    worker: Option<thread::JoinHandle<WorkerOutcome>>,
}

impl DaemonCore {
    pub fn new(
        config: Config,
        session: Session,
        transcriber: Arc<dyn Transcriber>,
        history: HistoryStore,
        output_factory: OutputFactory,
        completion_tx: mpsc::UnboundedSender<()>,
    ) -> Self {
        let detector = AgentDetector::new(config.agents.clone());
        let pending_output = config.output.default_method;
        Self {
            config,
            session,
            transcriber,
            detector,
            history,
            output_factory,
            completion_tx,
            focused_window: WindowSnapshot::default(),
            pending_output,
            waiting_clients: Vec::new(),
            worker: None,
        }
    }

    /// Route one decoded frame to its handler.
    ///
    /// A frame that is valid JSON but not a known command gets the
    /// "unknown command" error rather than a disconnect.
    pub fn handle_frame(&mut self, frame: serde_json::Value) -> Response {
        match serde_json::from_value::<Request>(frame) {
            Ok(request) => self.handle_request(request),
            Err(_) => Response::error("unknown command"),
        }
    }

    pub fn handle_request(&mut self, request: Request) -> Response {
        match request {
            Request::Start { output } => self.handle_start(output),
            Request::Stop => self.handle_stop(),
            Request::Toggle { output } => {
                if self.session.state() == SessionState::Recording {
                    self.handle_stop()
                } else {
                    self.handle_start(output)
                }
            }
            Request::Status => self.handle_status(),
            Request::History { limit } => self.handle_history(limit),
        }
    }

    fn handle_start(&mut self, output: Option<OutputMethod>) -> Response {
        if self.session.state() != SessionState::Idle {
            return Response::error("already recording or transcribing");
        }

        self.pending_output = output.unwrap_or(self.config.output.default_method);

        let window = self.enrich_window_info(self.focused_window.clone());
        if let Err(e) = self.session.start_recording(window) {
            warn!("failed to start recording: {}", e);
            return Response::error("failed to start recording");
        }

        let context = &self.session.window_snapshot().context;
        if context.is_empty() {
            info!("recording started");
        } else {
            info!("recording started ({})", context);
        }
        Response::message("recording")
    }

    fn handle_stop(&mut self) -> Response {
        if self.session.state() != SessionState::Recording {
            return Response::error("not recording");
        }

        let samples = self.session.stop_recording();
        if samples.is_empty() {
            self.session.set_idle();
            return Response::error("no audio captured");
        }

        let duration = samples.len() as f64 / self.config.audio.sample_rate as f64;
        info!("recording stopped, {:.1}s audio, transcribing", duration);

        let context = self.session.window_snapshot().clone();
        if let Err(e) = self.start_transcription(samples, context, self.pending_output) {
            warn!("failed to start transcription worker: {}", e);
            self.session.set_idle();
            return Response::error("failed to start transcription");
        }

        Response::Transcribing { duration }
    }

    fn handle_status(&self) -> Response {
        let state = self.session.state();
        let duration = match state {
            SessionState::Recording => Some(self.session.recording_duration()),
            _ => None,
        };
        Response::state(state.as_str(), duration)
    }

    fn handle_history(&self, limit: Option<u32>) -> Response {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        match self.history.recent(limit) {
            Ok(entries) => Response::entries(
                entries
                    .into_iter()
                    .map(|e| HistoryEntryView {
                        id: e.id,
                        timestamp: e.timestamp,
                        text: e.text,
                        audio_duration: e.audio_duration,
                        processing_time: e.processing_time,
                        app_context: e.app_context,
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!("history query failed: {}", e);
                Response::error("history unavailable")
            }
        }
    }

    /// Spawn the transcription worker for this turn.
    ///
    /// Ownership of the samples moves into the worker. Exactly one worker
    /// exists at a time; the session state machine guarantees `stop` cannot
    /// run again before `on_transcription_complete` reaped the previous one.
    fn start_transcription(
        &mut self,
        samples: Vec<i16>,
        context: WindowSnapshot,
        output: OutputMethod,
    ) -> Result<()> {
        debug_assert!(self.worker.is_none(), "worker already running");

        let transcriber = Arc::clone(&self.transcriber);
        let completion_tx = self.completion_tx.clone();
        let sample_rate = self.config.audio.sample_rate;

        let handle = thread::Builder::new()
            .name("transcription-worker".to_string())
            .spawn(move || {
                let result = transcriber.transcribe(&samples, sample_rate);
                let outcome = WorkerOutcome {
                    result,
                    context,
                    output,
                };
                // Wake the dispatcher; the outcome travels via the join.
                let _ = completion_tx.send(());
                outcome
            })
            .map_err(|e| SpeakError::Other(format!("failed to spawn worker: {}", e)))?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Reap the worker and close out the turn.
    ///
    /// Returns the response plus the waiting clients to deliver it to, or
    /// `None` on a spurious wakeup with no worker outstanding. Output
    /// delivery failures are logged but do not fail the turn; the history
    /// record is inserted on transcription success only.
    pub fn on_transcription_complete(&mut self) -> Option<CompletedTurn> {
        let handle = self.worker.take()?;

        let response = match handle.join() {
            Err(_) => {
                warn!("transcription worker panicked");
                Response::error("transcription worker panicked")
            }
            Ok(outcome) => match outcome.result {
                Ok(transcript) => self.finish_turn(&transcript, &outcome.context, outcome.output),
                Err(e) => {
                    warn!("transcription failed: {}", e);
                    Response::error(e.to_string())
                }
            },
        };

        self.session.set_idle();
        Some(CompletedTurn {
            response,
            waiters: std::mem::take(&mut self.waiting_clients),
        })
    }

    fn finish_turn(
        &mut self,
        transcript: &Transcript,
        context: &WindowSnapshot,
        output: OutputMethod,
    ) -> Response {
        info!(
            "transcription complete: {:.1}s processing, {} chars",
            transcript.processing_s,
            transcript.text.len()
        );

        if !transcript.text.is_empty() {
            let adapter = (self.output_factory)(output, self.is_terminal_app(context));
            if let Err(e) = adapter.deliver(&transcript.text) {
                warn!("output delivery failed: {}", e);
            }
        }

        if let Err(e) = self.history.insert(
            &transcript.text,
            transcript.duration_s,
            transcript.processing_s,
            context,
            self.transcriber.backend_name(),
        ) {
            warn!("history insert failed: {}", e);
        }

        Response::transcript(
            transcript.text.clone(),
            transcript.duration_s,
            transcript.processing_s,
        )
    }

    /// Whether the snapshot's app identifier matches the configured
    /// terminal set (lowercased substring match).
    fn is_terminal_app(&self, context: &WindowSnapshot) -> bool {
        let app = context.app().to_lowercase();
        !app.is_empty()
            && self
                .config
                .output
                .terminal_apps
                .iter()
                .any(|t| app.contains(t.as_str()))
    }

    /// Fill in agent and context fields from the process tree under the
    /// window's pid.
    fn enrich_window_info(&self, mut info: WindowSnapshot) -> WindowSnapshot {
        if info.pid > 0 {
            let app = info.app().to_string();
            if let Some(found) = self.detector.detect(info.pid) {
                info.context = format!("{} code on {}", found.agent, app);
                info.agent = found.agent;
                info.working_dir = found.working_dir;
            } else {
                info.context = app;
            }
        }
        info
    }

    pub fn add_waiting_client(&mut self, id: ConnId) {
        debug!("connection {} waiting for transcription", id);
        self.waiting_clients.push(id);
    }

    pub fn remove_waiting_client(&mut self, id: ConnId) {
        self.waiting_clients.retain(|&c| c != id);
    }

    pub fn set_focused_window(&mut self, info: WindowSnapshot) {
        self.focused_window = info;
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Shutdown sequencing: stop capture first, then synchronously consume
    /// any in-flight worker result so a finished transcript is still
    /// delivered and persisted.
    pub fn shutdown(&mut self) -> Option<CompletedTurn> {
        if self.session.state() == SessionState::Recording {
            self.session.stop_capture();
        }

        if self.session.state() == SessionState::Transcribing {
            info!("waiting for pending transcription to complete");
            self.on_transcription_complete()
        } else {
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
            None
        }
    }
}
