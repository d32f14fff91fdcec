//! Recording session state machine.
//!
//! One session turn is Idle → Recording → Transcribing → Idle. The session
//! owns the ring consumer and the audio producer; the window snapshot is
//! captured atomically with the Idle → Recording transition and never
//! mutated during the turn.

use crate::audio::capture::AudioProducer;
use crate::audio::ring::RingConsumer;
use crate::error::{Result, SpeakError};
use crate::window::WindowSnapshot;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Transcribing,
}

impl SessionState {
    /// Wire representation used by the `status` response.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Transcribing => "transcribing",
        }
    }
}

pub struct Session {
    ring: RingConsumer,
    producer: Box<dyn AudioProducer>,
    state: SessionState,
    record_start: Option<Instant>,
    window_snapshot: WindowSnapshot,
}

impl Session {
    pub fn new(ring: RingConsumer, producer: Box<dyn AudioProducer>) -> Self {
        Self {
            ring,
            producer,
            state: SessionState::Idle,
            record_start: None,
            window_snapshot: WindowSnapshot::default(),
        }
    }

    /// Begin a recording turn.
    ///
    /// Rejects with `SessionActive` unless Idle. Resets the ring, starts the
    /// producer (a start failure leaves the state Idle), captures the window
    /// snapshot and the start timestamp, then transitions to Recording.
    pub fn start_recording(&mut self, window: WindowSnapshot) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(SpeakError::SessionActive);
        }

        self.ring.reset();
        self.producer.start()?;

        self.window_snapshot = window;
        self.record_start = Some(Instant::now());
        self.state = SessionState::Recording;
        Ok(())
    }

    /// End the recording turn and hand back the captured samples.
    ///
    /// In Recording: stops the producer, drains the ring (sample-aligned)
    /// and transitions to Transcribing regardless of how much audio arrived.
    /// In any other state: returns empty without touching the state.
    pub fn stop_recording(&mut self) -> Vec<i16> {
        if self.state != SessionState::Recording {
            return Vec::new();
        }

        self.producer.stop();
        let samples = self.ring.drain_samples();
        self.state = SessionState::Transcribing;
        samples
    }

    /// Stop the audio producer without draining or changing state.
    ///
    /// Shutdown path only: the daemon is exiting and the turn will not
    /// complete.
    pub fn stop_capture(&mut self) {
        self.producer.stop();
    }

    pub fn set_transcribing(&mut self) {
        self.state = SessionState::Transcribing;
    }

    pub fn set_idle(&mut self) {
        self.state = SessionState::Idle;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Seconds spent recording so far; 0 unless Recording.
    pub fn recording_duration(&self) -> f64 {
        if self.state != SessionState::Recording {
            return 0.0;
        }
        self.record_start
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// The window snapshot captured when this turn started.
    pub fn window_snapshot(&self) -> &WindowSnapshot {
        &self.window_snapshot
    }
}
