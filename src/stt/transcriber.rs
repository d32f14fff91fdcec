//! Transcription backend interface.

use crate::error::{Result, SpeakError};

/// A finished transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Length of the submitted audio in seconds.
    pub duration_s: f64,
    /// Wall-clock time the backend took.
    pub processing_s: f64,
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (LAN whisper server vs mock).
/// `transcribe` blocks, bounded by the implementation's own timeout; it runs
/// on the transcription worker thread, never on the daemon thread.
pub trait Transcriber: Send + Sync {
    /// Transcribe 16-bit mono PCM samples to text.
    fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<Transcript>;

    /// Short tag identifying the backend, stored with history records.
    fn backend_name(&self) -> &str;
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    text: String,
    processing_s: f64,
    delay: Option<std::time::Duration>,
    should_fail: bool,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new() -> Self {
        Self {
            text: "mock transcription".to_string(),
            processing_s: 0.0,
            delay: None,
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific transcript text
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Configure the reported processing time
    pub fn with_processing_time(mut self, seconds: f64) -> Self {
        self.processing_s = seconds;
        self
    }

    /// Configure the mock to sleep before returning, simulating a slow
    /// backend call
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<Transcript> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            return Err(SpeakError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        Ok(Transcript {
            text: self.text.clone(),
            duration_s: samples.len() as f64 / sample_rate as f64,
            processing_s: self.processing_s,
        })
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}
