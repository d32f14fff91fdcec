//! JSON message protocol between the command client and the daemon.
//!
//! Frames are newline-terminated JSON objects. Requests are tagged by the
//! `cmd` field, responses by `status`. The `transcribing` status is an
//! internal sentinel: the dispatcher intercepts it to defer the real
//! response until the transcription worker finishes, and it is never
//! written to a client.

use serde::{Deserialize, Serialize};

use crate::output::OutputMethod;

/// Commands sent by the client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    /// Begin recording
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<OutputMethod>,
    },
    /// End recording; the response arrives after transcription
    Stop,
    /// Start if idle, stop if recording
    Toggle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<OutputMethod>,
    },
    /// Query session state
    Status,
    /// Fetch recent transcription records
    History {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },
}

impl Request {
    /// Serialize to a JSON string (no trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Selected history fields exposed over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntryView {
    pub id: i64,
    pub timestamp: String,
    pub text: String,
    pub audio_duration: f64,
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_context: Option<String>,
}

/// Responses sent by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Success; the populated fields depend on the command.
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        processing_time: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entries: Option<Vec<HistoryEntryView>>,
    },
    /// Internal sentinel: response deferred until the worker completes.
    Transcribing { duration: f64 },
    /// Command failed
    Error { message: String },
}

impl Response {
    /// A bare success with a human-readable message.
    pub fn message(message: impl Into<String>) -> Self {
        Response::Ok {
            message: Some(message.into()),
            state: None,
            duration: None,
            text: None,
            processing_time: None,
            entries: None,
        }
    }

    /// A `status` reply: session state plus recording duration if any.
    pub fn state(state: &str, duration: Option<f64>) -> Self {
        Response::Ok {
            message: None,
            state: Some(state.to_string()),
            duration,
            text: None,
            processing_time: None,
            entries: None,
        }
    }

    /// The completion reply for a finished transcription.
    pub fn transcript(text: impl Into<String>, duration: f64, processing_time: f64) -> Self {
        Response::Ok {
            message: None,
            state: None,
            duration: Some(duration),
            text: Some(text.into()),
            processing_time: Some(processing_time),
            entries: None,
        }
    }

    /// A `history` reply.
    pub fn entries(entries: Vec<HistoryEntryView>) -> Self {
        Response::Ok {
            message: None,
            state: None,
            duration: None,
            text: None,
            processing_time: None,
            entries: Some(entries),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// True for the deferred-response sentinel.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Response::Transcribing { .. })
    }

    /// Serialize to a JSON string (no trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
