//! Focused-window context: snapshot type, sway IPC source, agent detection.

pub mod agent;
pub mod sway;

use serde::{Deserialize, Serialize};

/// Focused-window information captured when a recording starts.
///
/// Immutable for the lifetime of a session turn; later focus changes only
/// update the daemon's cache, which is consulted for subsequent turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// Wayland app_id (e.g. "kitty").
    pub app_id: String,
    /// X11 class for XWayland windows (e.g. "Firefox").
    pub window_class: String,
    /// Window title.
    pub title: String,
    /// Window process PID (0 when unknown).
    pub pid: i32,
    /// Detected CLI agent, e.g. "claude".
    pub agent: String,
    /// The agent's working directory.
    pub working_dir: String,
    /// Human-readable context, e.g. "claude code on kitty".
    pub context: String,
}

impl WindowSnapshot {
    /// True when the snapshot carries no identifying information at all.
    pub fn is_empty(&self) -> bool {
        self.app_id.is_empty()
            && self.window_class.is_empty()
            && self.title.is_empty()
            && self.pid == 0
    }

    /// The application identifier: app_id, falling back to the X11 class.
    pub fn app(&self) -> &str {
        if !self.app_id.is_empty() {
            &self.app_id
        } else {
            &self.window_class
        }
    }
}
