//! Default configuration constants for speak-anywhere.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and bandwidth for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default maximum recording length in seconds.
///
/// Bounds the ring buffer: capture beyond this window overwrites nothing and
/// is simply dropped by the ring's short-write behavior.
pub const MAX_RECORD_SECONDS: u32 = 120;

/// Bytes per PCM sample (16-bit mono).
pub const SAMPLE_BYTES: usize = 2;

/// Cap on a single client connection's pending read buffer.
///
/// A connection whose unterminated line grows past this limit is closed.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long the command client waits for a daemon response before giving up.
///
/// Transcription responses are deferred until the backend finishes, so this
/// must cover a backend round-trip for short utterances while still
/// bounding a hung daemon.
pub const CLIENT_TIMEOUT_SECS: u64 = 30;

/// Request timeout for the LAN transcription backend.
pub const BACKEND_TIMEOUT_SECS: u64 = 120;

/// Connect timeout for the LAN transcription backend.
pub const BACKEND_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default LAN whisper server URL.
pub const BACKEND_URL: &str = "http://127.0.0.1:8080";

/// Default backend API format ("whisper" = whisper.cpp server, or "openai").
pub const BACKEND_API_FORMAT: &str = "whisper";

/// Default transcription language code.
pub const BACKEND_LANGUAGE: &str = "en";

/// App identifiers treated as terminals for output-method selection.
///
/// Terminals generally ignore synthetic keystrokes of arbitrary text, so the
/// `type` output falls back to clipboard + paste shortcut for these.
pub const TERMINAL_APPS: &[&str] = &["kitty", "alacritty", "foot", "wezterm"];

/// Interactive CLI agents the process-tree detector looks for under the
/// focused window's pid.
pub const KNOWN_AGENTS: &[&str] = &["claude", "codex", "aider", "goose"];

/// Socket file name under `$XDG_RUNTIME_DIR`.
pub const SOCKET_FILE_NAME: &str = "speak-anywhere.sock";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_capacity_fits_max_recording() {
        // 120s at 16kHz/16-bit mono
        let bytes = MAX_RECORD_SECONDS as usize * SAMPLE_RATE as usize * SAMPLE_BYTES;
        assert_eq!(bytes, 3_840_000);
    }

    #[test]
    fn test_terminal_apps_are_lowercase() {
        for app in TERMINAL_APPS {
            assert_eq!(*app, app.to_lowercase());
        }
    }
}
