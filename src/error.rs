//! Error types for speak-anywhere.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeakError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Session state errors
    #[error("Session is already recording or transcribing")]
    SessionActive,

    #[error("No audio captured")]
    NoAudio,

    // Transcription errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // WAV packaging errors
    #[error("WAV encoding failed: {message}")]
    WavEncode { message: String },

    // Output delivery errors
    #[error("Output tool not found: {tool}")]
    OutputToolNotFound { tool: String },

    #[error("Output delivery failed: {message}")]
    OutputFailed { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // History store errors
    #[error("History store error: {message}")]
    History { message: String },

    // Window manager errors
    #[error("Window manager IPC error: {message}")]
    WindowIpc { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SpeakError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_session_active_display() {
        let error = SpeakError::SessionActive;
        assert_eq!(
            error.to_string(),
            "Session is already recording or transcribing"
        );
    }

    #[test]
    fn test_no_audio_display() {
        assert_eq!(SpeakError::NoAudio.to_string(), "No audio captured");
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = SpeakError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_transcription_display() {
        let error = SpeakError::Transcription {
            message: "server error: overloaded".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription failed: server error: overloaded"
        );
    }

    #[test]
    fn test_ipc_protocol_display() {
        let error = SpeakError::IpcProtocol {
            message: "line exceeds buffer cap".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "IPC protocol error: line exceeds buffer cap"
        );
    }

    #[test]
    fn test_output_tool_not_found_display() {
        let error = SpeakError::OutputToolNotFound {
            tool: "wtype".to_string(),
        };
        assert_eq!(error.to_string(), "Output tool not found: wtype");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: SpeakError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: SpeakError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SpeakError>();
        assert_sync::<SpeakError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
