//! LAN whisper-server transcription backend.
//!
//! Uploads the recording as a WAV multipart form to a whisper server on the
//! local network. Two API formats are supported: the whisper.cpp server
//! (`POST /inference`) and OpenAI-compatible servers
//! (`POST /v1/audio/transcriptions`).

use crate::audio::wav;
use crate::config::BackendConfig;
use crate::defaults::{BACKEND_CONNECT_TIMEOUT_SECS, BACKEND_TIMEOUT_SECS};
use crate::error::{Result, SpeakError};
use crate::stt::transcriber::{Transcriber, Transcript};
use reqwest::blocking::multipart::{Form, Part};
use std::time::{Duration, Instant};

pub struct LanTranscriber {
    url: String,
    api_format: String,
    language: String,
}

impl LanTranscriber {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            api_format: config.api_format.clone(),
            language: config.language.clone(),
        }
    }

    /// Build the blocking HTTP client.
    ///
    /// Constructed per request, on the worker thread: a blocking reqwest
    /// client must never be created or driven from the dispatcher's async
    /// runtime, and one utterance per request makes construction cost
    /// irrelevant.
    fn build_client(&self) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(BACKEND_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(BACKEND_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SpeakError::Transcription {
                message: format!("Failed to build HTTP client: {}", e),
            })
    }

    fn build_request(&self, wav_data: Vec<u8>) -> Result<(String, Form)> {
        let file_part = Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| SpeakError::Transcription {
                message: format!("Failed to build multipart body: {}", e),
            })?;

        if self.api_format == "openai" {
            let form = Form::new()
                .part("file", file_part)
                .text("model", "whisper-1")
                .text("language", self.language.clone())
                .text("response_format", "json");
            Ok((format!("{}/v1/audio/transcriptions", self.url), form))
        } else {
            // whisper.cpp server format
            let mut form = Form::new()
                .part("file", file_part)
                .text("temperature", "0.0")
                .text("response_format", "json");
            if !self.language.is_empty() {
                form = form.text("language", self.language.clone());
            }
            Ok((format!("{}/inference", self.url), form))
        }
    }
}

impl Transcriber for LanTranscriber {
    fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<Transcript> {
        if samples.is_empty() {
            return Err(SpeakError::NoAudio);
        }

        let duration_s = samples.len() as f64 / sample_rate as f64;
        let wav_data = wav::encode(samples, sample_rate)?;
        let client = self.build_client()?;
        let (endpoint, form) = self.build_request(wav_data)?;

        let start = Instant::now();
        let response = client
            .post(&endpoint)
            .multipart(form)
            .send()
            .map_err(|e| SpeakError::Transcription {
                message: format!("Request to {} failed: {}", endpoint, e),
            })?;
        let body: serde_json::Value =
            response.json().map_err(|e| SpeakError::Transcription {
                message: format!("Invalid response body: {}", e),
            })?;
        let processing_s = start.elapsed().as_secs_f64();

        if let Some(text) = body.get("text").and_then(|t| t.as_str()) {
            Ok(Transcript {
                text: text.trim().to_string(),
                duration_s,
                processing_s,
            })
        } else if let Some(error) = body.get("error") {
            Err(SpeakError::Transcription {
                message: format!("server error: {}", render_server_error(error)),
            })
        } else {
            Err(SpeakError::Transcription {
                message: format!("unexpected response: {}", body),
            })
        }
    }

    fn backend_name(&self) -> &str {
        "lan"
    }
}

/// Servers report errors as either a bare string or an object.
fn render_server_error(error: &serde_json::Value) -> String {
    match error.as_str() {
        Some(s) => s.to_string(),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_format: &str, language: &str) -> BackendConfig {
        BackendConfig {
            url: "http://127.0.0.1:9".to_string(), // discard port, never listening
            api_format: api_format.to_string(),
            language: language.to_string(),
        }
    }

    #[test]
    fn test_openai_endpoint_path() {
        let backend = LanTranscriber::new(&config("openai", "en"));
        let (endpoint, _) = backend.build_request(vec![0; 44]).unwrap();
        assert_eq!(endpoint, "http://127.0.0.1:9/v1/audio/transcriptions");
    }

    #[test]
    fn test_whisper_endpoint_path() {
        let backend = LanTranscriber::new(&config("whisper", "en"));
        let (endpoint, _) = backend.build_request(vec![0; 44]).unwrap();
        assert_eq!(endpoint, "http://127.0.0.1:9/inference");
    }

    #[test]
    fn test_trailing_slash_in_url_is_normalized() {
        let mut cfg = config("whisper", "en");
        cfg.url = "http://host:8080/".to_string();
        let backend = LanTranscriber::new(&cfg);
        let (endpoint, _) = backend.build_request(vec![0; 44]).unwrap();
        assert_eq!(endpoint, "http://host:8080/inference");
    }

    #[test]
    fn test_empty_audio_is_rejected_without_network() {
        let backend = LanTranscriber::new(&config("whisper", "en"));
        let result = backend.transcribe(&[], 16000);
        assert!(matches!(result, Err(SpeakError::NoAudio)));
    }

    #[test]
    fn test_unreachable_server_is_a_transcription_error() {
        let backend = LanTranscriber::new(&config("whisper", "en"));
        let result = backend.transcribe(&[0i16; 160], 16000);
        assert!(matches!(result, Err(SpeakError::Transcription { .. })));
    }

    #[test]
    fn test_backend_name() {
        let backend = LanTranscriber::new(&config("whisper", "en"));
        assert_eq!(backend.backend_name(), "lan");
    }

    #[test]
    fn test_render_server_error_shapes() {
        assert_eq!(
            render_server_error(&serde_json::json!("model not loaded")),
            "model not loaded"
        );
        assert_eq!(
            render_server_error(&serde_json::json!({"code": 503})),
            r#"{"code":503}"#
        );
    }
}
