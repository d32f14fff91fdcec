//! Newline-delimited JSON framing over a byte stream.
//!
//! Stream sockets deliver arbitrary chunk boundaries, so each connection
//! keeps an append-only buffer and extracts every completed
//! newline-terminated prefix per readiness. The buffer is capped so a
//! client that never sends a newline cannot grow it without bound.

use crate::defaults::MAX_LINE_BYTES;
use crate::error::{Result, SpeakError};
use serde_json::Value;

/// Per-connection read buffer with frame extraction.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    cap: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_cap(MAX_LINE_BYTES)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
        }
    }

    /// Append a chunk read from the stream.
    ///
    /// Fails when the buffered unconsumed data would exceed the cap; the
    /// caller is expected to close the connection.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<()> {
        if self.buf.len() + chunk.len() > self.cap {
            return Err(SpeakError::IpcProtocol {
                message: format!("line exceeds {} byte buffer cap", self.cap),
            });
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Extract the next newline-terminated frame, if a full one is buffered.
    ///
    /// The line is consumed either way; a line that is not valid JSON yields
    /// `Some(Err(..))`.
    pub fn next_frame(&mut self) -> Option<Result<Value>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        let line = &line[..line.len() - 1];

        Some(
            serde_json::from_slice(line).map_err(|e| SpeakError::IpcProtocol {
                message: format!("malformed frame: {}", e),
            }),
        )
    }

    /// Bytes buffered but not yet consumed as frames.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a value as one newline-terminated frame.
pub fn encode_frame<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(value).map_err(|e| SpeakError::IpcProtocol {
        message: format!("Failed to serialize frame: {}", e),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_newline_means_no_frame() {
        let mut fb = FrameBuffer::new();
        fb.extend(br#"{"cmd":"status""#).unwrap();
        assert!(fb.next_frame().is_none());
        assert_eq!(fb.pending(), 15);
    }

    #[test]
    fn test_single_frame_extraction() {
        let mut fb = FrameBuffer::new();
        fb.extend(b"{\"cmd\":\"status\"}\n").unwrap();

        let frame = fb.next_frame().unwrap().unwrap();
        assert_eq!(frame, json!({"cmd": "status"}));
        assert!(fb.next_frame().is_none());
        assert_eq!(fb.pending(), 0);
    }

    #[test]
    fn test_frame_split_across_arbitrary_chunks() {
        let payload = b"{\"cmd\":\"start\",\"output\":\"type\"}\n";

        // Every possible split point yields the same frame. The newline is
        // the last byte, so no prefix ever completes a frame early.
        for split in 0..payload.len() {
            let mut fb = FrameBuffer::new();
            fb.extend(&payload[..split]).unwrap();
            assert!(fb.next_frame().is_none());
            fb.extend(&payload[split..]).unwrap();

            let frame = fb.next_frame().unwrap().unwrap();
            assert_eq!(frame, json!({"cmd": "start", "output": "type"}));
        }
    }

    #[test]
    fn test_concatenated_frames_decode_in_order() {
        let mut fb = FrameBuffer::new();
        fb.extend(b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n").unwrap();

        assert_eq!(fb.next_frame().unwrap().unwrap(), json!({"a": 1}));
        assert_eq!(fb.next_frame().unwrap().unwrap(), json!({"b": 2}));
        assert_eq!(fb.next_frame().unwrap().unwrap(), json!({"c": 3}));
        assert!(fb.next_frame().is_none());
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_the_sequence() {
        let stream = b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n";

        // Feed one byte at a time; collect everything extracted.
        let mut fb = FrameBuffer::new();
        let mut frames = Vec::new();
        for &byte in stream.iter() {
            fb.extend(&[byte]).unwrap();
            while let Some(frame) = fb.next_frame() {
                frames.push(frame.unwrap());
            }
        }

        assert_eq!(
            frames,
            vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]
        );
    }

    #[test]
    fn test_malformed_line_is_consumed_and_reported() {
        let mut fb = FrameBuffer::new();
        fb.extend(b"not json at all\n{\"ok\":true}\n").unwrap();

        let bad = fb.next_frame().unwrap();
        assert!(bad.is_err());

        // The bad line is gone; the next frame parses.
        let good = fb.next_frame().unwrap().unwrap();
        assert_eq!(good, json!({"ok": true}));
    }

    #[test]
    fn test_empty_line_is_malformed() {
        let mut fb = FrameBuffer::new();
        fb.extend(b"\n").unwrap();
        assert!(fb.next_frame().unwrap().is_err());
    }

    #[test]
    fn test_buffer_cap_is_enforced() {
        let mut fb = FrameBuffer::with_cap(16);
        fb.extend(&[b'x'; 16]).unwrap();

        let err = fb.extend(&[b'x']).unwrap_err();
        assert!(matches!(err, SpeakError::IpcProtocol { .. }));
    }

    #[test]
    fn test_consumed_frames_free_cap_space() {
        let mut fb = FrameBuffer::with_cap(16);
        fb.extend(b"{\"a\":1}\n").unwrap();
        assert!(fb.next_frame().unwrap().is_ok());

        // 8 bytes were consumed, so another 16 fit now.
        fb.extend(b"{\"b\":22}\n").unwrap();
        assert_eq!(fb.next_frame().unwrap().unwrap(), json!({"b": 22}));
    }

    #[test]
    fn test_encode_frame_appends_newline() {
        let bytes = encode_frame(&json!({"status": "ok"})).unwrap();
        assert_eq!(bytes, b"{\"status\":\"ok\"}\n");
    }

    #[test]
    fn test_encode_then_decode_roundtrip() {
        let value = json!({
            "status": "ok",
            "text": "line one\nline two",
            "nested": {"k": [1, 2, 3]}
        });

        let bytes = encode_frame(&value).unwrap();
        let mut fb = FrameBuffer::new();
        fb.extend(&bytes).unwrap();
        // Embedded newlines are escaped by JSON, so exactly one frame.
        assert_eq!(fb.next_frame().unwrap().unwrap(), value);
        assert!(fb.next_frame().is_none());
    }
}
