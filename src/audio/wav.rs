//! In-memory WAV packaging for backend upload.

use crate::error::{Result, SpeakError};
use std::io::Cursor;

/// Canonical RIFF/WAVE header length for mono 16-bit PCM.
pub const HEADER_LEN: usize = 44;

/// Encode mono 16-bit PCM samples as a WAV file in memory.
///
/// Produces the canonical 44-byte header followed by the raw little-endian
/// samples. Empty input yields a header with data size 0.
pub fn encode(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(HEADER_LEN + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| SpeakError::WavEncode {
        message: format!("Failed to create WAV writer: {}", e),
    })?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| SpeakError::WavEncode {
                message: format!("Failed to write sample: {}", e),
            })?;
    }

    writer.finalize().map_err(|e| SpeakError::WavEncode {
        message: format!("Failed to finalize WAV: {}", e),
    })?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
        let reader = hound::WavReader::new(Cursor::new(bytes.to_vec())).unwrap();
        let spec = reader.spec();
        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        (spec, samples)
    }

    #[test]
    fn test_empty_input_yields_bare_header() {
        let bytes = encode(&[], 16000).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);

        // data chunk size field is the last 4 header bytes
        assert_eq!(&bytes[40..44], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_header_fields_mono_16bit_pcm() {
        let samples = vec![0i16; 100];
        let bytes = encode(&samples, 16000).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");

        // RIFF chunk size = 36 + data size
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size, 36 + 200);

        // format code 1 (PCM), 1 channel
        assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 1);

        // sample rate, byte rate = rate * 2, block align 2, 16 bits
        assert_eq!(
            u32::from_le_bytes(bytes[24..28].try_into().unwrap()),
            16000
        );
        assert_eq!(
            u32::from_le_bytes(bytes[28..32].try_into().unwrap()),
            32000
        );
        assert_eq!(u16::from_le_bytes(bytes[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bytes[34..36].try_into().unwrap()), 16);

        assert_eq!(&bytes[36..40], b"data");
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(data_size, 200);
        assert_eq!(bytes.len(), HEADER_LEN + 200);
    }

    #[test]
    fn test_roundtrip_preserves_samples() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 1234, -4321];
        let bytes = encode(&samples, 16000).unwrap();

        let (spec, decoded) = decode(&bytes);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_roundtrip_empty() {
        let bytes = encode(&[], 48000).unwrap();
        let (spec, decoded) = decode(&bytes);
        assert_eq!(spec.sample_rate, 48000);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_samples_are_little_endian() {
        let bytes = encode(&[0x1234], 16000).unwrap();
        assert_eq!(&bytes[44..46], &[0x34, 0x12]);
    }

    #[test]
    fn test_one_second_of_audio() {
        let samples = vec![100i16; 16000];
        let bytes = encode(&samples, 16000).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 32000);

        let (_, decoded) = decode(&bytes);
        assert_eq!(decoded.len(), 16000);
        assert!(decoded.iter().all(|&s| s == 100));
    }
}
