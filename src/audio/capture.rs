//! Real audio capture using CPAL (Cross-Platform Audio Library).
//!
//! The capture callback runs at real-time priority and does exactly three
//! things: one relaxed load of the capturing flag, one copy of the sample
//! bytes into the SPSC ring, and return. No allocation, no locks, no
//! blocking.

use crate::audio::ring::RingProducer;
use crate::error::{Result, SpeakError};
use crate::sys::with_suppressed_stderr;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trait for the microphone capture source.
///
/// This trait allows swapping implementations (real cpal device vs mock).
pub trait AudioProducer: Send {
    /// Start feeding samples into the ring.
    fn start(&mut self) -> Result<()>;

    /// Stop feeding samples. Safe to call when not capturing.
    fn stop(&mut self);

    /// Whether the capture callback is currently writing into the ring.
    fn is_capturing(&self) -> bool;
}

/// Preferred device names for PipeWire/PulseAudio environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Check if a device is a preferred device.
fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
///
/// This ensures we respect the desktop's audio device selection.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    if is_preferred_device(&name) {
                        return Ok(device);
                    }
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| SpeakError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched from the daemon thread; play/pause are
/// called synchronously and the stream never crosses threads after that.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture backed by a cpal input stream.
///
/// Captures 16-bit PCM at the configured rate, mono. The stream is built
/// lazily on the first `start` and kept alive across session turns;
/// subsequent turns toggle the capturing flag and play/pause the stream.
pub struct CpalProducer {
    device: cpal::Device,
    sample_rate: u32,
    capturing: Arc<AtomicBool>,
    // Consumed when the stream is built; the callback owns it afterwards.
    producer: Option<RingProducer>,
    stream: Option<SendableStream>,
}

impl CpalProducer {
    /// Create a capture source for the named device (or the best default).
    ///
    /// # Errors
    /// Returns `AudioDeviceNotFound` if no matching input device exists.
    pub fn new(
        device_name: Option<&str>,
        producer: RingProducer,
        sample_rate: u32,
    ) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host.input_devices().map_err(|e| SpeakError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

                for dev in devices {
                    if let Ok(dev_name) = dev.name() {
                        if dev_name == name {
                            return Ok(dev);
                        }
                    }
                }

                Err(SpeakError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        Ok(Self {
            device,
            sample_rate,
            capturing: Arc::new(AtomicBool::new(false)),
            producer: Some(producer),
            stream: None,
        })
    }

    fn build_stream(&mut self) -> Result<cpal::Stream> {
        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let producer = self
            .producer
            .take()
            .ok_or_else(|| SpeakError::AudioCapture {
                message: "ring producer already consumed".to_string(),
            })?;
        let capturing = Arc::clone(&self.capturing);

        let err_callback = |err| {
            tracing::warn!("audio stream error: {}", err);
        };

        self.device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if !capturing.load(Ordering::Relaxed) {
                        return;
                    }
                    // SAFETY: reinterpreting &[i16] as its underlying bytes;
                    // the pointer and length cover exactly the sample slice
                    // and u8 has no alignment requirement. Samples are
                    // little-endian on every target cpal supports here.
                    let bytes = unsafe {
                        std::slice::from_raw_parts(data.as_ptr() as *const u8, data.len() * 2)
                    };
                    // Short writes on a full ring are deliberate: the
                    // callback must never wait for space.
                    let _ = producer.write(bytes);
                },
                err_callback,
                None,
            )
            .map_err(|e| SpeakError::AudioCapture {
                message: format!("Failed to build input stream: {}", e),
            })
    }
}

impl AudioProducer for CpalProducer {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_none() {
            let stream = self.build_stream()?;
            self.stream = Some(SendableStream(stream));
        }

        if let Some(stream) = &self.stream {
            stream.0.play().map_err(|e| SpeakError::AudioCapture {
                message: format!("Failed to start audio stream: {}", e),
            })?;
        }

        self.capturing.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) {
        self.capturing.store(false, Ordering::Release);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.0.pause() {
                tracing::warn!("failed to pause audio stream: {}", e);
            }
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Relaxed)
    }
}

/// Mock audio producer for testing.
///
/// Writes a configured byte sequence into the ring when started, simulating
/// a capture callback that ran for the length of the recording.
pub struct MockAudioProducer {
    producer: RingProducer,
    bytes_on_start: Vec<u8>,
    should_fail_start: bool,
    capturing: bool,
}

impl MockAudioProducer {
    /// Create a mock that injects nothing.
    pub fn new(producer: RingProducer) -> Self {
        Self {
            producer,
            bytes_on_start: Vec::new(),
            should_fail_start: false,
            capturing: false,
        }
    }

    /// Configure the mock to write the given samples into the ring on start.
    pub fn with_samples(mut self, samples: &[i16]) -> Self {
        self.bytes_on_start = samples
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        self
    }

    /// Configure the mock to write raw bytes into the ring on start.
    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.bytes_on_start = bytes;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }
}

impl AudioProducer for MockAudioProducer {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(SpeakError::AudioCapture {
                message: "mock capture failure".to_string(),
            });
        }
        self.capturing = true;
        let _ = self.producer.write(&self.bytes_on_start);
        Ok(())
    }

    fn stop(&mut self) {
        self.capturing = false;
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }
}
