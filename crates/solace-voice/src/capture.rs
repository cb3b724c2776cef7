//! **Voice capture** — wraps a platform speech-to-text capability.
//!
//! A `SpeechRecognizer` streams interim and final transcript fragments over a
//! channel; `VoiceCapture` owns the listening state and accumulates final
//! fragments into text the session can fold into its pending input. Recognizer
//! failures flip listening back to false without escalating.
//!
//! `MicCapture` provides the raw microphone feed (CPAL, fixed-size f32 chunks)
//! that real recognizer implementations consume.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A transcript fragment from the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Non-final fragment; may be revised by later events.
    Interim(String),
    /// Final fragment; safe to append to the input buffer.
    Final(String),
}

/// Platform speech-to-text capability. Implement for a local engine or a
/// remote transcription API; tests use a channel-backed fake.
pub trait SpeechRecognizer: Send {
    /// Begin recognition and return the transcript event stream.
    fn start(&mut self) -> VoiceResult<mpsc::UnboundedReceiver<TranscriptEvent>>;

    /// Stop recognition. The event stream closes afterwards.
    fn stop(&mut self);
}

/// Capture behavior knobs.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Keep listening across utterances (default true).
    pub continuous: bool,
    /// Fold interim fragments into drained text as well (default false:
    /// interims are a display-only concern and are discarded).
    pub accumulate_interim: bool,
    /// Recognition language tag (default "en-US").
    pub language: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            accumulate_interim: false,
            language: "en-US".to_string(),
        }
    }
}

/// Owns a recognizer and its listening state.
pub struct VoiceCapture {
    config: CaptureConfig,
    recognizer: Box<dyn SpeechRecognizer>,
    events: Option<mpsc::UnboundedReceiver<TranscriptEvent>>,
    listening: bool,
}

impl VoiceCapture {
    pub fn new(config: CaptureConfig, recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            config,
            recognizer,
            events: None,
            listening: false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Start listening. No-op when already listening. A recognizer failure
    /// leaves listening false and returns the error for the caller to log.
    pub fn start(&mut self) -> VoiceResult<()> {
        if self.listening {
            return Ok(());
        }
        match self.recognizer.start() {
            Ok(rx) => {
                self.events = Some(rx);
                self.listening = true;
                info!("voice capture started ({})", self.config.language);
                Ok(())
            }
            Err(e) => {
                self.listening = false;
                Err(e)
            }
        }
    }

    /// Stop listening. No-op when not listening.
    pub fn stop(&mut self) {
        if self.listening {
            self.recognizer.stop();
            self.listening = false;
            info!("voice capture stopped");
        }
    }

    /// Toggle listening; returns the new listening state.
    pub fn toggle(&mut self) -> VoiceResult<bool> {
        if self.listening {
            self.stop();
        } else {
            self.start()?;
        }
        Ok(self.listening)
    }

    /// Drain all pending transcript events and return the accumulated text.
    /// Final fragments are always kept; interim fragments only when
    /// configured. A closed event stream flips listening back to false.
    pub fn drain(&mut self) -> String {
        let Some(rx) = self.events.as_mut() else {
            return String::new();
        };
        let mut out = String::new();
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(TranscriptEvent::Final(text)) => push_fragment(&mut out, &text),
                Ok(TranscriptEvent::Interim(text)) => {
                    if self.config.accumulate_interim {
                        push_fragment(&mut out, &text);
                    } else {
                        debug!("discarding interim transcript fragment");
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            self.events = None;
            if self.listening {
                warn!("recognizer stream ended; capture no longer listening");
                self.listening = false;
            }
        }
        out
    }
}

fn push_fragment(buffer: &mut String, fragment: &str) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(fragment);
}

/// Microphone configuration for recognizer front-ends.
#[derive(Debug, Clone)]
pub struct MicConfig {
    /// Sample rate in Hz (default 16000).
    pub sample_rate: u32,
    /// Number of channels (default 1 for mono).
    pub channels: u16,
    /// Chunk size in samples (default 480 = 30ms at 16kHz).
    pub chunk_size: usize,
}

impl Default for MicConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            chunk_size: 480,
        }
    }
}

/// Raw microphone capture over CPAL. Streams fixed-size f32 chunks to a
/// channel; recognizer implementations consume them.
pub struct MicCapture {
    config: MicConfig,
    device: Device,
    stream_config: StreamConfig,
}

impl MicCapture {
    /// Bind the default input device. Absence of a device is the
    /// capability-unavailable case, not a fatal error.
    pub fn new(config: MicConfig) -> VoiceResult<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::AudioDevice("no input device available".to_string()))?;
        info!(
            "MicCapture: using input device {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );
        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.chunk_size as u32),
        };
        Ok(Self {
            config,
            device,
            stream_config,
        })
    }

    /// Start the input stream; chunks of `chunk_size` samples flow into the
    /// channel. Keep the returned `Stream` alive to keep capture running.
    pub fn start(self, chunk_tx: mpsc::UnboundedSender<Vec<f32>>) -> VoiceResult<Stream> {
        let chunk_size = self.config.chunk_size;
        let mut sample_buffer = Vec::with_capacity(chunk_size);
        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    sample_buffer.push(sample);
                    if sample_buffer.len() >= chunk_size {
                        if chunk_tx.send(std::mem::take(&mut sample_buffer)).is_err() {
                            return;
                        }
                        sample_buffer.reserve(chunk_size);
                    }
                }
            },
            move |err| {
                warn!("microphone stream error: {}", err);
            },
            None,
        )?;
        stream.play()?;
        info!("MicCapture: stream started");
        Ok(stream)
    }

    /// List available input devices.
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.input_devices()? {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Channel-backed recognizer: the test feeds events through a held sender.
    struct FakeRecognizer {
        sender: std::sync::Arc<std::sync::Mutex<Option<mpsc::UnboundedSender<TranscriptEvent>>>>,
        fail_start: bool,
    }

    impl FakeRecognizer {
        fn new() -> (
            Self,
            std::sync::Arc<std::sync::Mutex<Option<mpsc::UnboundedSender<TranscriptEvent>>>>,
        ) {
            let slot = std::sync::Arc::new(std::sync::Mutex::new(None));
            (
                Self {
                    sender: slot.clone(),
                    fail_start: false,
                },
                slot,
            )
        }

        fn failing() -> Self {
            Self {
                sender: std::sync::Arc::new(std::sync::Mutex::new(None)),
                fail_start: true,
            }
        }
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn start(&mut self) -> VoiceResult<mpsc::UnboundedReceiver<TranscriptEvent>> {
            if self.fail_start {
                return Err(VoiceError::Unavailable(
                    "speech recognition not supported".to_string(),
                ));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        fn stop(&mut self) {
            *self.sender.lock().unwrap() = None;
        }
    }

    fn send(
        slot: &std::sync::Arc<std::sync::Mutex<Option<mpsc::UnboundedSender<TranscriptEvent>>>>,
        event: TranscriptEvent,
    ) {
        slot.lock().unwrap().as_ref().unwrap().send(event).unwrap();
    }

    #[test]
    fn test_start_stop_toggle() {
        let (rec, _slot) = FakeRecognizer::new();
        let mut capture = VoiceCapture::new(CaptureConfig::default(), Box::new(rec));
        assert!(!capture.is_listening());
        assert!(capture.toggle().unwrap());
        assert!(capture.is_listening());
        assert!(!capture.toggle().unwrap());
        assert!(!capture.is_listening());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (rec, _slot) = FakeRecognizer::new();
        let mut capture = VoiceCapture::new(CaptureConfig::default(), Box::new(rec));
        capture.start().unwrap();
        capture.start().unwrap();
        assert!(capture.is_listening());
    }

    #[test]
    fn test_failed_start_leaves_not_listening() {
        let mut capture =
            VoiceCapture::new(CaptureConfig::default(), Box::new(FakeRecognizer::failing()));
        assert!(capture.start().is_err());
        assert!(!capture.is_listening());
    }

    #[test]
    fn test_drain_keeps_finals_discards_interims() {
        let (rec, slot) = FakeRecognizer::new();
        let mut capture = VoiceCapture::new(CaptureConfig::default(), Box::new(rec));
        capture.start().unwrap();
        send(&slot, TranscriptEvent::Interim("i fee".to_string()));
        send(&slot, TranscriptEvent::Final("I feel lost".to_string()));
        send(&slot, TranscriptEvent::Final("today".to_string()));
        assert_eq!(capture.drain(), "I feel lost today");
    }

    #[test]
    fn test_drain_accumulates_interims_when_configured() {
        let (rec, slot) = FakeRecognizer::new();
        let config = CaptureConfig {
            accumulate_interim: true,
            ..CaptureConfig::default()
        };
        let mut capture = VoiceCapture::new(config, Box::new(rec));
        capture.start().unwrap();
        send(&slot, TranscriptEvent::Interim("partial".to_string()));
        send(&slot, TranscriptEvent::Final("done".to_string()));
        assert_eq!(capture.drain(), "partial done");
    }

    #[test]
    fn test_closed_stream_flips_listening_off() {
        let (rec, slot) = FakeRecognizer::new();
        let mut capture = VoiceCapture::new(CaptureConfig::default(), Box::new(rec));
        capture.start().unwrap();
        send(&slot, TranscriptEvent::Final("last words".to_string()));
        // Recognizer dies: sender dropped.
        *slot.lock().unwrap() = None;
        assert_eq!(capture.drain(), "last words");
        assert!(!capture.is_listening());
    }

    #[test]
    fn test_drain_without_start_is_empty() {
        let (rec, _slot) = FakeRecognizer::new();
        let mut capture = VoiceCapture::new(CaptureConfig::default(), Box::new(rec));
        assert_eq!(capture.drain(), "");
    }
}
