//! # Solace Voice - adapters for the spoken side of a session
//!
//! Leaf crate with no internal dependencies. Three capabilities, each
//! consumable on its own:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Session (solace-core)                │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │
//! │  │ VoiceCapture │  │ SpeechBackend│  │  PcmPlayer   │   │
//! │  │ (recognizer  │  │ (remote TTS, │  │ (24kHz mono  │   │
//! │  │  + mic/cpal) │  │  best-effort)│  │  PCM, rodio) │   │
//! │  └──────────────┘  └──────────────┘  └──────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every adapter degrades gracefully: missing devices and provider failures
//! are reported as non-fatal, never panics.

pub mod capture;
pub mod error;
pub mod playback;
pub mod tts;

pub use capture::{
    CaptureConfig, MicCapture, MicConfig, SpeechRecognizer, TranscriptEvent, VoiceCapture,
};
pub use error::{VoiceError, VoiceResult};
pub use playback::{decode_pcm16, PcmPlayer, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
pub use tts::{GeminiSpeech, PlaceholderSpeech, SpeechBackend};
