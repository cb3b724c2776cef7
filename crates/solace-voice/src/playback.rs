//! **PCM playback** — turn provider audio bytes into sound.
//!
//! The speech provider returns raw little-endian 16-bit signed PCM, mono, at
//! 24 kHz. `decode_pcm16` normalizes it to f32 samples and `PcmPlayer` plays
//! it through a `rodio::Sink` on the default output device. Playback is
//! fire-and-forget; callers that need a kill-switch use `stop()`.

use crate::error::{VoiceError, VoiceResult};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::info;

/// Sample rate of provider speech audio in Hz.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Provider speech audio is mono.
pub const SPEECH_CHANNELS: u16 = 1;

/// Decode little-endian 16-bit signed mono PCM into normalized f32 samples (-1.0..1.0).
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            f32::from(sample) / 32768.0
        })
        .collect()
}

/// Plays decoded speech audio through the default output device.
pub struct PcmPlayer {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Sink,
}

impl PcmPlayer {
    /// Create a player on the default output device.
    pub fn new() -> VoiceResult<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        info!("PcmPlayer: sink ready ({}Hz mono)", SPEECH_SAMPLE_RATE);
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink,
        })
    }

    /// Queue raw PCM bytes for playback and return immediately. No-op on empty input.
    pub fn play(&self, bytes: &[u8]) -> VoiceResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let samples = decode_pcm16(bytes);
        if samples.is_empty() {
            return Err(VoiceError::Playback(
                "no decodable samples in audio payload".to_string(),
            ));
        }
        let source = SamplesBuffer::new(SPEECH_CHANNELS, SPEECH_SAMPLE_RATE, samples);
        self.sink.append(source);
        Ok(())
    }

    /// Whether the sink currently has queued samples (playing or pending).
    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }

    /// Stop playback immediately and clear the queue.
    pub fn stop(&self) {
        self.sink.stop();
        info!("PcmPlayer: stopped");
    }

    /// Block until all currently queued audio has finished (for tests).
    pub fn sleep_until_end(&self) {
        self.sink.sleep_until_end();
    }
}
