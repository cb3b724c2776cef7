//! **Speech synthesis** — best-effort remote text-to-speech.
//!
//! `SpeechBackend` turns assistant text into raw PCM bytes (24 kHz mono
//! little-endian i16, see [`crate::playback`]). Synthesis is an enhancement:
//! every failure path returns `None`, never an error, so a broken speech
//! provider can never degrade the chat session.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_VOICE: &str = "Kore";
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Tone-setting instruction wrapped around every utterance before synthesis.
const TONE_INSTRUCTION: &str = "Speak with clinical empathy and deep warmth";

/// Backend that turns text into raw PCM bytes. `None` means "no audio", not an error.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize text to PCM bytes. Return `None` on any failure or empty input.
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>>;
}

/// Placeholder backend: never produces audio. Use in tests and headless setups.
#[derive(Debug, Default)]
pub struct PlaceholderSpeech;

#[async_trait]
impl SpeechBackend for PlaceholderSpeech {
    async fn synthesize(&self, _text: &str) -> Option<Vec<u8>> {
        None
    }
}

fn tone_wrapped(text: &str) -> String {
    format!("{}: {}", TONE_INSTRUCTION, text)
}

// Gemini generateContent request/response, audio modality only.

#[derive(Serialize)]
struct SpeechRequest {
    contents: Vec<SpeechContent>,
    #[serde(rename = "generationConfig")]
    generation_config: SpeechGenerationConfig,
}

#[derive(Serialize)]
struct SpeechContent {
    role: String,
    parts: Vec<SpeechTextPart>,
}

#[derive(Serialize)]
struct SpeechTextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechGenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Deserialize)]
struct SpeechResponse {
    #[serde(default)]
    candidates: Vec<SpeechCandidate>,
}

#[derive(Deserialize)]
struct SpeechCandidate {
    content: Option<SpeechCandidateContent>,
}

#[derive(Deserialize)]
struct SpeechCandidateContent {
    #[serde(default)]
    parts: Vec<SpeechCandidatePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechCandidatePart {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: Option<String>,
}

/// Remote speech synthesis against the Gemini TTS model.
/// The API key is re-read from the environment on every call so a fixed
/// credential takes effect without reconstruction.
#[derive(Debug, Clone)]
pub struct GeminiSpeech {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

impl GeminiSpeech {
    /// Create a backend with default model and voice; key comes from `GEMINI_API_KEY`.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: GEMINI_API_BASE.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            client,
        }
    }

    /// Override the TTS model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Override the prebuilt voice (default "Kore").
    pub fn with_voice(mut self, voice: &str) -> Self {
        self.voice = voice.to_string();
        self
    }

    /// Use an explicit API key instead of the environment.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the base URL (e.g. for a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn resolve_key(&self) -> Option<String> {
        if let Some(ref k) = self.api_key {
            let k = k.trim();
            if !k.is_empty() {
                return Some(k.to_string());
            }
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn request_body(&self, text: &str) -> SpeechRequest {
        SpeechRequest {
            contents: vec![SpeechContent {
                role: "user".to_string(),
                parts: vec![SpeechTextPart {
                    text: tone_wrapped(text),
                }],
            }],
            generation_config: SpeechGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                },
            },
        }
    }
}

impl Default for GeminiSpeech {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechBackend for GeminiSpeech {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(key) = self.resolve_key() else {
            warn!("speech synthesis skipped: no API key configured");
            return None;
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let res = match self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&self.request_body(text))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("speech synthesis request failed: {}", e);
                return None;
            }
        };
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!("speech synthesis API error {}: {}", status, body);
            return None;
        }
        let parsed: SpeechResponse = match res.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!("speech synthesis response parse failed: {}", e);
                return None;
            }
        };
        let encoded = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.inline_data.as_ref())
            .and_then(|d| d.data.as_ref())?;
        match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                debug!("speech synthesis returned empty audio payload");
                None
            }
            Err(e) => {
                warn!("speech synthesis base64 decode failed: {}", e);
                None
            }
        }
    }
}
