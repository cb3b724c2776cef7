//! **Session orchestration** — the single owner of conversation state.
//!
//! Coordinates turn-taking with the completion backend, blueprint
//! regeneration cadence, and the voice input/output lifecycle. All mutation
//! happens through `&mut self` on one task; the loading flag serializes
//! sends, so responses apply in the order their requests were issued.
//!
//! Blueprint synthesis is spawned fire-and-forget after a successful turn:
//! it may still be running when the next turn starts, concurrent syntheses
//! are not guarded, and the latest to finish wins the shared slot.

use crate::blueprint::BlueprintSynthesizer;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gemini_service::CompletionBackend;
use crate::prompts;
use crate::shared::{Message, RestorationBlueprint, SessionMode, UserProfile};
use solace_voice::{PcmPlayer, SpeechBackend, VoiceCapture};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Blueprint regeneration starts once the pre-turn log has this many entries.
const BLUEPRINT_MIN_LOG: usize = 2;

const CREDENTIAL_FAULT_MESSAGE: &str =
    "API configuration needs adjustment. Please ensure a valid API key is selected.";
const CONNECTION_FAULT_MESSAGE: &str =
    "I'm having trouble connecting right now. Please check your internet and try again.";
const VOICE_UNSUPPORTED_MESSAGE: &str = "Voice recognition is not supported on this device.";

/// Classification of the single current fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// No provider credential configured; fixable without restart.
    Credential,
    /// Transient provider/network trouble; retryable by resending.
    Connection,
    /// A voice capability is absent on this platform; non-fatal.
    Capability,
}

/// The single current user-facing error. Replaced, never queued; cleared
/// when a new send begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFault {
    pub kind: FaultKind,
    pub message: String,
}

fn classify(err: &CoreError) -> SessionFault {
    match err {
        CoreError::CredentialMissing => SessionFault {
            kind: FaultKind::Credential,
            message: CREDENTIAL_FAULT_MESSAGE.to_string(),
        },
        _ => SessionFault {
            kind: FaultKind::Connection,
            message: CONNECTION_FAULT_MESSAGE.to_string(),
        },
    }
}

/// Owns the message log, mode, loading/fault state, and the voice lifecycle.
/// All collaborators are injected at construction so tests substitute fakes.
pub struct SessionOrchestrator {
    config: CoreConfig,
    backend: Arc<dyn CompletionBackend>,
    synthesizer: BlueprintSynthesizer,
    speech: Arc<dyn SpeechBackend>,
    player: Option<PcmPlayer>,
    capture: Option<VoiceCapture>,
    profile: Option<UserProfile>,
    messages: Vec<Message>,
    mode: SessionMode,
    loading: bool,
    speaking: bool,
    fault: Option<SessionFault>,
    pending_input: String,
    blueprint: Arc<Mutex<Option<RestorationBlueprint>>>,
    synthesis: Option<JoinHandle<()>>,
}

impl SessionOrchestrator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        speech: Arc<dyn SpeechBackend>,
        config: CoreConfig,
    ) -> Self {
        let synthesizer = BlueprintSynthesizer::new(Arc::clone(&backend), config.history_window);
        Self {
            config,
            backend,
            synthesizer,
            speech,
            player: None,
            capture: None,
            profile: None,
            messages: Vec::new(),
            mode: SessionMode::Fast,
            loading: false,
            speaking: false,
            fault: None,
            pending_input: String::new(),
            blueprint: Arc::new(Mutex::new(None)),
            synthesis: None,
        }
    }

    /// Attach an output device. Without one, synthesized audio is dropped.
    pub fn with_player(mut self, player: PcmPlayer) -> Self {
        self.player = Some(player);
        self
    }

    /// Attach voice capture. Without one, the feature silently disables
    /// itself and `toggle_voice_capture` reports a capability fault.
    pub fn with_capture(mut self, capture: VoiceCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Start a fresh session: a single personalized welcome message, FAST
    /// mode, no fault. The previous log is discarded.
    pub fn initialize(&mut self, profile: Option<UserProfile>) {
        self.profile = profile;
        self.messages.clear();
        self.messages.push(Message::assistant(
            prompts::welcome_message(self.profile.as_ref()),
            None,
        ));
        self.mode = SessionMode::Fast;
        self.loading = false;
        self.fault = None;
        self.pending_input.clear();
        match self.capture {
            Some(_) => debug!("voice capture available"),
            None => debug!("voice capture absent; feature disabled"),
        }
        info!("session initialized");
    }

    /// Switch request shaping for subsequent turns. Past messages are never
    /// affected. Selecting DEEP without a credential logs an advisory only;
    /// the actual gate is the next call's lazy credential check.
    pub fn set_mode(&mut self, mode: SessionMode) {
        if mode == SessionMode::Deep && self.config.resolve_api_key().is_none() {
            warn!("deep mode selected without a configured credential");
        }
        self.mode = mode;
    }

    /// One chat turn. No-op on blank input or while a request is in flight.
    /// Failures are classified into the fault slot; the loading flag is
    /// cleared on every path.
    pub async fn send_message(&mut self, text: &str) {
        let text = text.trim().to_string();
        if text.is_empty() {
            debug!("ignoring blank message");
            return;
        }
        if self.loading {
            debug!("completion already in flight; ignoring send");
            return;
        }
        if let Some(capture) = self.capture.as_mut() {
            capture.stop();
        }
        self.fault = None;
        let pre_turn_len = self.messages.len();
        // The synthesized welcome (index 0 after initialize) is a UI artifact
        // and stays out of the provider transcript.
        let prior: Vec<Message> = self.messages.iter().skip(1).cloned().collect();
        self.messages.push(Message::user(text.clone()));
        self.loading = true;

        let result = self
            .backend
            .complete(&text, &prior, self.mode, self.profile.as_ref())
            .await;
        match result {
            Ok(reply) => {
                let thinking = match self.mode {
                    SessionMode::Deep => reply.thinking,
                    _ => None,
                };
                self.messages.push(Message::assistant(reply.text, thinking));
                if pre_turn_len >= BLUEPRINT_MIN_LOG {
                    self.spawn_blueprint_synthesis();
                }
            }
            Err(err) => {
                warn!("completion failed: {}", err);
                self.fault = Some(classify(&err));
            }
        }
        self.loading = false;
    }

    /// Regenerate the blueprint in the background over the updated history.
    /// The previous task, if still running, is left to finish; the slot is
    /// last-write-wins.
    fn spawn_blueprint_synthesis(&mut self) {
        let synthesizer = self.synthesizer.clone();
        let history: Vec<Message> = self.messages.iter().skip(1).cloned().collect();
        let profile = self.profile.clone();
        let slot = Arc::clone(&self.blueprint);
        self.synthesis = Some(tokio::spawn(async move {
            match synthesizer.synthesize(&history, profile.as_ref()).await {
                Ok(blueprint) => {
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(blueprint);
                        info!("restoration blueprint updated");
                    }
                }
                Err(e) => {
                    warn!("blueprint synthesis failed (chat turn unaffected): {}", e);
                }
            }
        }));
    }

    /// Start or stop voice capture. An absent or failing capability raises a
    /// non-fatal capability fault.
    pub fn toggle_voice_capture(&mut self) {
        match self.capture.as_mut() {
            None => {
                self.fault = Some(SessionFault {
                    kind: FaultKind::Capability,
                    message: VOICE_UNSUPPORTED_MESSAGE.to_string(),
                });
            }
            Some(capture) => {
                if capture.is_listening() {
                    capture.stop();
                } else if let Err(e) = capture.start() {
                    warn!("voice capture failed to start: {}", e);
                    self.fault = Some(SessionFault {
                        kind: FaultKind::Capability,
                        message: VOICE_UNSUPPORTED_MESSAGE.to_string(),
                    });
                }
            }
        }
    }

    /// Fold newly finalized transcript fragments into the pending input
    /// buffer and return it. Transcribed text is never auto-sent.
    pub fn drain_transcripts(&mut self) -> &str {
        if let Some(capture) = self.capture.as_mut() {
            let text = capture.drain();
            if !text.is_empty() {
                if !self.pending_input.is_empty() {
                    self.pending_input.push(' ');
                }
                self.pending_input.push_str(&text);
            }
        }
        &self.pending_input
    }

    /// Take the pending input buffer, leaving it empty.
    pub fn take_pending_input(&mut self) -> String {
        std::mem::take(&mut self.pending_input)
    }

    /// Speak one message aloud. At most one playback at a time; re-entrant
    /// requests are ignored. Synthesis/playback failures are logged and
    /// swallowed, never surfaced as chat faults.
    pub async fn speak(&mut self, message_id: Uuid) {
        if self.speaking || self.player.as_ref().is_some_and(|p| p.is_playing()) {
            debug!("playback already in flight; ignoring speak request");
            return;
        }
        let Some(text) = self
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.content.clone())
        else {
            warn!("speak requested for unknown message {}", message_id);
            return;
        };
        self.speaking = true;
        match self.speech.synthesize(&text).await {
            Some(bytes) => {
                if let Some(player) = self.player.as_ref() {
                    if let Err(e) = player.play(&bytes) {
                        warn!("audio playback failed: {}", e);
                    }
                } else {
                    debug!("no output device; dropping synthesized audio");
                }
            }
            None => debug!("speech synthesis produced no audio"),
        }
        self.speaking = false;
    }

    // -- State accessors --

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn fault(&self) -> Option<&SessionFault> {
        self.fault.as_ref()
    }

    /// Current blueprint, if any synthesis has completed.
    pub fn blueprint(&self) -> Option<RestorationBlueprint> {
        self.blueprint.lock().ok().and_then(|g| g.clone())
    }

    /// Shared blueprint slot, for wiring persistence outside the session.
    pub fn blueprint_slot(&self) -> Arc<Mutex<Option<RestorationBlueprint>>> {
        Arc::clone(&self.blueprint)
    }
}
