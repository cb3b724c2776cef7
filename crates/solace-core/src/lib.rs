//! solace-core: session orchestration for an emotional-support companion.
//!
//! Owns the conversation (message log, mode, faults), talks to the Gemini
//! generateContent API for chat completions and structured blueprint
//! synthesis, and persists profile/blueprint state through a sled-backed
//! store. Voice capture and playback live in `solace-voice`; this crate
//! drives their lifecycle from the session.

mod blueprint;
mod config;
mod error;
mod gemini_service;
mod memory;
mod session;
mod shared;
pub mod prompts;

// Shared session data model
pub use shared::{
    ActionStep, FocusArea, Message, RestorationBlueprint, Role, SessionMode, UserProfile,
};

// Configuration
pub use config::CoreConfig;

// Errors
pub use error::{CoreError, CoreResult};

// Completion client
pub use gemini_service::{CompletionBackend, CompletionReply, GeminiClient, GEMINI_API_BASE};

// Blueprint synthesis
pub use blueprint::BlueprintSynthesizer;

// Persistence
pub use memory::{MemoryStore, BLUEPRINT_KEY, DEFAULT_VAULT_PATH, PROFILE_KEY};

// Session orchestration
pub use session::{FaultKind, SessionFault, SessionOrchestrator};
