//! Shared data model for a Solace session: messages, profile, mode, and the
//! restoration blueprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when serializing history into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in the session's append-only message log. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Reasoning trace from the provider; assistant messages in DEEP mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Whether the message originated from voice input.
    #[serde(default)]
    pub is_audio: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            thinking: None,
            is_audio: false,
        }
    }

    pub fn assistant(content: impl Into<String>, thinking: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            thinking,
            is_audio: false,
        }
    }
}

/// Request shaping for a single turn. Session-scoped and user-switchable;
/// never affects past messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionMode {
    /// Low-latency, shallow reasoning.
    #[default]
    Fast,
    /// Extended reasoning budget; may surface a reasoning trace.
    Deep,
    /// Reserved. Request shaping falls back to the fast model.
    Voice,
}

/// Primary focus area chosen during profile setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusArea {
    Relationships,
    TrustReclamation,
    InnerEquanimity,
    PathAhead,
    Anxiety,
    Grief,
}

impl FocusArea {
    /// Human-readable label, used in prompts and the welcome message.
    pub fn label(&self) -> &'static str {
        match self {
            FocusArea::Relationships => "Restoring the Union",
            FocusArea::TrustReclamation => "Trust Reclamation",
            FocusArea::InnerEquanimity => "Inner Equanimity",
            FocusArea::PathAhead => "The Path Ahead",
            FocusArea::Anxiety => "Calming Anxiety",
            FocusArea::Grief => "Moving Through Grief",
        }
    }
}

impl std::fmt::Display for FocusArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only input to every completion request. Collected externally,
/// persisted as a JSON blob; never mutated by the session core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_focus: Option<FocusArea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One ordered step of the blueprint. All three fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub title: String,
    pub description: String,
    pub why_it_works: String,
}

/// Structured improvement plan derived from the running conversation.
/// Regenerated wholesale; the superseded version is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationBlueprint {
    pub root_analysis: String,
    pub core_shift: String,
    pub action_steps: Vec<ActionStep>,
    pub suggested_ritual: String,
    pub last_updated: DateTime<Utc>,
}
