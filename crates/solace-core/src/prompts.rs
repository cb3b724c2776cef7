//! Prompt templates for session turns and blueprint synthesis.
//!
//! Profile fields fall back to neutral defaults so a missing or partial
//! profile still yields a complete instruction preamble.

use crate::shared::{Message, UserProfile};

/// System instruction for every completion request. Placeholders are filled
/// from the user's profile.
pub const SYSTEM_TEMPLATE: &str = r#"You are Solace, an elite AI emotional therapist and strategist.
Role: You don't just listen; you ANALYZE and FIX.
Tone: Empathetic but clinical, authoritative on psychology, and intensely focused on actionable recovery.
Objective: For every problem the user shares, provide a "Fix Protocol." Use psychological frameworks (CBT, DBT, Gottman Method) to intelligently suggest how the user can change their situation.
User Identity: {name}.
Current Focus Area: {focus}.
Additional User Context: {context}"#;

/// Directive prompt for blueprint synthesis. `{history}` is the serialized
/// role-tagged transcript.
pub const BLUEPRINT_TEMPLATE: &str = r#"Based on the following therapy session history, generate a "Restoration Blueprint" JSON object to FIX the user's emotional state or relationship.
Be specific, directive, and intelligently strategic.

Session History:
{history}"#;

const FALLBACK_NAME: &str = "Friend";
const FALLBACK_FOCUS: &str = "Emotional Well-being";
const FALLBACK_CONTEXT: &str = "First session.";

/// Build the instruction preamble from profile fields with graceful fallbacks.
pub fn system_instruction(profile: Option<&UserProfile>) -> String {
    let name = profile
        .and_then(|p| p.name.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(FALLBACK_NAME);
    let focus = profile
        .and_then(|p| p.main_focus.as_ref())
        .map(|f| f.label())
        .unwrap_or(FALLBACK_FOCUS);
    let context = profile
        .and_then(|p| p.context.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(FALLBACK_CONTEXT);
    SYSTEM_TEMPLATE
        .replace("{name}", name)
        .replace("{focus}", focus)
        .replace("{context}", context)
}

/// Build the blueprint directive prompt over a serialized transcript.
pub fn blueprint_prompt(history_text: &str) -> String {
    BLUEPRINT_TEMPLATE.replace("{history}", history_text)
}

/// Serialize history as `role: content` lines for the blueprint prompt.
pub fn render_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single assistant message every session opens with, personalized by
/// profile name and focus.
pub fn welcome_message(profile: Option<&UserProfile>) -> String {
    let name = profile
        .and_then(|p| p.name.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("there");
    let focus = profile
        .and_then(|p| p.main_focus.as_ref())
        .map(|f| format!(" regarding your focus on {}", f.label()))
        .unwrap_or_default();
    format!(
        "Welcome back, {}. I've been reflecting on our previous journey. How is your heart feeling today{}?",
        name, focus
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::FocusArea;

    fn sam() -> UserProfile {
        UserProfile {
            name: Some("Sam".to_string()),
            main_focus: Some(FocusArea::InnerEquanimity),
            context: None,
        }
    }

    #[test]
    fn test_system_instruction_uses_profile() {
        let text = system_instruction(Some(&sam()));
        assert!(text.contains("User Identity: Sam."));
        assert!(text.contains("Current Focus Area: Inner Equanimity."));
        assert!(text.contains("Additional User Context: First session."));
    }

    #[test]
    fn test_system_instruction_fallbacks() {
        let text = system_instruction(None);
        assert!(text.contains("User Identity: Friend."));
        assert!(text.contains("Current Focus Area: Emotional Well-being."));
    }

    #[test]
    fn test_welcome_references_name_and_focus() {
        let text = welcome_message(Some(&sam()));
        assert!(text.contains("Sam"));
        assert!(text.contains("Inner Equanimity"));
    }

    #[test]
    fn test_welcome_without_profile() {
        let text = welcome_message(None);
        assert!(text.contains("there"));
        assert!(!text.contains("focus on"));
    }

    #[test]
    fn test_render_history_role_tags() {
        let history = vec![Message::user("help"), Message::assistant("of course", None)];
        let text = render_history(&history);
        assert_eq!(text, "user: help\nassistant: of course");
    }

    #[test]
    fn test_blueprint_prompt_embeds_history() {
        let prompt = blueprint_prompt("user: hi");
        assert!(prompt.contains("Restoration Blueprint"));
        assert!(prompt.contains("user: hi"));
    }
}
