//! Blueprint synthesis: conversation history → structured restoration plan.
//!
//! Always secondary to the chat turn that triggered it. A malformed payload
//! fails with `MalformedBlueprint` and leaves any previous blueprint intact;
//! nothing here ever touches the chat error state.

use crate::error::{CoreError, CoreResult};
use crate::gemini_service::CompletionBackend;
use crate::prompts;
use crate::shared::{ActionStep, Message, RestorationBlueprint, UserProfile};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Provider payload: the four required fields, without the local timestamp.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlueprintPayload {
    root_analysis: String,
    core_shift: String,
    action_steps: Vec<ActionStep>,
    suggested_ritual: String,
}

/// Turns the running conversation into a `RestorationBlueprint` via a
/// schema-constrained structured request.
#[derive(Clone)]
pub struct BlueprintSynthesizer {
    backend: Arc<dyn CompletionBackend>,
    /// Most-recent history entries included in the prompt.
    history_window: usize,
}

impl BlueprintSynthesizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, history_window: usize) -> Self {
        Self {
            backend,
            history_window,
        }
    }

    /// JSON schema the provider must satisfy: four required fields with a
    /// non-empty ordered list of three-field action steps.
    pub fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "rootAnalysis": {
                    "type": "STRING",
                    "description": "A deep dive into the hidden psychological cause of the user's pain."
                },
                "coreShift": {
                    "type": "STRING",
                    "description": "The single most important mindset change required to fix this."
                },
                "actionSteps": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": { "type": "STRING" },
                            "description": { "type": "STRING" },
                            "whyItWorks": {
                                "type": "STRING",
                                "description": "The psychological logic behind this step."
                            }
                        },
                        "required": ["title", "description", "whyItWorks"]
                    }
                },
                "suggestedRitual": {
                    "type": "STRING",
                    "description": "A daily habit to solidify the healing."
                }
            },
            "required": ["rootAnalysis", "coreShift", "actionSteps", "suggestedRitual"]
        })
    }

    /// Synthesize a fresh blueprint from the full role-tagged history,
    /// trimmed to the most recent window.
    pub async fn synthesize(
        &self,
        history: &[Message],
        profile: Option<&UserProfile>,
    ) -> CoreResult<RestorationBlueprint> {
        let start = history.len().saturating_sub(self.history_window);
        let mut transcript = prompts::render_history(&history[start..]);
        if let Some(focus) = profile.and_then(|p| p.main_focus.as_ref()) {
            transcript = format!("(User's chosen focus area: {})\n{}", focus.label(), transcript);
        }
        let prompt = prompts::blueprint_prompt(&transcript);
        debug!(
            "blueprint synthesis over {} of {} history entries",
            history.len() - start,
            history.len()
        );
        let payload = self.backend.structured(&prompt, Self::schema()).await?;
        let parsed: BlueprintPayload = serde_json::from_value(payload)
            .map_err(|e| CoreError::MalformedBlueprint(e.to_string()))?;
        if parsed.action_steps.is_empty() {
            return Err(CoreError::MalformedBlueprint(
                "actionSteps is empty".to_string(),
            ));
        }
        Ok(RestorationBlueprint {
            root_analysis: parsed.root_analysis,
            core_shift: parsed.core_shift,
            action_steps: parsed.action_steps,
            suggested_ritual: parsed.suggested_ritual,
            last_updated: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini_service::CompletionReply;
    use crate::shared::SessionMode;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that records structured prompts and replays a scripted payload.
    struct FakeBackend {
        payload: serde_json::Value,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with_payload(payload: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                payload,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for FakeBackend {
        async fn complete(
            &self,
            _message: &str,
            _history: &[Message],
            _mode: SessionMode,
            _profile: Option<&UserProfile>,
        ) -> CoreResult<CompletionReply> {
            unreachable!("synthesizer never issues chat completions")
        }

        async fn structured(
            &self,
            prompt: &str,
            _schema: serde_json::Value,
        ) -> CoreResult<serde_json::Value> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.payload.clone())
        }
    }

    fn good_payload() -> serde_json::Value {
        json!({
            "rootAnalysis": "unprocessed grief",
            "coreShift": "self-compassion over self-blame",
            "actionSteps": [
                {
                    "title": "Name the feeling",
                    "description": "Write down what you feel each evening.",
                    "whyItWorks": "Labeling reduces amygdala activation."
                },
                {
                    "title": "One small repair",
                    "description": "Send one honest message.",
                    "whyItWorks": "Behavioral activation builds momentum."
                }
            ],
            "suggestedRitual": "Three slow breaths before every meal."
        })
    }

    fn turns(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("user turn {}", i))
                } else {
                    Message::assistant(format!("assistant turn {}", i), None)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_synthesize_parses_ordered_steps() {
        let backend = FakeBackend::with_payload(good_payload());
        let synth = BlueprintSynthesizer::new(backend, 20);
        let bp = synth.synthesize(&turns(4), None).await.unwrap();
        assert_eq!(bp.root_analysis, "unprocessed grief");
        assert_eq!(bp.action_steps.len(), 2);
        assert_eq!(bp.action_steps[0].title, "Name the feeling");
        assert_eq!(bp.action_steps[1].title, "One small repair");
    }

    #[tokio::test]
    async fn test_missing_action_steps_is_malformed() {
        let mut payload = good_payload();
        payload.as_object_mut().unwrap().remove("actionSteps");
        let backend = FakeBackend::with_payload(payload);
        let synth = BlueprintSynthesizer::new(backend, 20);
        let result = synth.synthesize(&turns(4), None).await;
        assert!(matches!(result, Err(CoreError::MalformedBlueprint(_))));
    }

    #[tokio::test]
    async fn test_empty_action_steps_is_malformed() {
        let mut payload = good_payload();
        payload["actionSteps"] = json!([]);
        let backend = FakeBackend::with_payload(payload);
        let synth = BlueprintSynthesizer::new(backend, 20);
        let result = synth.synthesize(&turns(4), None).await;
        assert!(matches!(result, Err(CoreError::MalformedBlueprint(_))));
    }

    #[tokio::test]
    async fn test_non_object_payload_is_malformed() {
        let backend = FakeBackend::with_payload(json!("just a string"));
        let synth = BlueprintSynthesizer::new(backend, 20);
        let result = synth.synthesize(&turns(4), None).await;
        assert!(matches!(result, Err(CoreError::MalformedBlueprint(_))));
    }

    #[tokio::test]
    async fn test_step_missing_rationale_is_malformed() {
        let mut payload = good_payload();
        payload["actionSteps"][0]
            .as_object_mut()
            .unwrap()
            .remove("whyItWorks");
        let backend = FakeBackend::with_payload(payload);
        let synth = BlueprintSynthesizer::new(backend, 20);
        let result = synth.synthesize(&turns(4), None).await;
        assert!(matches!(result, Err(CoreError::MalformedBlueprint(_))));
    }

    #[tokio::test]
    async fn test_history_trimmed_to_window() {
        let backend = FakeBackend::with_payload(good_payload());
        let synth = BlueprintSynthesizer::new(Arc::clone(&backend) as Arc<dyn CompletionBackend>, 2);
        synth.synthesize(&turns(6), None).await.unwrap();
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        // Only the last two turns survive the window.
        assert!(prompts[0].contains("user turn 4"));
        assert!(prompts[0].contains("assistant turn 5"));
        assert!(!prompts[0].contains("user turn 0"));
    }

    #[tokio::test]
    async fn test_focus_area_included_when_present() {
        let backend = FakeBackend::with_payload(good_payload());
        let synth = BlueprintSynthesizer::new(Arc::clone(&backend) as Arc<dyn CompletionBackend>, 20);
        let profile = UserProfile {
            main_focus: Some(crate::shared::FocusArea::TrustReclamation),
            ..UserProfile::default()
        };
        synth.synthesize(&turns(2), Some(&profile)).await.unwrap();
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Trust Reclamation"));
    }

    #[test]
    fn test_schema_requires_all_four_fields() {
        let schema = BlueprintSynthesizer::schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
        assert!(required.contains(&json!("actionSteps")));
    }
}
