//! Remote completion client for the Gemini `generateContent` API.
//!
//! One client instance is constructed explicitly and injected into the
//! session (no shared global), so tests substitute a fake behind
//! [`CompletionBackend`]. The credential is resolved freshly on every call;
//! response fields are modelled as explicit `Option`s and parsed fail-closed.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::prompts;
use crate::shared::{Message, Role, SessionMode, UserProfile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One completed provider exchange: the answer text plus any reasoning trace.
#[derive(Debug, Clone)]
pub struct CompletionReply {
    pub text: String,
    pub thinking: Option<String>,
}

/// Seam to the remote model. The session and the blueprint synthesizer only
/// see this trait; production wires in [`GeminiClient`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// One chat turn: prior history plus the new user message, shaped by mode
    /// and profile.
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
        mode: SessionMode,
        profile: Option<&UserProfile>,
    ) -> CoreResult<CompletionReply>;

    /// Schema-constrained structured response for a single prompt.
    async fn structured(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> CoreResult<serde_json::Value>;
}

// Request wire types (camelCase per the provider API).

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<InstructionContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct InstructionContent {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

// Response wire types. Every field is optional; absence never panics.

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

/// Map prior history plus the new user message into the provider transcript:
/// original order, `user` straight through, `assistant` becomes `model`.
fn map_history(history: &[Message], message: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|m| Content {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "model".to_string(),
            },
            parts: vec![TextPart {
                text: m.content.clone(),
            }],
        })
        .collect();
    contents.push(Content {
        role: "user".to_string(),
        parts: vec![TextPart {
            text: message.to_string(),
        }],
    });
    contents
}

/// Split response parts into answer text and (DEEP only) a reasoning trace.
/// FAST drops thought parts even when the provider returns them.
fn split_reply(parts: &[CandidatePart], mode: SessionMode) -> (String, Option<String>) {
    let mut answer = String::new();
    let mut thinking = String::new();
    for part in parts {
        let Some(ref text) = part.text else { continue };
        if part.thought {
            if !thinking.is_empty() {
                thinking.push('\n');
            }
            thinking.push_str(text);
        } else {
            answer.push_str(text);
        }
    }
    let thinking = match mode {
        SessionMode::Deep if !thinking.trim().is_empty() => Some(thinking),
        _ => None,
    };
    (answer, thinking)
}

/// Production completion client.
pub struct GeminiClient {
    config: CoreConfig,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: CoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            base_url: GEMINI_API_BASE.to_string(),
            client,
        }
    }

    /// Override the base URL (e.g. for a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn model_for(&self, mode: SessionMode) -> &str {
        match mode {
            SessionMode::Deep => &self.config.deep_model,
            // VOICE is reserved; shape like FAST.
            SessionMode::Fast | SessionMode::Voice => &self.config.fast_model,
        }
    }

    async fn generate(&self, model: &str, body: &GenerateRequest) -> CoreResult<GenerateResponse> {
        let key = self
            .config
            .resolve_api_key()
            .ok_or(CoreError::CredentialMissing)?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::ProviderTimeout
                } else {
                    CoreError::Provider(format!("request failed: {}", e))
                }
            })?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!("API error {}: {}", status, body)));
        }
        res.json()
            .await
            .map_err(|e| CoreError::Provider(format!("response parse failed: {}", e)))
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
        mode: SessionMode,
        profile: Option<&UserProfile>,
    ) -> CoreResult<CompletionReply> {
        let model = self.model_for(mode);
        let thinking_config = match mode {
            SessionMode::Deep => Some(ThinkingConfig {
                thinking_budget: self.config.thinking_budget,
            }),
            _ => None,
        };
        let body = GenerateRequest {
            contents: map_history(history, message),
            system_instruction: Some(InstructionContent {
                parts: vec![TextPart {
                    text: prompts::system_instruction(profile),
                }],
            }),
            generation_config: thinking_config.map(|tc| GenerationConfig {
                thinking_config: Some(tc),
                response_mime_type: None,
                response_schema: None,
            }),
        };
        debug!(
            "completion request: model={} history_len={} mode={:?}",
            model,
            history.len(),
            mode
        );
        let response = self.generate(model, &body).await?;
        let parts = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[]);
        let (text, thinking) = split_reply(parts, mode);
        if text.trim().is_empty() {
            warn!("provider returned no usable answer text");
            return Err(CoreError::EmptyCompletion);
        }
        Ok(CompletionReply { text, thinking })
    }

    async fn structured(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> CoreResult<serde_json::Value> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                thinking_config: None,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
            }),
        };
        let response = self.generate(&self.config.fast_model, &body).await?;
        let parts = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[]);
        let (text, _) = split_reply(parts, SessionMode::Fast);
        if text.trim().is_empty() {
            return Err(CoreError::EmptyCompletion);
        }
        serde_json::from_str(&text)
            .map_err(|e| CoreError::MalformedBlueprint(format!("not valid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_history_roles_and_order() {
        let history = vec![
            Message::assistant("welcome", None),
            Message::user("help me"),
            Message::assistant("of course", None),
        ];
        let contents = map_history(&history, "new message");
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role, "model");
        assert_eq!(contents[1].role, "user");
        assert_eq!(contents[2].role, "model");
        assert_eq!(contents[3].role, "user");
        assert_eq!(contents[3].parts[0].text, "new message");
    }

    #[test]
    fn test_map_empty_history_is_single_message() {
        let contents = map_history(&[], "hello");
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
    }

    #[test]
    fn test_split_reply_deep_extracts_thinking() {
        let parts = vec![
            CandidatePart {
                text: Some("reasoning here".to_string()),
                thought: true,
            },
            CandidatePart {
                text: Some("the answer".to_string()),
                thought: false,
            },
        ];
        let (text, thinking) = split_reply(&parts, SessionMode::Deep);
        assert_eq!(text, "the answer");
        assert_eq!(thinking.as_deref(), Some("reasoning here"));
    }

    #[test]
    fn test_split_reply_fast_drops_thinking() {
        let parts = vec![
            CandidatePart {
                text: Some("reasoning here".to_string()),
                thought: true,
            },
            CandidatePart {
                text: Some("the answer".to_string()),
                thought: false,
            },
        ];
        let (text, thinking) = split_reply(&parts, SessionMode::Fast);
        assert_eq!(text, "the answer");
        assert!(thinking.is_none());
    }

    #[test]
    fn test_split_reply_textless_parts_ignored() {
        let parts = vec![CandidatePart {
            text: None,
            thought: false,
        }];
        let (text, thinking) = split_reply(&parts, SessionMode::Deep);
        assert!(text.is_empty());
        assert!(thinking.is_none());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let body = GenerateRequest {
            contents: map_history(&[], "hi"),
            system_instruction: Some(InstructionContent {
                parts: vec![TextPart {
                    text: "sys".to_string(),
                }],
            }),
            generation_config: Some(GenerationConfig {
                thinking_config: Some(ThinkingConfig {
                    thinking_budget: 32_768,
                }),
                response_mime_type: None,
                response_schema: None,
            }),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(
            v["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            32_768
        );
        assert!(v["systemInstruction"]["parts"][0]["text"].is_string());
        assert!(v.get("generation_config").is_none());
    }

    #[test]
    fn test_fast_request_has_no_generation_config() {
        let client = GeminiClient::new(CoreConfig::default());
        assert_eq!(client.model_for(SessionMode::Fast), "gemini-3-flash-preview");
        assert_eq!(client.model_for(SessionMode::Deep), "gemini-3-pro-preview");
        assert_eq!(
            client.model_for(SessionMode::Voice),
            "gemini-3-flash-preview"
        );
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_network() {
        let config = CoreConfig {
            api_key_env: "SOLACE_TEST_NO_KEY_2208".to_string(),
            ..CoreConfig::default()
        };
        let client = GeminiClient::new(config).with_base_url("http://127.0.0.1:1");
        let result = client.complete("hi", &[], SessionMode::Fast, None).await;
        assert!(matches!(result, Err(CoreError::CredentialMissing)));
    }

    #[test]
    fn test_response_parses_with_missing_fields() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());

        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert!(parsed.candidates[0].content.is_none());

        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hi","thought":false}]}}]}"#,
        )
        .unwrap();
        let parts = &parsed.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts[0].text.as_deref(), Some("hi"));
    }
}
