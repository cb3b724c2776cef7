//! Core configuration loaded from the environment.
//!
//! Model selection, reasoning budget, history trimming, and the request
//! timeout. The provider credential is never stored resolved: it is re-read
//! on every call so a fixed key takes effect without restart.

use serde::{Deserialize, Serialize};

const DEFAULT_FAST_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_DEEP_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_THINKING_BUDGET: u32 = 32_768;
const DEFAULT_HISTORY_WINDOW: usize = 20;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Core configuration.
///
/// | Env | Default | Description |
/// |-----|---------|--------------|
/// | SOLACE_FAST_MODEL | gemini-3-flash-preview | Model for FAST turns. |
/// | SOLACE_DEEP_MODEL | gemini-3-pro-preview | Model for DEEP turns. |
/// | SOLACE_THINKING_BUDGET | 32768 | Extended reasoning budget for DEEP. |
/// | SOLACE_HISTORY_WINDOW | 20 | Most-recent entries kept in blueprint prompts. |
/// | SOLACE_REQUEST_TIMEOUT_SECS | 60 | Bounded timeout for provider calls. |
/// | GEMINI_API_KEY | — | Provider credential (name overridable via `api_key_env`). |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Explicit credential override. Takes precedence over the environment.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Name of the environment variable holding the credential.
    pub api_key_env: String,
    pub fast_model: String,
    pub deep_model: String,
    pub thinking_budget: u32,
    pub history_window: usize,
    pub request_timeout_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            deep_model: DEFAULT_DEEP_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            history_window: DEFAULT_HISTORY_WINDOW,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl CoreConfig {
    /// Load from environment. Unset or invalid values fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            fast_model: env_opt_string("SOLACE_FAST_MODEL")
                .unwrap_or_else(|| DEFAULT_FAST_MODEL.to_string()),
            deep_model: env_opt_string("SOLACE_DEEP_MODEL")
                .unwrap_or_else(|| DEFAULT_DEEP_MODEL.to_string()),
            thinking_budget: env_parse("SOLACE_THINKING_BUDGET", DEFAULT_THINKING_BUDGET),
            history_window: env_parse("SOLACE_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW),
            request_timeout_secs: env_parse(
                "SOLACE_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
        }
    }

    /// Use an explicit credential instead of the environment.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Resolve the credential now. Checked lazily on every call, never cached,
    /// so a newly configured key is picked up on the next request.
    pub fn resolve_api_key(&self) -> Option<String> {
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
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.fast_model, DEFAULT_FAST_MODEL);
        assert_eq!(config.deep_model, DEFAULT_DEEP_MODEL);
        assert_eq!(config.thinking_budget, DEFAULT_THINKING_BUDGET);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_explicit_key_takes_precedence() {
        let config = CoreConfig::default().with_api_key("explicit");
        assert_eq!(config.resolve_api_key().as_deref(), Some("explicit"));
    }

    #[test]
    fn test_blank_explicit_key_is_not_a_credential() {
        let config = CoreConfig {
            api_key: Some("   ".to_string()),
            // Point at a variable that cannot exist in the test environment.
            api_key_env: "SOLACE_TEST_NO_SUCH_KEY_7391".to_string(),
            ..CoreConfig::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn test_env_key_resolved_lazily() {
        let var = "SOLACE_TEST_LAZY_KEY_4410";
        let config = CoreConfig {
            api_key_env: var.to_string(),
            ..CoreConfig::default()
        };
        std::env::remove_var(var);
        assert!(config.resolve_api_key().is_none());
        std::env::set_var(var, "late-key");
        assert_eq!(config.resolve_api_key().as_deref(), Some("late-key"));
        std::env::remove_var(var);
    }

    #[test]
    fn test_env_parse_invalid_falls_back() {
        let var = "SOLACE_TEST_PARSE_9917";
        std::env::set_var(var, "not-a-number");
        assert_eq!(env_parse(var, 42u32), 42);
        std::env::remove_var(var);
    }
}
