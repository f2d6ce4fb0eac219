//! Provider-agnostic LLM invocation: a single-call abstraction with retry,
//! structured-output parsing, and scoped configuration overrides.
//!
//! [`LlmBlock`] wraps one [`crate::config::LlmConfig`] and routes calls to
//! whichever provider the model name implies (see
//! [`crate::config::provider_type_for_model`]), via blocking HTTP requests
//! — matching the teacher's own choice of `reqwest::blocking` for external
//! calls even though the rest of the crate is free to use an async runtime.

mod providers;

use crate::config::{LlmConfig, LlmConfigOverrides, ProviderType};
use providers::Message;
use regex::Regex;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[\s\S]*\}").unwrap_or_else(|_| unreachable!()))
}

fn json_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[[\s\S]*\]").unwrap_or_else(|_| unreachable!()))
}

/// Sets the provider's well-known environment variable from `config`, for
/// the four providers the original `_setup_litellm` covers. Azure and
/// Ollama are routed but intentionally get no env-var side effect, matching
/// the original exactly.
///
/// This is a deliberate process-wide mutation, documented here rather than
/// hidden: several provider HTTP client conventions expect credentials in
/// the environment, and duplicating that contract via explicit parameter
/// passing would diverge from how those providers are normally configured.
#[allow(unsafe_code)]
fn apply_provider_env_var(config: &LlmConfig) {
    let Some(key) = config.effective_api_key() else {
        return;
    };
    use secrecy::ExposeSecret;
    let var_name = match config.provider_type() {
        ProviderType::Openai => "OPENAI_API_KEY",
        ProviderType::Anthropic => "ANTHROPIC_API_KEY",
        ProviderType::Google => "GOOGLE_API_KEY",
        ProviderType::Deepseek => "DEEPSEEK_API_KEY",
        ProviderType::Azure | ProviderType::Ollama | ProviderType::Unknown => return,
    };
    // SAFETY: single-process config wiring at startup; see module docs.
    unsafe {
        std::env::set_var(var_name, key.expose_secret());
    }
}

/// A retry-wrapped, provider-agnostic single-call text-generation
/// abstraction.
///
/// Construction applies [`apply_provider_env_var`] for the current config
/// as a side effect.
pub struct LlmBlock {
    config: Mutex<LlmConfig>,
    client: reqwest::blocking::Client,
}

impl LlmBlock {
    /// Builds a new block around `config`, applying the provider env-var
    /// side effect described on the module.
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        apply_provider_env_var(&config);
        Self {
            config: Mutex::new(config),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn snapshot(&self) -> LlmConfig {
        self.config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Generates free-form text for `prompt`.
    ///
    /// Returns `None` once `retry_attempts + 1` attempts have all failed;
    /// every attempt and the final error are logged via `tracing`.
    #[must_use]
    pub fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        overrides: LlmConfigOverrides,
    ) -> Option<String> {
        let config = self.snapshot().create_variant(overrides);
        self.call_with_retry(&config, prompt, system_prompt, None)
    }

    /// Generates structured output, parsed as JSON.
    ///
    /// Tries a direct `serde_json::from_str` first; on failure, scans the
    /// response text for the first `{…}` or `[…]` match and retries the
    /// parse against that slice. Returns `None` if the call itself fails or
    /// every parse attempt fails.
    #[must_use]
    pub fn generate_structured_output(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        response_format: Option<serde_json::Value>,
        overrides: LlmConfigOverrides,
    ) -> Option<serde_json::Value> {
        let config = self.snapshot().create_variant(overrides);
        let text = self.call_with_retry(&config, prompt, system_prompt, response_format.as_ref())?;
        parse_structured_output(&text)
    }

    fn call_with_retry(
        &self,
        config: &LlmConfig,
        prompt: &str,
        system_prompt: Option<&str>,
        response_format: Option<&serde_json::Value>,
    ) -> Option<String> {
        let messages = build_messages(config, prompt, system_prompt);
        let params = config.completion_params();
        let provider = config.provider_type();
        let api_key = providers::expose_key(&config.effective_api_key());
        let timeout = Duration::from_secs(config.timeout);

        let attempts = config.retry_attempts + 1;
        let mut last_error = String::new();
        for attempt in 0..attempts {
            let request = providers::Request {
                messages: &messages,
                params: &params,
                response_format,
                api_key: api_key.clone(),
                base_url: config.base_url.as_deref(),
                timeout,
            };
            match providers::dispatch(&self.client, provider, &request) {
                Ok(text) => {
                    tracing::debug!(attempt, model = %config.model, "llm call succeeded");
                    return Some(text);
                }
                Err(e) => {
                    tracing::warn!(attempt, model = %config.model, error = %e, "llm call attempt failed");
                    last_error = e;
                    if attempt + 1 < attempts {
                        std::thread::sleep(Duration::from_secs(config.retry_delay));
                    }
                }
            }
        }
        tracing::error!(model = %config.model, error = %last_error, "llm call exhausted retries");
        None
    }

    /// Runs `f` with this block's configuration temporarily overridden,
    /// guaranteeing restoration of the original configuration whether `f`
    /// returns normally or unwinds.
    pub fn temporary_config<T>(
        &self,
        overrides: LlmConfigOverrides,
        f: impl FnOnce(&Self) -> T,
    ) -> T {
        let original = self.snapshot();
        let variant = original.create_variant(overrides);
        {
            let mut guard = self
                .config
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = variant;
        }

        struct RestoreGuard<'a> {
            block: &'a LlmBlock,
            original: Option<LlmConfig>,
        }
        impl Drop for RestoreGuard<'_> {
            fn drop(&mut self) {
                if let Some(original) = self.original.take() {
                    let mut guard = self
                        .block
                        .config
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    *guard = original;
                }
            }
        }
        let _restore = RestoreGuard {
            block: self,
            original: Some(original),
        };
        f(self)
    }

    /// Round-trips a trivial prompt and reports whether a non-empty
    /// response came back.
    #[must_use]
    pub fn test_connection(&self) -> bool {
        self.generate_text("Say OK.", None, LlmConfigOverrides::default())
            .is_some_and(|text| !text.trim().is_empty())
    }
}

fn build_messages(config: &LlmConfig, prompt: &str, system_prompt: Option<&str>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    let system = system_prompt.or(config.system_prompt.as_deref());
    if let Some(system) = system {
        messages.push(Message {
            role: "system",
            content: system.to_string(),
        });
    }
    let mut user_content = prompt.to_string();
    if let Some(instructions) = &config.custom_instructions {
        user_content.push_str("\n\nAdditional Instructions:\n");
        user_content.push_str(instructions);
    }
    messages.push(Message {
        role: "user",
        content: user_content,
    });
    messages
}

fn parse_structured_output(text: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return Some(value);
    }
    if let Some(m) = json_object_pattern().find(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(m.as_str()) {
            return Some(value);
        }
    }
    if let Some(m) = json_array_pattern().find(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(m.as_str()) {
            return Some(value);
        }
    }
    None
}

pub mod embedding;
pub use embedding::EmbeddingBlock;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_appends_custom_instructions() {
        let config = LlmConfig {
            custom_instructions: Some("Be terse.".to_string()),
            ..Default::default()
        };
        let messages = build_messages(&config, "Summarize this.", None);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("Additional Instructions:"));
        assert!(messages[0].content.contains("Be terse."));
    }

    #[test]
    fn test_build_messages_includes_system_prompt_first() {
        let config = LlmConfig {
            system_prompt: Some("You are terse.".to_string()),
            ..Default::default()
        };
        let messages = build_messages(&config, "Hi", None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn test_parse_structured_output_direct_json() {
        let value = parse_structured_output(r#"{"k": 1}"#).unwrap();
        assert_eq!(value, serde_json::json!({"k": 1}));
    }

    #[test]
    fn test_parse_structured_output_fallback_extraction() {
        let value = parse_structured_output("prefix {\"k\":1} suffix").unwrap();
        assert_eq!(value, serde_json::json!({"k": 1}));
    }

    #[test]
    fn test_parse_structured_output_array_fallback() {
        let value = parse_structured_output("here: [\"a\", \"b\"] done").unwrap();
        assert_eq!(value, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_parse_structured_output_gives_up_on_garbage() {
        assert!(parse_structured_output("not json at all").is_none());
    }

    #[test]
    fn test_temporary_config_restores_after_normal_exit() {
        let block = LlmBlock::new(LlmConfig {
            model: "gpt-4o".to_string(),
            ..Default::default()
        });
        block.temporary_config(
            LlmConfigOverrides {
                model: Some("claude-3-haiku-20240307".to_string()),
                ..Default::default()
            },
            |inner| {
                assert_eq!(inner.snapshot().model, "claude-3-haiku-20240307");
            },
        );
        assert_eq!(block.snapshot().model, "gpt-4o");
    }

    #[test]
    fn test_temporary_config_restores_after_panic_unwind() {
        let block = LlmBlock::new(LlmConfig {
            model: "gpt-4o".to_string(),
            ..Default::default()
        });
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            block.temporary_config(
                LlmConfigOverrides {
                    model: Some("gemini-1.5-pro".to_string()),
                    ..Default::default()
                },
                |_inner| panic!("boom"),
            );
        }));
        assert!(result.is_err());
        assert_eq!(block.snapshot().model, "gpt-4o");
    }
}
