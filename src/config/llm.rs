//! LLM call configuration.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider family derived from a model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// OpenAI and OpenAI-compatible models.
    Openai,
    /// Anthropic Claude models.
    Anthropic,
    /// Google Gemini models.
    Google,
    /// Azure OpenAI deployments.
    Azure,
    /// Local Ollama models.
    Ollama,
    /// `DeepSeek` models.
    Deepseek,
    /// No known provider family could be derived from the model name.
    Unknown,
}

impl ProviderType {
    /// The environment variable(s) consulted for this provider's API key, in
    /// fallback order (first set wins).
    #[must_use]
    pub fn env_var_names(self) -> &'static [&'static str] {
        match self {
            Self::Openai => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            Self::Google => &["GOOGLE_API_KEY"],
            Self::Azure => &["AZURE_OPENAI_API_KEY", "AZURE_API_KEY"],
            Self::Ollama => &[],
            Self::Deepseek => &["DEEPSEEK_API_KEY"],
            Self::Unknown => &[],
        }
    }
}

/// Derives the provider family from a model name by prefix/substring match.
///
/// Mirrors the original dispatch table: exact prefixes for the three major
/// cloud providers, substring matches for azure/ollama/deepseek (since those
/// often show up embedded in a longer deployment or model alias), and
/// `Unknown` as the catch-all.
#[must_use]
pub fn provider_type_for_model(model: &str) -> ProviderType {
    let lower = model.to_lowercase();
    if lower.starts_with("gpt-") || lower.starts_with("openai/") || lower.starts_with("o1") || lower.starts_with("o3")
    {
        ProviderType::Openai
    } else if lower.starts_with("claude-") || lower.starts_with("anthropic/") {
        ProviderType::Anthropic
    } else if lower.starts_with("gemini-") || lower.starts_with("google/") {
        ProviderType::Google
    } else if lower.contains("azure") {
        ProviderType::Azure
    } else if lower.contains("ollama") {
        ProviderType::Ollama
    } else if lower.contains("deepseek") {
        ProviderType::Deepseek
    } else {
        ProviderType::Unknown
    }
}

/// Configuration for a single LLM endpoint/call shape.
///
/// Cloned and overridden (never mutated in place) via [`LlmConfig::create_variant`];
/// callers that need a scoped temporary override use
/// [`crate::llm::LlmBlock::temporary_config`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier, e.g. `"gpt-4o"`, `"claude-3-haiku-20240307"`.
    pub model: String,
    /// Sampling temperature, expected in `[0, 2]`.
    pub temperature: f32,
    /// Maximum tokens to generate, must be `> 0`.
    pub max_tokens: u32,
    /// Nucleus sampling parameter, expected in `[0, 1]`.
    pub top_p: f32,
    /// API key. Resolved from provider-specific environment variables via
    /// [`LlmConfig::effective_api_key`] when not set directly.
    ///
    /// Never serialized back out (`save_to_yaml` strips it per
    /// `SPEC_FULL.md` §6) — `SecretString` deliberately has no `Serialize`
    /// impl to make accidental leakage a compile error anywhere else.
    #[serde(skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Base URL override (for self-hosted or proxy deployments).
    pub base_url: Option<String>,
    /// API version string (used by some Azure deployments).
    pub api_version: Option<String>,
    /// Per-call timeout in seconds, must be `> 0`.
    pub timeout: u64,
    /// Number of retries after the first attempt, must be `>= 0`.
    pub retry_attempts: u32,
    /// Seconds to sleep between retry attempts, must be `>= 0`.
    pub retry_delay: u64,
    /// Provider-specific extra parameters forwarded verbatim.
    pub extra_params: HashMap<String, serde_json::Value>,
    /// System prompt applied unless a call overrides it.
    pub system_prompt: Option<String>,
    /// Custom instructions appended to every user prompt.
    pub custom_instructions: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 4000,
            top_p: 1.0,
            api_key: None,
            base_url: None,
            api_version: None,
            timeout: 60,
            retry_attempts: 2,
            retry_delay: 1,
            extra_params: HashMap::new(),
            system_prompt: None,
            custom_instructions: None,
        }
    }
}

impl LlmConfig {
    /// Returns the provider family derived from [`LlmConfig::model`].
    #[must_use]
    pub fn provider_type(&self) -> ProviderType {
        provider_type_for_model(&self.model)
    }

    /// Validates the config's numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if any field is out of range.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(crate::Error::InvalidInput(format!(
                "temperature {} out of range [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(crate::Error::InvalidInput(
                "max_tokens must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(crate::Error::InvalidInput(format!(
                "top_p {} out of range [0, 1]",
                self.top_p
            )));
        }
        if self.timeout == 0 {
            return Err(crate::Error::InvalidInput(
                "timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the effective API key: the configured key if set, else the
    /// first set provider-specific environment variable for this model's
    /// provider family.
    #[must_use]
    pub fn effective_api_key(&self) -> Option<SecretString> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        self.provider_type()
            .env_var_names()
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .map(SecretString::from)
    }

    /// Returns a request-parameter projection consumed directly by the
    /// provider HTTP clients (the target-language analogue of the original's
    /// LiteLLM parameter dict — there is no intermediary library here).
    #[must_use]
    pub fn completion_params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            extra_params: self.extra_params.clone(),
        }
    }

    /// Returns a new config with the given overrides applied, without
    /// mutating `self`.
    #[must_use]
    pub fn create_variant(&self, overrides: LlmConfigOverrides) -> Self {
        let mut variant = self.clone();
        if let Some(model) = overrides.model {
            variant.model = model;
        }
        if let Some(temperature) = overrides.temperature {
            variant.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            variant.max_tokens = max_tokens;
        }
        if let Some(top_p) = overrides.top_p {
            variant.top_p = top_p;
        }
        if let Some(api_key) = overrides.api_key {
            variant.api_key = Some(api_key);
        }
        if let Some(system_prompt) = overrides.system_prompt {
            variant.system_prompt = Some(system_prompt);
        }
        if let Some(custom_instructions) = overrides.custom_instructions {
            variant.custom_instructions = Some(custom_instructions);
        }
        variant
    }
}

/// Request-parameter projection of an [`LlmConfig`].
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Nucleus sampling parameter.
    pub top_p: f32,
    /// Provider-specific extra parameters.
    pub extra_params: HashMap<String, serde_json::Value>,
}

/// Sparse set of overrides for [`LlmConfig::create_variant`].
#[derive(Debug, Clone, Default)]
pub struct LlmConfigOverrides {
    /// Overridden model.
    pub model: Option<String>,
    /// Overridden temperature.
    pub temperature: Option<f32>,
    /// Overridden max tokens.
    pub max_tokens: Option<u32>,
    /// Overridden top_p.
    pub top_p: Option<f32>,
    /// Overridden API key.
    pub api_key: Option<SecretString>,
    /// Overridden system prompt.
    pub system_prompt: Option<String>,
    /// Overridden custom instructions.
    pub custom_instructions: Option<String>,
}

/// Encoding requested for embedding vectors returned over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingFormat {
    /// Plain floating point array.
    Float,
    /// Base64-encoded packed floats.
    Base64,
}

/// Configuration for an embedding endpoint. Mirrors [`LlmConfig`] with the
/// fields specific to vector-embedding calls.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Model identifier.
    pub model: String,
    /// API key, resolved the same way as [`LlmConfig::effective_api_key`].
    pub api_key: Option<SecretString>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout: u64,
    /// Retries after the first attempt.
    pub retry_attempts: u32,
    /// Seconds to sleep between retries.
    pub retry_delay: u64,
    /// Requested embedding dimensionality, if the provider supports choosing one.
    pub dimensions: Option<u32>,
    /// Requested wire encoding.
    pub encoding_format: EncodingFormat,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: None,
            timeout: 60,
            retry_attempts: 2,
            retry_delay: 1,
            dimensions: None,
            encoding_format: EncodingFormat::Float,
        }
    }
}

impl EmbeddingConfig {
    /// Returns the provider family derived from the model name.
    #[must_use]
    pub fn provider_type(&self) -> ProviderType {
        provider_type_for_model(&self.model)
    }

    /// Resolves the effective API key the same way [`LlmConfig`] does.
    #[must_use]
    pub fn effective_api_key(&self) -> Option<SecretString> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        self.provider_type()
            .env_var_names()
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .map(SecretString::from)
    }
}

/// Helper used only by tests to compare secret values without leaking them
/// into normal `Debug` output.
#[cfg(test)]
fn expose(key: &SecretString) -> String {
    key.expose_secret().to_string()
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_from_model_prefix() {
        assert_eq!(provider_type_for_model("gpt-4o"), ProviderType::Openai);
        assert_eq!(
            provider_type_for_model("claude-3-haiku-20240307"),
            ProviderType::Anthropic
        );
        assert_eq!(provider_type_for_model("gemini-1.5-pro"), ProviderType::Google);
        assert_eq!(
            provider_type_for_model("my-azure-deployment"),
            ProviderType::Azure
        );
        assert_eq!(provider_type_for_model("ollama/llama3"), ProviderType::Ollama);
        assert_eq!(
            provider_type_for_model("deepseek-chat"),
            ProviderType::Deepseek
        );
        assert_eq!(provider_type_for_model("some-unknown-model"), ProviderType::Unknown);
    }

    #[test]
    fn test_validate_rejects_out_of_range_temperature() {
        let config = LlmConfig {
            temperature: 3.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_tokens() {
        let config = LlmConfig {
            max_tokens: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_variant_does_not_mutate_original() {
        let original = LlmConfig::default();
        let variant = original.create_variant(LlmConfigOverrides {
            model: Some("claude-3-opus-20240229".to_string()),
            temperature: Some(0.9),
            ..Default::default()
        });

        assert_eq!(original.model, "gpt-4o");
        assert!((original.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(variant.model, "claude-3-opus-20240229");
        assert!((variant.temperature - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_effective_api_key_falls_back_to_env() {
        let config = LlmConfig {
            model: "gpt-4o".to_string(),
            api_key: None,
            ..Default::default()
        };
        // SAFETY in test context: single-threaded test, restored immediately.
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "sk-test-env-key");
        }
        let key = config.effective_api_key();
        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
        }
        assert_eq!(key.map(|k| expose(&k)), Some("sk-test-env-key".to_string()));
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = LlmConfig {
            api_key: Some(SecretString::from("sk-super-secret")),
            ..Default::default()
        };
        let debug_str = format!("{:?}", config.api_key);
        assert!(!debug_str.contains("sk-super-secret"));
    }
}
