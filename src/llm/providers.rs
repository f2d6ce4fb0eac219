//! Provider-specific request/response shapes for the blocking HTTP calls
//! issued by [`super::LlmBlock`] and [`super::EmbeddingBlock`].
//!
//! Each provider family gets its own wire format; this module knows nothing
//! about retry or structured-output parsing, only how to turn a
//! [`Request`] into bytes on the wire and a response body back into text.

use crate::config::{CompletionParams, ProviderType};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chat message, provider-agnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// `"system"` or `"user"`.
    pub role: &'static str,
    /// Message text.
    pub content: String,
}

/// Everything a provider call needs, gathered by [`super::LlmBlock`] before
/// dispatch.
pub struct Request<'a> {
    /// Messages in order (system first, if present).
    pub messages: &'a [Message],
    /// Merged completion parameters (config defaults + call-time overrides).
    pub params: &'a CompletionParams,
    /// Optional structured-output schema/format, forwarded only to
    /// providers that understand it.
    pub response_format: Option<&'a Value>,
    /// Resolved API key, if any.
    pub api_key: Option<String>,
    /// Base URL override, if any.
    pub base_url: Option<&'a str>,
    /// Per-call timeout.
    pub timeout: std::time::Duration,
}

#[derive(Debug, Serialize)]
struct OpenAiChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a Value>,
    #[serde(flatten)]
    extra: &'a std::collections::HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessageBody {
    content: Option<String>,
}

/// Calls an OpenAI-compatible chat-completions endpoint (OpenAI, Azure
/// OpenAI, `DeepSeek`, Ollama's and LM Studio's OpenAI-compatible shims all
/// speak this wire format).
pub fn call_openai_style(
    client: &reqwest::blocking::Client,
    req: &Request<'_>,
) -> Result<String, String> {
    let base = req.base_url.unwrap_or("https://api.openai.com/v1");
    let url = format!("{}/chat/completions", base.trim_end_matches('/'));

    let messages: Vec<OpenAiChatMessage<'_>> = req
        .messages
        .iter()
        .map(|m| OpenAiChatMessage {
            role: m.role,
            content: &m.content,
        })
        .collect();

    let body = OpenAiChatRequest {
        model: &req.params.model,
        messages,
        temperature: req.params.temperature,
        max_tokens: req.params.max_tokens,
        top_p: req.params.top_p,
        response_format: req.response_format,
        extra: &req.params.extra_params,
    };

    let mut builder = client.post(&url).timeout(req.timeout).json(&body);
    if let Some(key) = &req.api_key {
        builder = builder.bearer_auth(key);
    }
    let response = builder.send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("openai-style request failed: {}", response.status()));
    }
    let parsed: OpenAiChatResponse = response.json().map_err(|e| e.to_string())?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| "empty response".to_string())
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Calls the Anthropic Messages API.
pub fn call_anthropic(
    client: &reqwest::blocking::Client,
    req: &Request<'_>,
) -> Result<String, String> {
    let base = req.base_url.unwrap_or("https://api.anthropic.com/v1");
    let url = format!("{}/messages", base.trim_end_matches('/'));

    let system = req
        .messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.as_str());
    let messages: Vec<AnthropicMessage<'_>> = req
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| AnthropicMessage {
            role: "user",
            content: &m.content,
        })
        .collect();

    let body = AnthropicRequest {
        model: &req.params.model,
        max_tokens: req.params.max_tokens,
        temperature: req.params.temperature,
        messages,
        system,
    };

    let mut builder = client
        .post(&url)
        .timeout(req.timeout)
        .header("anthropic-version", "2023-06-01")
        .json(&body);
    if let Some(key) = &req.api_key {
        builder = builder.header("x-api-key", key);
    }
    let response = builder.send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("anthropic request failed: {}", response.status()));
    }
    let parsed: AnthropicResponse = response.json().map_err(|e| e.to_string())?;
    parsed
        .content
        .into_iter()
        .find_map(|b| b.text)
        .ok_or_else(|| "empty response".to_string())
}

#[derive(Debug, Serialize)]
struct GooglePart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GoogleContent<'a> {
    parts: Vec<GooglePart<'a>>,
}

#[derive(Debug, Serialize)]
struct GoogleGenerationConfig<'a> {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none", rename = "responseSchema")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct GoogleRequest<'a> {
    contents: Vec<GoogleContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GoogleGenerationConfig<'a>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    candidates: Vec<GoogleCandidate>,
}

#[derive(Debug, Deserialize)]
struct GoogleCandidate {
    content: GoogleCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GoogleCandidateContent {
    #[serde(default)]
    parts: Vec<GoogleResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Calls the Google Gemini `generateContent` endpoint. `response_schema` is
/// forwarded as-is when present, matching `generate_structured_output`'s
/// contract for the Google family.
pub fn call_google(
    client: &reqwest::blocking::Client,
    req: &Request<'_>,
) -> Result<String, String> {
    let base = req
        .base_url
        .unwrap_or("https://generativelanguage.googleapis.com/v1beta");
    let url = format!(
        "{}/models/{}:generateContent",
        base.trim_end_matches('/'),
        req.params.model
    );

    let text = req
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let body = GoogleRequest {
        contents: vec![GoogleContent {
            parts: vec![GooglePart { text: &text }],
        }],
        generation_config: GoogleGenerationConfig {
            temperature: req.params.temperature,
            max_output_tokens: req.params.max_tokens,
            top_p: req.params.top_p,
            response_schema: req.response_format,
        },
    };

    let mut builder = client.post(&url).timeout(req.timeout).json(&body);
    if let Some(key) = &req.api_key {
        builder = builder.query(&[("key", key.as_str())]);
    }
    let response = builder.send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("google request failed: {}", response.status()));
    }
    let parsed: GoogleResponse = response.json().map_err(|e| e.to_string())?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| "empty response".to_string())
}

/// Dispatches a chat-style request to the provider implied by
/// `req.params.model`, forwarding `response_format` only where the spec
/// says the provider family understands it.
pub fn dispatch(
    client: &reqwest::blocking::Client,
    provider: ProviderType,
    req: &Request<'_>,
) -> Result<String, String> {
    match provider {
        ProviderType::Openai | ProviderType::Azure | ProviderType::Deepseek | ProviderType::Ollama => {
            call_openai_style(client, req)
        }
        ProviderType::Anthropic => call_anthropic(client, req),
        ProviderType::Google => call_google(client, req),
        ProviderType::Unknown => Err(format!("unknown provider for model '{}'", req.params.model)),
    }
}

/// Resolves the secret API key to a plain `String` for a single outbound
/// request, living only as long as the request build.
#[must_use]
pub fn expose_key(key: &Option<secrecy::SecretString>) -> Option<String> {
    key.as_ref().map(|k| k.expose_secret().to_string())
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingDatum {
    embedding: Vec<f32>,
}

/// Calls an OpenAI-compatible embeddings endpoint.
pub fn call_openai_embeddings(
    client: &reqwest::blocking::Client,
    base_url: Option<&str>,
    api_key: Option<&str>,
    model: &str,
    dimensions: Option<u32>,
    timeout: std::time::Duration,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, String> {
    let base = base_url.unwrap_or("https://api.openai.com/v1");
    let url = format!("{}/embeddings", base.trim_end_matches('/'));
    let body = OpenAiEmbeddingRequest {
        model,
        input: texts,
        dimensions,
    };
    let mut builder = client.post(&url).timeout(timeout).json(&body);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }
    let response = builder.send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("embeddings request failed: {}", response.status()));
    }
    let parsed: OpenAiEmbeddingResponse = response.json().map_err(|e| e.to_string())?;
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}
