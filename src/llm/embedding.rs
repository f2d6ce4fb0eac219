//! `EmbeddingBlock`: the vector-embedding analogue of [`super::LlmBlock`].

use crate::config::EmbeddingConfig;
use std::time::Duration;

/// A retry-wrapped, provider-agnostic single-call vector-embedding
/// abstraction.
pub struct EmbeddingBlock {
    config: EmbeddingConfig,
    client: reqwest::blocking::Client,
}

impl EmbeddingBlock {
    /// Builds a new block around `config`.
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Embeds a single text, retrying per `config.retry_attempts`.
    #[must_use]
    pub fn generate_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.generate_embeddings(std::slice::from_ref(&text.to_string()))
            .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) })
    }

    /// Embeds several texts in one call, retrying per `config.retry_attempts`.
    #[must_use]
    pub fn generate_embeddings(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Some(Vec::new());
        }
        use secrecy::ExposeSecret;
        let api_key = self.config.effective_api_key().map(|k| k.expose_secret().to_string());
        let timeout = Duration::from_secs(self.config.timeout);
        let attempts = self.config.retry_attempts + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match super::providers::call_openai_embeddings(
                &self.client,
                self.config.base_url.as_deref(),
                api_key.as_deref(),
                &self.config.model,
                self.config.dimensions,
                timeout,
                texts,
            ) {
                Ok(vectors) => {
                    tracing::debug!(attempt, model = %self.config.model, "embedding call succeeded");
                    return Some(vectors);
                }
                Err(e) => {
                    tracing::warn!(attempt, model = %self.config.model, error = %e, "embedding call attempt failed");
                    last_error = e;
                    if attempt + 1 < attempts {
                        std::thread::sleep(Duration::from_secs(self.config.retry_delay));
                    }
                }
            }
        }
        tracing::error!(model = %self.config.model, error = %last_error, "embedding call exhausted retries");
        None
    }

    /// Embeds `texts` in batches of `batch_size`, sleeping `retry_delay`
    /// seconds between batches (not after the last). Returns `None` if any
    /// batch fails outright.
    #[must_use]
    pub fn batch_embed(&self, texts: &[String], batch_size: usize) -> Option<Vec<Vec<f32>>> {
        if batch_size == 0 {
            return self.generate_embeddings(texts);
        }
        let mut all = Vec::with_capacity(texts.len());
        let chunks: Vec<&[String]> = texts.chunks(batch_size).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let batch = self.generate_embeddings(chunk)?;
            all.extend(batch);
            if i + 1 < chunks.len() {
                std::thread::sleep(Duration::from_secs(self.config.retry_delay));
            }
        }
        Some(all)
    }
}
