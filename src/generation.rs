//! Generation provider implementations.
//!
//! Concrete backends for the core [`GenerationProvider`] trait, one per
//! supported API. All share the retry behavior of [`crate::http`]; failures
//! surface as [`RagError::Generation`].

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use petcare_rag_core::embedding::GenerationProvider;
use petcare_rag_core::RagError;

use crate::config::GenerationConfig;
use crate::embedding::{api_key, gemini_model_id};
use crate::http::{self, post_json_with_retry};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

fn failed(e: anyhow::Error) -> RagError {
    RagError::Generation(format!("{:#}", e))
}

/// Settings every remote generator needs.
struct Remote {
    client: reqwest::Client,
    model: String,
    base_url: String,
    temperature: f32,
    max_retries: u32,
}

impl Remote {
    fn new(config: &GenerationConfig, model: &str, default_url: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model: model.to_string(),
            base_url: config.url.clone().unwrap_or_else(|| default_url.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

/// Gemini `generateContent`. Requires `GOOGLE_API_KEY`.
pub struct GeminiGenerator {
    remote: Remote,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            remote: Remote::new(config, gemini_model_id(&config.model), GEMINI_BASE_URL)?,
            api_key: api_key("GOOGLE_API_KEY")?,
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.remote.model
    }

    async fn generate(&self, prompt: &str) -> petcare_rag_core::Result<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.remote.temperature },
        });
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.remote.base_url, self.remote.model
        );
        let json = post_json_with_retry(
            &self.remote.client,
            "Gemini",
            &url,
            &[("x-goog-api-key", self.api_key.clone())],
            &body,
            self.remote.max_retries,
        )
        .await
        .map_err(failed)?;
        parse_gemini_response(&json).map_err(failed)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| match json.pointer("/promptFeedback/blockReason") {
            Some(reason) => anyhow!("Gemini blocked the prompt: {}", reason),
            None => anyhow!("Invalid Gemini response: no candidates"),
        })?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: candidate has no content"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

/// OpenAI chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    remote: Remote,
    api_key: String,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            remote: Remote::new(config, &config.model, OPENAI_BASE_URL)?,
            api_key: api_key("OPENAI_API_KEY")?,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.remote.model
    }

    async fn generate(&self, prompt: &str) -> petcare_rag_core::Result<String> {
        let body = serde_json::json!({
            "model": self.remote.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.remote.temperature,
        });
        let json = post_json_with_retry(
            &self.remote.client,
            "OpenAI",
            &format!("{}/v1/chat/completions", self.remote.base_url),
            &[("Authorization", format!("Bearer {}", self.api_key))],
            &body,
            self.remote.max_retries,
        )
        .await
        .map_err(failed)?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| failed(anyhow!("Invalid OpenAI response: missing message content")))
    }
}

/// Ollama `/api/generate` with streaming off.
pub struct OllamaGenerator {
    remote: Remote,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            remote: Remote::new(config, &config.model, OLLAMA_BASE_URL)?,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.remote.model
    }

    async fn generate(&self, prompt: &str) -> petcare_rag_core::Result<String> {
        let body = serde_json::json!({
            "model": self.remote.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.remote.temperature },
        });
        let json = post_json_with_retry(
            &self.remote.client,
            "Ollama",
            &format!("{}/api/generate", self.remote.base_url),
            &[],
            &body,
            self.remote.max_retries,
        )
        .await
        .map_err(failed)?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| failed(anyhow!("Invalid Ollama response: missing response")))
    }
}

/// Create the [`GenerationProvider`] named by `config.provider`
/// (`gemini`, `openai`, or `ollama`).
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gemini_joins_parts() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Walk your dog " }, { "text": "twice a day." }] }
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Walk your dog twice a day.");
    }

    #[test]
    fn test_parse_gemini_reports_block_reason() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_create_ollama_generator() {
        let config = GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.model_name(), "llama3.2");
    }

    #[test]
    fn test_create_unknown_generator_fails() {
        let config = GenerationConfig {
            provider: "local".to_string(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
