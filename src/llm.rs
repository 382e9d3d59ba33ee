use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use gemini_client_api::gemini::{ask::Gemini, types::sessions::Session};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::GenerateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl Default for LlmProvider {
    fn default() -> Self {
        LlmProvider::Gemini
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            _ => Err(anyhow::anyhow!("Unknown provider: {}", s)),
        }
    }
}

/// An opaque text-generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub struct GeminiGenerator {
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let ai = Gemini::new(self.api_key.clone(), self.model.as_str(), None);
        // One question, one answer; nothing carries over between requests
        let mut session = Session::new(2);

        // The client has no timeout of its own
        let response = tokio::time::timeout(self.timeout, ai.ask(session.ask_string(prompt)))
            .await
            .map_err(|_| GenerateError::Timeout(self.name().to_string(), self.timeout.as_secs()))?
            .map_err(|e| GenerateError::Provider(format!("Gemini API error: {}", e)))?;

        Ok(response.get_text(""))
    }
}

// Ollama's /api/chat endpoint (non-streaming)
#[derive(Serialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(base_url: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let request_payload = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![OllamaChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };

        // Send the request to Ollama
        let response = self
            .client
            .post(&url)
            .json(&request_payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    anyhow::anyhow!("Failed to connect to Ollama API at {}. Please check if Ollama is running", url)
                } else if e.is_timeout() {
                    GenerateError::Timeout(self.name().to_string(), self.timeout.as_secs()).into()
                } else {
                    anyhow::anyhow!("Failed to send request to Ollama API: {}", e)
                }
            })?;

        // Handle HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let error_msg = match status.as_u16() {
                404 => format!("Model not found. Status {}: {}", status, error_text),
                500 => format!("Ollama server error. Status {}: {}", status, error_text),
                _ => format!("Ollama API request failed with status {}: {}", status, error_text),
            };
            return Err(GenerateError::Provider(error_msg).into());
        }

        // Parse the response
        let ollama_response = response
            .json::<OllamaChatResponse>()
            .await
            .context("failed to parse JSON response from Ollama API")?;

        // Ollama omits `message` when the model produced nothing
        let message = ollama_response
            .message
            .ok_or_else(|| GenerateError::NoResponse(self.name().to_string()))?;
        debug!("Ollama returned {} bytes", message.content.len());
        Ok(message.content)
    }
}

pub fn from_config(config: &LlmConfig) -> anyhow::Result<Box<dyn Generator>> {
    match config.provider {
        LlmProvider::Gemini => {
            let api_key = config.gemini.api_key.clone().ok_or_else(|| {
                anyhow::anyhow!("GEMINI_API_KEY environment variable not found. Please set it to use Gemini.")
            })?;
            Ok(Box::new(GeminiGenerator::new(
                api_key,
                config.gemini.model.clone(),
                Duration::from_secs(config.timeout_seconds),
            )))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaGenerator::new(
            config.ollama.base_url.clone(),
            config.ollama.model.clone(),
            Duration::from_secs(config.timeout_seconds),
        )?)),
    }
}
