//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local LLM API, for running
//! extraction against local models without sending documents off-host.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama generate API
//! - JSON output mode, temperature and response length from [`GenerationOptions`]
//! - HTTP status mapped to classified [`LlmError`]s
//! - Prompt and completion token counts reported with each reply
//!
//! # Examples
//!
//! ```no_run
//! use omx_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434");
//! ```

use crate::{error_for_status, LlmError};
use omx_domain::{Generation, GenerationOptions, LlmProvider, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Model used when the configuration still names a hosted model
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Default HTTP timeout for LLM requests (180 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Ollama API provider for local LLM inference
pub struct OllamaProvider {
    endpoint: String,
    client: reqwest::Client,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl From<OllamaGenerateResponse> for Generation {
    fn from(body: OllamaGenerateResponse) -> Self {
        let usage = TokenUsage::new(body.prompt_eval_count, body.eval_count);
        Generation::new(body.response, usage)
    }
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new Ollama provider with a custom HTTP timeout
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Create a new Ollama provider on `http://localhost:11434`
    pub fn default_endpoint() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }

    /// The configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let request_body = OllamaGenerateRequest {
            model: &options.model_id,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!(model = %options.model_id, prompt_chars = prompt.len(), "Calling Ollama");

        let response = self.client.post(&url).json(&request_body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(error_for_status(status, error_text, &options.model_id));
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        debug!(
            input_tokens = body.prompt_eval_count,
            output_tokens = body.eval_count,
            "Ollama token usage"
        );
        Ok(body.into())
    }
}

impl LlmProvider for OllamaProvider {
    type Error = LlmError;

    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, LlmError> {
        self.call(prompt, options).await
    }
}
