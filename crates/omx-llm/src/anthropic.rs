//! Anthropic Messages API provider
//!
//! Sends one user message per call and concatenates the text blocks of the
//! reply. Token usage from the reply travels back with the text.

use crate::{error_for_status, LlmError};
use omx_domain::{Generation, GenerationOptions, LlmProvider, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";

/// API version header value
pub const API_VERSION: &str = "2023-06-01";

/// Default HTTP timeout (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Hosted Claude models over HTTPS
pub struct AnthropicProvider {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicProvider {
    /// Create a provider for the public endpoint
    ///
    /// Fails with [`LlmError::Authentication`] if `api_key` is blank, so a
    /// missing credential is caught before any document is processed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT)
    }

    /// Create a provider for a custom endpoint (proxy or gateway)
    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Authentication("missing API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// The configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Collect the text blocks of a Messages API response body
fn parse_response(body: &str) -> Result<Generation, LlmError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let usage = response.usage.unwrap_or_default();
    debug!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "Anthropic token usage"
    );

    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.is_empty() {
        return Err(LlmError::InvalidResponse("response contained no text".to_string()));
    }
    Ok(Generation::new(
        text,
        TokenUsage::new(usage.input_tokens, usage.output_tokens),
    ))
}

impl LlmProvider for AnthropicProvider {
    type Error = LlmError;

    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, LlmError> {
        let url = format!("{}/v1/messages", self.endpoint);
        let request = MessagesRequest {
            model: &options.model_id,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %options.model_id, prompt_chars = prompt.len(), "Calling Anthropic");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_for_status(status, body, &options.model_id));
        }

        parse_response(&body)
    }
}
