//! OMX LLM Provider Layer
//!
//! Pluggable LLM provider implementations of the `LlmProvider` trait from
//! `omx-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OllamaProvider`: Local Ollama API integration
//! - `AnthropicProvider`: Hosted Claude models via the Messages API
//!
//! Providers make exactly one attempt per call. Retrying transient failures
//! is the caller's job; every error is classified through
//! [`ClassifiedError`] so the caller can tell which ones to retry.
//!
//! # Examples
//!
//! ```
//! use omx_domain::{GenerationOptions, LlmProvider};
//! use omx_llm::MockProvider;
//!
//! let provider = MockProvider::new(r#"{"city": "Austin"}"#);
//! let options = GenerationOptions {
//!     model_id: "mock".to_string(),
//!     max_tokens: 256,
//!     temperature: 0.0,
//! };
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let result = rt.block_on(provider.generate("test prompt", &options)).unwrap();
//! assert_eq!(result.text, r#"{"city": "Austin"}"#);
//! ```

#![warn(missing_docs)]

pub mod anthropic;
pub mod ollama;

use omx_domain::{
    ClassifiedError, FailureKind, Generation, GenerationOptions, LlmProvider, TokenUsage,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credentials missing or rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider rejected the request itself
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl ClassifiedError for LlmError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            LlmError::Communication(_)
            | LlmError::Timeout
            | LlmError::RateLimitExceeded
            | LlmError::InvalidResponse(_) => FailureKind::Transient,
            LlmError::Authentication(_)
            | LlmError::InvalidRequest(_)
            | LlmError::ModelNotAvailable(_)
            | LlmError::Other(_) => FailureKind::Permanent,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Communication(format!("Request failed: {}", e))
        }
    }
}

/// Map a non-success HTTP status to an error
pub(crate) fn error_for_status(status: reqwest::StatusCode, body: String, model: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::Authentication(format!("HTTP {}: {}", status, body)),
        404 => LlmError::ModelNotAvailable(model.to_string()),
        408 => LlmError::Timeout,
        429 => LlmError::RateLimitExceeded,
        400..=499 => LlmError::InvalidRequest(format!("HTTP {}: {}", status, body)),
        _ => LlmError::Communication(format!("HTTP {}: {}", status, body)),
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Error(LlmError),
}

#[derive(Debug, Clone)]
struct MockRule {
    needles: Vec<String>,
    reply: MockReply,
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls.
/// A rule matches when every one of its needles occurs in the prompt; the
/// first matching rule wins, otherwise the default response is returned.
/// Scripted failures queued with [`MockProvider::fail_next`] are consumed
/// before any rule is consulted.
///
/// # Examples
///
/// ```
/// use omx_llm::MockProvider;
///
/// let mut provider = MockProvider::default();
/// provider.add_response("Financial Details", r#"{"sales_price": 1000000}"#);
/// provider.add_response_all(&["Lease Details", "part 2 of"], "{}");
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    rules: Arc<Mutex<Vec<MockRule>>>,
    scripted_failures: Arc<Mutex<VecDeque<LlmError>>>,
    call_count: Arc<Mutex<usize>>,
    latency: Option<Duration>,
    usage: TokenUsage,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            rules: Arc::new(Mutex::new(Vec::new())),
            scripted_failures: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(Mutex::new(0)),
            latency: None,
            usage: TokenUsage::default(),
        }
    }

    /// Delay every reply, to exercise concurrency and timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report `input_tokens`/`output_tokens` for every successful reply
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.usage = TokenUsage::new(input_tokens, output_tokens);
        self
    }

    /// Reply with `response` when the prompt contains `needle`
    pub fn add_response(&mut self, needle: impl Into<String>, response: impl Into<String>) {
        self.push_rule(vec![needle.into()], MockReply::Text(response.into()));
    }

    /// Reply with `response` when the prompt contains every needle
    pub fn add_response_all(&mut self, needles: &[&str], response: impl Into<String>) {
        let needles = needles.iter().map(|n| n.to_string()).collect();
        self.push_rule(needles, MockReply::Text(response.into()));
    }

    /// Fail with `error` whenever the prompt contains `needle`
    pub fn add_error(&mut self, needle: impl Into<String>, error: LlmError) {
        self.push_rule(vec![needle.into()], MockReply::Error(error));
    }

    /// Fail the next `times` calls with `error`, regardless of prompt
    pub fn fail_next(&self, times: usize, error: LlmError) {
        let mut failures = lock(&self.scripted_failures);
        failures.extend(std::iter::repeat(error).take(times));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *lock(&self.call_count) = 0;
    }

    fn push_rule(&mut self, needles: Vec<String>, reply: MockReply) {
        lock(&self.rules).push(MockRule { needles, reply });
    }

    fn reply_for(&self, prompt: &str) -> Result<String, LlmError> {
        *lock(&self.call_count) += 1;

        if let Some(error) = lock(&self.scripted_failures).pop_front() {
            return Err(error);
        }

        let rules = lock(&self.rules);
        let matched = rules
            .iter()
            .find(|rule| rule.needles.iter().all(|n| prompt.contains(n.as_str())));

        match matched.map(|rule| &rule.reply) {
            Some(MockReply::Text(text)) => Ok(text.clone()),
            Some(MockReply::Error(error)) => Err(error.clone()),
            None => Ok(self.default_response.clone()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmProvider for MockProvider {
    type Error = LlmError;

    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, LlmError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let text = self.reply_for(prompt)?;
        Ok(Generation::new(text, self.usage))
    }
}
