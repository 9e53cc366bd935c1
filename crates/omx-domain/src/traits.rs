//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the extraction core and
//! infrastructure. Implementations live in other crates.

use crate::failure::ClassifiedError;
use crate::geo::Coordinates;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::AddAssign;

/// Per-call model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (provider specific)
    pub model_id: String,

    /// Cap on response length in tokens
    pub max_tokens: u32,

    /// Sampling temperature; 0 is recommended for structured extraction
    pub temperature: f32,
}

/// Tokens billed for one or more model calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u64,

    /// Completion tokens
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Usage of a single call
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Input plus output tokens
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A completed model call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Response text
    pub text: String,

    /// Tokens the call consumed; zero when the provider does not report it
    pub usage: TokenUsage,
}

impl Generation {
    /// A response with its reported usage
    pub fn new(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (omx-llm)
pub trait LlmProvider: Send + Sync {
    /// Error type for LLM operations
    type Error: ClassifiedError + Send + Sync + 'static;

    /// Provider name for logs and record metadata
    fn name(&self) -> &str;

    /// Generate a text completion for `prompt`
    fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<Generation, Self::Error>> + Send;
}

/// Trait for address geocoding
///
/// Implemented by the infrastructure layer (omx-geocoder)
pub trait Geocoder: Send + Sync {
    /// Error type for geocoding operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve a free-form address to coordinates
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Coordinates, Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage += TokenUsage::new(1_200, 80);
        usage += TokenUsage::new(900, 45);
        assert_eq!(usage, TokenUsage::new(2_100, 125));
        assert_eq!(usage.total(), 2_225);
    }
}
