//! Configuration for the Extractor

use crate::error::{ChunkingError, ExtractorError};
use omx_domain::GenerationOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How fields are split across prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// One prompt per field group per chunk (4 calls per chunk)
    #[default]
    Grouped,
    /// One prompt covering all 19 fields per chunk
    SinglePrompt,
}

/// Model settings passed to every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model identifier, provider specific
    pub model_id: String,

    /// Response length cap in tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl ModelSettings {
    /// Options for a single provider call
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            model_id: self.model_id.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

/// Retry behaviour for transient model failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per task, including the first
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay (milliseconds)
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 8_000,
        }
    }
}

/// Configuration for the Extractor
///
/// Keys missing from a TOML document take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum chunk size (characters)
    pub max_chunk_size: usize,

    /// Characters shared between consecutive chunks
    pub overlap_size: usize,

    /// Number of concurrent model calls
    pub worker_count: usize,

    /// Prompt grouping strategy
    pub grouping: GroupingMode,

    /// Deadline for a single model call (seconds)
    pub task_timeout_secs: u64,

    /// Model settings
    pub model: ModelSettings,

    /// Retry behaviour
    pub retry: RetryConfig,
}

impl ExtractorConfig {
    /// Get the task timeout as a Duration
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.max_chunk_size == 0 || self.max_chunk_size <= self.overlap_size {
            return Err(ChunkingError {
                max_chunk_size: self.max_chunk_size,
                overlap_size: self.overlap_size,
            }
            .into());
        }
        if self.worker_count == 0 {
            return Err(config_error("worker_count must be greater than 0"));
        }
        if self.model.model_id.trim().is_empty() {
            return Err(config_error("model.model_id must not be empty"));
        }
        if self.model.max_tokens == 0 {
            return Err(config_error("model.max_tokens must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err(config_error("model.temperature must be between 0.0 and 1.0"));
        }
        if self.task_timeout_secs == 0 {
            return Err(config_error("task_timeout_secs must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error("retry.max_attempts must be at least 1"));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(config_error(
                "retry.initial_backoff_ms cannot exceed retry.max_backoff_ms",
            ));
        }
        Ok(())
    }

    /// Serial preset: one worker, no retries; for debugging and tests
    pub fn serial() -> Self {
        Self {
            worker_count: 1,
            retry: RetryConfig {
                max_attempts: 1,
                ..RetryConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}

fn config_error(message: &str) -> ExtractorError {
    ExtractorError::Config(message.to_string())
}

impl Default for ExtractorConfig {
    /// Default configuration: 10k character chunks, 4 workers, grouped prompts
    fn default() -> Self {
        Self {
            max_chunk_size: 10_000,
            overlap_size: 500,
            worker_count: 4,
            grouping: GroupingMode::Grouped,
            task_timeout_secs: 120,
            model: ModelSettings::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.temperature, 0.0);
    }

    #[test]
    fn test_serial_config_is_valid() {
        let config = ExtractorConfig::serial();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_count, 1);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = ExtractorConfig::default();
        config.overlap_size = config.max_chunk_size;
        assert!(matches!(
            config.validate(),
            Err(ExtractorError::Chunking(_))
        ));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = ExtractorConfig::default();
        config.max_chunk_size = 0;
        config.overlap_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ExtractorError::Chunking(_))
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = ExtractorConfig::default();
        config.worker_count = 0;
        assert!(matches!(config.validate(), Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_backoff_bounds_checked() {
        let mut config = ExtractorConfig::default();
        config.retry.initial_backoff_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_temperature_range() {
        let mut config = ExtractorConfig::default();
        config.model.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ExtractorConfig::default();
        config.grouping = GroupingMode::SinglePrompt;
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config, parsed);
        assert!(toml_str.contains("grouping = \"single_prompt\""));
    }

    #[test]
    fn test_toml_sections_default() {
        let parsed = ExtractorConfig::from_toml(
            "max_chunk_size = 2000\noverlap_size = 100\nworker_count = 2\ntask_timeout_secs = 30\n",
        )
        .unwrap();
        assert_eq!(parsed.grouping, GroupingMode::Grouped);
        assert_eq!(parsed.retry, RetryConfig::default());
        assert_eq!(parsed.model, ModelSettings::default());
    }

    #[test]
    fn test_toml_missing_keys_default() {
        let parsed =
            ExtractorConfig::from_toml("worker_count = 8\n[model]\nmodel_id = \"llama3.1\"\n")
                .unwrap();
        assert_eq!(parsed.worker_count, 8);
        assert_eq!(parsed.max_chunk_size, 10_000);
        assert_eq!(parsed.model.model_id, "llama3.1");
        assert_eq!(parsed.model.max_tokens, 4096);
    }

    #[test]
    fn test_options_from_settings() {
        let options = ModelSettings::default().options();
        assert_eq!(options.max_tokens, 4096);
    }
}
