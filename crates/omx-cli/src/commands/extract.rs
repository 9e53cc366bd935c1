//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::{Config, ProviderKind};
use crate::document::read_document;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use omx_domain::LlmProvider;
use omx_extractor::{
    attach_location, ExtractionRecord, Extractor, ExtractorConfig, GroupingMode, ModelSettings,
};
use omx_geocoder::NominatimGeocoder;
use omx_llm::{ollama, AnthropicProvider, OllamaProvider};
use tracing::info;

/// Execute the extract command.
pub async fn execute_extract(
    args: ExtractArgs,
    mut config: Config,
    formatter: &Formatter,
) -> Result<()> {
    apply_overrides(&args, &mut config);
    config.extractor.validate()?;

    let text = read_document(&args.file).await?;
    info!(
        file = %args.file.display(),
        chars = text.chars().count(),
        "Document loaded"
    );

    let mut record = match config.provider.kind {
        ProviderKind::Anthropic => {
            let api_key = args
                .api_key
                .clone()
                .or_else(|| config.api_key_from_env())
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "No API key: pass --api-key or set {}",
                        config.provider.api_key_env
                    ))
                })?;
            let llm = match &config.provider.endpoint {
                Some(endpoint) => AnthropicProvider::with_endpoint(api_key, endpoint)?,
                None => AnthropicProvider::new(api_key)?,
            };
            run_extraction(llm, &text, &config.extractor).await?
        }
        ProviderKind::Ollama => {
            let endpoint = config
                .provider
                .endpoint
                .clone()
                .unwrap_or_else(|| ollama::DEFAULT_ENDPOINT.to_string());
            let llm = OllamaProvider::with_timeout(endpoint, config.extractor.task_timeout());
            run_extraction(llm, &text, &config.extractor).await?
        }
    };

    if config.geocoding.enabled && !args.no_geocode {
        let geocoding = &config.geocoding;
        let geocoder = NominatimGeocoder::new(
            geocoding.endpoint.as_str(),
            &geocoding.user_agent,
            geocoding.min_interval(),
        )?;
        attach_location(&mut record, &geocoder).await;
    }

    println!("{}", formatter.format_record(&record)?);

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&record)?)?;
        // stderr keeps JSON on stdout parseable
        eprintln!("{}", formatter.success(&format!("Record written to {}", path.display())));
    }

    Ok(())
}

/// Apply command-line flags on top of the file configuration.
fn apply_overrides(args: &ExtractArgs, config: &mut Config) {
    if let Some(provider) = args.provider {
        config.provider.kind = provider.into();
    }
    if let Some(endpoint) = &args.endpoint {
        config.provider.endpoint = Some(endpoint.clone());
    }
    if let Some(model) = &args.model {
        config.extractor.model.model_id = model.clone();
    }
    if let Some(workers) = args.workers {
        config.extractor.worker_count = workers;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.extractor.max_chunk_size = chunk_size;
    }
    if args.single_prompt {
        config.extractor.grouping = GroupingMode::SinglePrompt;
    }

    // The built-in model is a hosted one that Ollama cannot serve
    let hosted_default = ModelSettings::default().model_id;
    if config.provider.kind == ProviderKind::Ollama
        && config.extractor.model.model_id == hosted_default
    {
        info!(model = ollama::DEFAULT_MODEL, "Using the Ollama default model");
        config.extractor.model.model_id = ollama::DEFAULT_MODEL.to_string();
    }
}

async fn run_extraction<L: LlmProvider + 'static>(
    llm: L,
    text: &str,
    config: &ExtractorConfig,
) -> Result<ExtractionRecord> {
    let extractor = Extractor::new(llm, config.clone())?;
    Ok(extractor.extract(text).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use omx_extractor::{ExtractorError, RecordStatus};
    use omx_llm::MockProvider;

    fn extract_args(argv: &[&str]) -> ExtractArgs {
        let mut full = vec!["omx", "extract", "deal.pdf"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Extract(args) => args,
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_flags_override_file() {
        let args = extract_args(&[
            "--provider",
            "ollama",
            "--endpoint",
            "http://gpu-box:11434",
            "-m",
            "llama3.1:70b",
            "-w",
            "8",
            "--chunk-size",
            "4000",
            "--single-prompt",
        ]);
        let mut config = Config::default();
        apply_overrides(&args, &mut config);

        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert_eq!(config.provider.endpoint.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.extractor.model.model_id, "llama3.1:70b");
        assert_eq!(config.extractor.worker_count, 8);
        assert_eq!(config.extractor.max_chunk_size, 4000);
        assert_eq!(config.extractor.grouping, GroupingMode::SinglePrompt);
        assert!(config.extractor.validate().is_ok());
    }

    #[test]
    fn test_file_values_kept_without_flags() {
        let args = extract_args(&["--no-geocode"]);
        let mut config = Config::default();
        config.extractor.worker_count = 3;
        config.provider.kind = ProviderKind::Ollama;
        apply_overrides(&args, &mut config);

        assert_eq!(config.extractor.worker_count, 3);
        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert_eq!(config.extractor.grouping, GroupingMode::Grouped);
    }

    #[test]
    fn test_ollama_replaces_hosted_default_model() {
        let args = extract_args(&["--provider", "ollama"]);
        let mut config = Config::default();
        apply_overrides(&args, &mut config);

        assert_eq!(config.extractor.model.model_id, ollama::DEFAULT_MODEL);
    }

    #[test]
    fn test_ollama_keeps_configured_model() {
        let args = extract_args(&["--provider", "ollama"]);
        let mut config = Config::default();
        config.extractor.model.model_id = "qwen2.5:14b".to_string();
        apply_overrides(&args, &mut config);
        assert_eq!(config.extractor.model.model_id, "qwen2.5:14b");

        let mut config = Config::default();
        apply_overrides(&extract_args(&[]), &mut config);
        assert_eq!(config.extractor.model.model_id, ModelSettings::default().model_id);
    }

    #[tokio::test]
    async fn test_run_extraction() {
        let mut llm = MockProvider::new("{}");
        llm.add_response("\"tenant_name\"", r#"{"tenant_name": "Walgreens", "state": "OH"}"#);

        let record = run_extraction(llm, "Walgreens, Columbus OH", &ExtractorConfig::serial())
            .await
            .unwrap();
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.extracted_count(), 2);
    }

    #[tokio::test]
    async fn test_run_extraction_rejects_bad_config() {
        let config = ExtractorConfig {
            max_chunk_size: 10,
            overlap_size: 20,
            ..ExtractorConfig::default()
        };
        let result = run_extraction(MockProvider::default(), "text", &config).await;
        assert!(matches!(result, Err(CliError::Extractor(ExtractorError::Chunking(_)))));
    }
}
