//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{
        attach_location, extract, Extractor, ExtractorConfig, ExtractorError, FieldStatus,
        FieldValue, GroupingMode, RecordStatus, RetryConfig,
    };
    use chrono::NaiveDate;
    use omx_domain::{Coordinates, SchemaRegistry, FIELD_COUNT};
    use omx_geocoder::MockGeocoder;
    use omx_llm::{LlmError, MockProvider};
    use std::sync::Arc;

    /// One chunk per section with the test chunking parameters
    fn document(sections: usize) -> String {
        (0..sections)
            .map(|i| format!("Section{:02} filler words here. ", i))
            .collect()
    }

    fn test_config(workers: usize) -> ExtractorConfig {
        ExtractorConfig {
            max_chunk_size: 31,
            overlap_size: 1,
            worker_count: workers,
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
            ..ExtractorConfig::default()
        }
    }

    /// Group prompts are told apart by a field name only that group asks for
    fn scripted_provider() -> MockProvider {
        let mut llm = MockProvider::new("Sorry, I could not find that information.");
        llm.add_response_all(
            &["\"tenant_name\"", "part 1 of"],
            r#"{"tenant_name": "Acme Corp", "city": "Austin"}"#,
        );
        llm.add_response_all(
            &["\"tenant_name\"", "part 2 of"],
            r#"{"tenant_name": "Acme Corporation", "state": "TX"}"#,
        );
        llm.add_response(
            "\"sales_price\"",
            r#"```json
{"sales_price": "$1,250,000.00", "annual_rent": "N/A", "lease_type": "NNN"}
```"#,
        );
        llm.add_response(
            "\"lease_expiration_date\"",
            r#"{"lease_expiration_date": "January 5, 2024", "sale_date": "TBD"}"#,
        );
        llm
    }

    #[tokio::test]
    async fn test_full_extraction_flow() {
        let extractor = Extractor::new(scripted_provider(), test_config(4)).unwrap();
        let record = extractor.extract(&document(2)).await;

        assert_eq!(record.fields.len(), FIELD_COUNT);
        assert_eq!(record.status, RecordStatus::Partial);

        let tenant = record.get("tenant_name").unwrap();
        assert_eq!(tenant.value, FieldValue::Text("Acme Corp".into()));
        assert_eq!(tenant.source.unwrap().chunk_index, 0);
        assert_eq!(tenant.alternates.len(), 1);
        assert_eq!(tenant.alternates[0].value, FieldValue::Text("Acme Corporation".into()));

        assert_eq!(record.value("state"), Some(&FieldValue::Text("TX".into())));
        assert_eq!(record.value("sales_price"), Some(&FieldValue::Decimal(1_250_000.0)));

        let rent = record.get("annual_rent").unwrap();
        assert_eq!(rent.value, FieldValue::NotFound);
        assert_eq!(rent.status, FieldStatus::NotFound);

        assert_eq!(
            record.value("lease_expiration_date").and_then(FieldValue::as_date),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(record.get("sale_date").unwrap().status, FieldStatus::CoercionFailed);

        // Physical property prompts got prose back
        assert_eq!(record.failures.len(), 2);
        assert!(record.failures.iter().all(|f| f.group_id == 3));

        assert_eq!(record.stats.chunk_count, 2);
        assert_eq!(record.stats.task_count, 8);
        assert_eq!(record.stats.failed_tasks, 2);
        assert_eq!(record.stats.model_calls, 8);
        assert_eq!(record.stats.provider, "mock");
    }

    #[tokio::test]
    async fn test_token_usage_totals_answered_calls() {
        let mut llm = MockProvider::new("{}").with_usage(100, 20);
        llm.add_error("Section01", LlmError::Authentication("denied".into()));
        let extractor = Extractor::new(llm, test_config(2)).unwrap();

        let record = extractor.extract(&document(2)).await;

        // Four tasks read the refused chunk and report no usage
        assert_eq!(record.stats.task_count, 8);
        assert_eq!(record.stats.input_tokens, 400);
        assert_eq!(record.stats.output_tokens, 80);
    }

    #[tokio::test]
    async fn test_extraction_with_invalid_json() {
        let llm = MockProvider::new("This is not JSON");
        let extractor = Extractor::new(llm, test_config(4)).unwrap();

        let record = extractor.extract(&document(3)).await;

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.fields.len(), FIELD_COUNT);
        assert!(record.fields.iter().all(|f| f.value == FieldValue::NotFound));
        assert_eq!(record.failures.len(), 12);
        assert_eq!(record.stats.failed_tasks, 12);
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_result() {
        let text = document(5);
        let serial = Extractor::new(scripted_provider(), test_config(1))
            .unwrap()
            .extract(&text)
            .await;
        let parallel = Extractor::new(
            scripted_provider().with_latency(std::time::Duration::from_millis(2)),
            test_config(4),
        )
        .unwrap()
        .extract(&text)
        .await;

        assert_eq!(serial.fields, parallel.fields);
        assert_eq!(serial.status, parallel.status);
        assert_eq!(serial.failures, parallel.failures);
        assert_ne!(serial.run_id, parallel.run_id);
    }

    #[tokio::test]
    async fn test_transient_errors_retried() {
        let llm = Arc::new(scripted_provider());
        llm.fail_next(2, LlmError::Timeout);
        let extractor = Extractor::with_shared(Arc::clone(&llm), test_config(1)).unwrap();

        let record = extractor.extract(&document(1)).await;

        assert_eq!(record.stats.model_calls, 6);
        assert_eq!(llm.call_count(), 6);
        assert_eq!(record.value("sales_price"), Some(&FieldValue::Decimal(1_250_000.0)));
        // Retries succeeded; only the prose replies count as failed
        assert!(record.failures.iter().all(|f| f.reason.contains("no JSON")));
        assert_eq!(record.stats.failed_tasks, 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let mut llm = MockProvider::new("{}");
        llm.add_error("part", LlmError::Authentication("invalid x-api-key".into()));
        let llm = Arc::new(llm);
        let extractor = Extractor::with_shared(Arc::clone(&llm), test_config(2)).unwrap();

        let record = extractor.extract(&document(2)).await;

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(llm.call_count(), 8);
        assert_eq!(record.failures.len(), 8);
        assert!(record.failures[0].reason.contains("invalid x-api-key"));
    }

    #[tokio::test]
    async fn test_single_prompt_mode() {
        let mut llm = MockProvider::new("{}");
        llm.add_response_all(
            &["\"tenant_name\"", "\"rent_commencement_date\""],
            r#"{"Tenant Name": "Starbucks", "Building SF": "2,500 SF", "Rent Commencement Date": "2019-07-01"}"#,
        );
        let config = ExtractorConfig {
            grouping: GroupingMode::SinglePrompt,
            ..test_config(2)
        };
        let extractor = Extractor::new(llm, config).unwrap();

        let record = extractor.extract(&document(2)).await;

        assert_eq!(record.stats.task_count, 2);
        assert_eq!(record.get("tenant_name").unwrap().source.unwrap().group_id, 0);
        assert_eq!(record.value("building_sf"), Some(&FieldValue::Decimal(2_500.0)));
        assert_eq!(record.extracted_count(), 3);
    }

    #[tokio::test]
    async fn test_short_document_single_chunk() {
        let extractor = Extractor::new(scripted_provider(), ExtractorConfig::serial()).unwrap();
        let record = extractor.extract("Tenant: Acme Corp. Austin, TX.").await;

        assert_eq!(record.stats.chunk_count, 1);
        assert_eq!(record.stats.task_count, SchemaRegistry::groups().len());
        // A lone chunk is not labelled as a part, so only the untagged rules match
        assert_eq!(record.value("tenant_name"), Some(&FieldValue::NotFound));
        assert_eq!(record.value("lease_type"), Some(&FieldValue::Text("NNN".into())));
    }

    #[tokio::test]
    async fn test_empty_document() {
        let llm = Arc::new(MockProvider::new("{}"));
        let record = extract(Arc::clone(&llm), "  \n ", test_config(4)).await.unwrap();

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.fields.len(), FIELD_COUNT);
        assert_eq!(llm.call_count(), 0);
        assert_eq!(record.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let config = ExtractorConfig {
            max_chunk_size: 100,
            overlap_size: 100,
            ..ExtractorConfig::default()
        };
        let result = extract(Arc::new(MockProvider::default()), "text", config).await;
        assert!(matches!(result, Err(ExtractorError::Chunking(_))));

        let config = ExtractorConfig {
            worker_count: 0,
            ..ExtractorConfig::default()
        };
        assert!(matches!(
            Extractor::new(MockProvider::default(), config),
            Err(ExtractorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_record_and_location() {
        let mut llm = MockProvider::new("{}");
        llm.add_response(
            "\"tenant_name\"",
            r#"{"tenant_name": "Dollar General", "property_address": "100 Congress Ave",
                "city": "Austin", "state": "TX", "submarket_name": null}"#,
        );
        llm.add_response(
            "\"sales_price\"",
            r#"{"sales_price": 1500000, "annual_rent": 95000, "lease_type": "Absolute NNN"}"#,
        );
        llm.add_response("\"building_sf\"", r#"{"building_sf": 9100}"#);
        llm.add_response(
            "\"lease_expiration_date\"",
            r#"{"lease_expiration_date": "2038-03-31"}"#,
        );

        let extractor = Extractor::new(llm, ExtractorConfig::serial()).unwrap();
        let mut record = extractor.extract("A single short OM page.").await;
        assert_eq!(record.status, RecordStatus::Complete);
        assert!(record.missing_required().is_empty());

        let austin = Coordinates::new(30.2672, -97.7431).unwrap();
        let geocoder = MockGeocoder::new().with_location("100 Congress Ave, Austin, TX", austin);
        attach_location(&mut record, &geocoder).await;
        assert_eq!(record.location, Some(austin));
        assert_eq!(record.status, RecordStatus::Complete);
    }

    #[tokio::test]
    async fn test_record_serializes_every_field() {
        let extractor = Extractor::new(scripted_provider(), test_config(2)).unwrap();
        let record = extractor.extract(&document(2)).await;

        let json = serde_json::to_value(&record).unwrap();
        let fields = json["fields"].as_array().unwrap();
        assert_eq!(fields.len(), FIELD_COUNT);
        assert_eq!(json["status"], "partial");
        assert_eq!(fields[0]["name"], "tenant_name");
        assert_eq!(fields[0]["value"], "Acme Corp");
        assert!(json["fields"][5]["value"].is_number());
    }
}
