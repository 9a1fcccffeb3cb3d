//! Concept mapping
//!
//! A mapping associates a free-text clinical term with an OMOP concept id,
//! the vocabulary it comes from and the concept's canonical name. Every
//! front-end goes through [`ConceptMapper`].

use crate::config::{Backend, MapperConfig};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::llm_mapper::LlmMapper;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::info;

pub const MOCK_CONCEPT_ID: &str = "12345";

/// Result of mapping one clinical term.
///
/// Serialized with the upper-case keys the model is asked to emit. All four
/// keys are always present; keys the model leaves out come back empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MappingResult {
    #[serde(rename = "CONCEPT_ID", default, deserialize_with = "string_or_number")]
    pub concept_id: String,

    /// Vocabulary name (SNOMED, ICD10CM, LOINC, ...)
    #[serde(rename = "CODE", default, deserialize_with = "string_or_number")]
    pub code: String,

    #[serde(rename = "NAME", default, deserialize_with = "string_or_number")]
    pub name: String,

    /// Justification, or the error message for a failed mapping
    #[serde(rename = "REASON", default, deserialize_with = "string_or_number")]
    pub reason: String,
}

impl MappingResult {
    /// Placeholder for a model response that held no usable JSON object.
    pub fn unparsed(raw: &str) -> Self {
        Self {
            reason: format!("Could not parse LLM output: {}", raw),
            ..Self::default()
        }
    }

    /// True when no concept was identified (placeholder records).
    pub fn is_unmapped(&self) -> bool {
        self.concept_id.trim().is_empty()
    }
}

/// Models regularly emit concept ids as bare numbers and occasionally `null`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[async_trait]
pub trait ConceptMapper: Send + Sync {
    /// Map a single clinical term.
    async fn map_term(&self, term: &str) -> Result<MappingResult>;

    /// Short label used in logs and the health endpoint.
    fn name(&self) -> &str;
}

/// Fixed mapping used for demos and tests.
pub fn mock_map_clinical_term(term: &str) -> MappingResult {
    MappingResult {
        concept_id: MOCK_CONCEPT_ID.to_string(),
        code: "SNOMED".to_string(),
        name: "Mock Concept".to_string(),
        reason: format!("Mock mapping for '{}'", term),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockMapper;

#[async_trait]
impl ConceptMapper for MockMapper {
    async fn map_term(&self, term: &str) -> Result<MappingResult> {
        Ok(mock_map_clinical_term(term))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build the mapper selected by `config.backend`.
pub fn build_mapper(config: &MapperConfig) -> Result<Arc<dyn ConceptMapper>> {
    match config.backend {
        Backend::Mock => {
            info!("Using mock concept mapper");
            Ok(Arc::new(MockMapper))
        }
        Backend::Llm => {
            info!(
                "Using local LLM mapper ({} at {})",
                config.llm.model, config.llm.base_url
            );
            let client = LlmClient::new(config.llm.clone())?;
            Ok(Arc::new(LlmMapper::new(client)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_mapper() {
        let result = MockMapper.map_term("Blood Pressure").await.unwrap();
        assert_eq!(result.concept_id, "12345");
        assert!(result.reason.contains("Blood Pressure"));
        assert!(!result.is_unmapped());
    }

    #[test]
    fn test_serializes_all_keys() {
        let json = serde_json::to_value(mock_map_clinical_term("Heart rate")).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["CONCEPT_ID", "CODE", "NAME", "REASON"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(obj.len(), 4);
    }

    #[test]
    fn test_deserialize_numeric_and_missing_fields() {
        let result: MappingResult =
            serde_json::from_str(r#"{"CONCEPT_ID": 3004249, "NAME": null, "EXTRA": "x"}"#).unwrap();
        assert_eq!(result.concept_id, "3004249");
        assert_eq!(result.name, "");
        assert_eq!(result.code, "");
        assert_eq!(result.reason, "");
    }

    #[test]
    fn test_unparsed_placeholder() {
        let result = MappingResult::unparsed("I am not sure.");
        assert!(result.is_unmapped());
        assert!(result.code.is_empty());
        assert!(result.name.is_empty());
        assert_eq!(result.reason, "Could not parse LLM output: I am not sure.");
    }

    #[test]
    fn test_build_mock_mapper() {
        let mapper = build_mapper(&MapperConfig::default()).unwrap();
        assert_eq!(mapper.name(), "mock");
    }
}
