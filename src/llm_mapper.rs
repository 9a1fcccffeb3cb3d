//! Concept mapping through a local language model.

use crate::error::Result;
use crate::extract::map_response_or_placeholder;
use crate::llm::TextGenerator;
use crate::mapping::{ConceptMapper, MappingResult};
use crate::prompt::build_mapping_prompt;
use async_trait::async_trait;
use tracing::debug;

pub struct LlmMapper<G> {
    generator: G,
}

impl<G: TextGenerator> LlmMapper<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl<G: TextGenerator> ConceptMapper for LlmMapper<G> {
    /// Model invocation errors propagate; an unparseable answer becomes a
    /// placeholder record.
    async fn map_term(&self, term: &str) -> Result<MappingResult> {
        let prompt = build_mapping_prompt(term);
        let raw = self.generator.generate(&prompt).await?;
        debug!("Raw output for '{}': {}", term, raw);
        Ok(map_response_or_placeholder(&raw))
    }

    fn name(&self) -> &str {
        "llm"
    }
}
