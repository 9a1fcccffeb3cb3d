//! OMOP concept mapping for free-text clinical terms.
//!
//! Front-ends (console menu, CSV batch, web form) all delegate to a
//! [`mapping::ConceptMapper`]: either the fixed mock or a local language
//! model whose JSON answer is extracted from its free-text response.

pub mod batch;
pub mod config;
pub mod console;
pub mod error;
pub mod extract;
pub mod llm;
pub mod llm_mapper;
pub mod mapping;
pub mod prompt;
pub mod web;

pub use error::{MapperError, Result};
pub use mapping::{mock_map_clinical_term, ConceptMapper, MappingResult, MockMapper};
