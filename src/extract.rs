//! Pulling a mapping out of free-text model output.
//!
//! Models wrap the JSON in prose or code fences, so the object is taken to
//! span from the first `{` to the last `}`.

use crate::error::{MapperError, Result};
use crate::mapping::MappingResult;
use tracing::warn;

/// Slice of `text` from the first `{` to the last `}` inclusive.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = text.trim();
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

pub fn parse_mapping_response(raw: &str) -> Result<MappingResult> {
    let json = extract_json_object(raw)
        .ok_or_else(|| MapperError::Parse("No JSON found in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| MapperError::Parse(e.to_string()))
}

/// Parsed mapping, or the placeholder record carrying the raw response.
pub fn map_response_or_placeholder(raw: &str) -> MappingResult {
    match parse_mapping_response(raw) {
        Ok(result) => result,
        Err(e) => {
            warn!("JSON parsing error: {}", e);
            MappingResult::unparsed(raw)
        }
    }
}
