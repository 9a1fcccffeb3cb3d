//! Runtime configuration
//!
//! Values come from the process environment (a `.env` file is loaded by the
//! binaries before this runs). Every setting has a default so the mock
//! mapper works out of the box.

use crate::error::{MapperError, Result};
use crate::llm::LlmApi;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_INPUT_CSV: &str = "input_terms.csv";
pub const DEFAULT_OUTPUT_CSV: &str = "output_mappings.csv";

/// Which mapping implementation the front-ends delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    Llm,
}

impl FromStr for Backend {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "llm" | "local" => Ok(Backend::Llm),
            other => Err(MapperError::Config(format!(
                "unknown mapper backend '{}' (expected 'mock' or 'llm')",
                other
            ))),
        }
    }
}

/// Settings for the local model server.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api: LlmApi,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api: LlmApi::Completion,
            model: "mistral-7b-instruct-v0.1.Q4_K_M".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 256,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub backend: Backend,
    pub llm: LlmConfig,
    pub bind_addr: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mock,
            llm: LlmConfig::default(),
            bind_addr: "127.0.0.1:8501".to_string(),
        }
    }
}

impl MapperConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Unset or blank keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("OMOP_MAPPER_BACKEND") {
            config.backend = v.parse()?;
        }
        if let Some(v) = get("OMOP_LLM_BASE_URL") {
            config.llm.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("OMOP_LLM_API") {
            config.llm.api = v.parse()?;
        }
        if let Some(v) = get("OMOP_LLM_MODEL") {
            config.llm.model = v.trim().to_string();
        }
        config.llm.api_key = get("OMOP_LLM_API_KEY");
        if let Some(v) = get("OMOP_LLM_TEMPERATURE") {
            config.llm.temperature = parse_number("OMOP_LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("OMOP_LLM_MAX_TOKENS") {
            config.llm.max_tokens = parse_number("OMOP_LLM_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("OMOP_LLM_TIMEOUT_SECS") {
            config.llm.timeout = Duration::from_secs(parse_number("OMOP_LLM_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("OMOP_BIND_ADDR") {
            config.bind_addr = v.trim().to_string();
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MapperError::Config(format!("{} has an invalid value: '{}'", key, value)))
}
