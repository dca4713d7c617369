use crate::services::segment_parser::patterns::PatternTable;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Limits for [`crate::SegmentParser`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Text beyond this many chars is ignored by the free-text heuristics.
    pub max_input_chars: usize,
    pub title_max_chars: usize,
    pub description_max_chars: usize,
    /// How deep wrapper objects and re-encoded strings are followed.
    pub max_depth: usize,
    pub min_free_text_segments: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 50_000,
            title_max_chars: 100,
            description_max_chars: 500,
            max_depth: 4,
            min_free_text_segments: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            // Ollama's generate endpoint
            api_url: "http://localhost:11434/api/generate".to_string(),
            api_key: None,
            model: "llama2".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub llm: LlmConfig,
    pub parser: ParserConfig,
    pub patterns_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let llm_defaults = LlmConfig::default();
        let parser_defaults = ParserConfig::default();
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let llm = LlmConfig {
            api_url: lookup("LLM_API_URL").unwrap_or(llm_defaults.api_url),
            api_key: lookup("LLM_API_KEY"),
            model: lookup("LLM_MODEL").unwrap_or(llm_defaults.model),
            temperature: parse_or(&lookup, "LLM_TEMPERATURE", llm_defaults.temperature)?,
            timeout_secs: parse_or(&lookup, "LLM_TIMEOUT_SECS", llm_defaults.timeout_secs)?,
        };

        let parser = ParserConfig {
            max_input_chars: parse_or(&lookup, "SEGMENT_MAX_INPUT_CHARS", parser_defaults.max_input_chars)?,
            title_max_chars: parse_or(&lookup, "SEGMENT_TITLE_MAX_CHARS", parser_defaults.title_max_chars)?,
            description_max_chars: parse_or(
                &lookup,
                "SEGMENT_DESCRIPTION_MAX_CHARS",
                parser_defaults.description_max_chars,
            )?,
            ..parser_defaults
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            llm,
            parser,
            patterns_path: lookup("SEGMENT_PATTERNS_PATH").map(PathBuf::from),
        })
    }

    pub fn pattern_table(&self) -> Result<PatternTable> {
        match &self.patterns_path {
            Some(path) => PatternTable::from_json_file(path),
            None => Ok(PatternTable::default()),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}
