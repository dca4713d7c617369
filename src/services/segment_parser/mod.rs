//! Best-effort extraction of `{id, title, description}` segments from LLM output.
//!
//! Model responses arrive as clean JSON, JSON cut off mid-array, JSON buried
//! in prose or code fences, or plain numbered text. [`SegmentParser`] runs a
//! fixed cascade of strategies over the input and keeps the first one that
//! produces usable records. It never fails: the worst case is an empty list
//! or a single record holding the raw text.

mod free_text;
mod json;
pub mod mapping;
pub mod patterns;

use crate::config::ParserConfig;
use crate::models::ParsedSegment;
use crate::utils::text::truncate_chars;
use patterns::{CompiledPatterns, PatternTable};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

static DEFAULT_PARSER: LazyLock<SegmentParser> = LazyLock::new(SegmentParser::default);

/// Parses with the built-in Russian pattern table and default limits.
pub fn parse_segments(input: &Value) -> Vec<ParsedSegment> {
    DEFAULT_PARSER.parse(input)
}

/// A segment before numbering and placeholder titles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentDraft {
    pub title: String,
    pub description: String,
}

impl SegmentDraft {
    pub fn new(title: String, description: String) -> Self {
        Self { title, description }
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// What a strategy looks at: raw text, or a value that is already structured.
pub(crate) enum Input<'a> {
    Text(&'a str),
    Value(&'a Value),
}

impl Input<'_> {
    /// Structured values are serialized so the text strategies can still scan them.
    fn text(&self) -> Cow<'_, str> {
        match self {
            Input::Text(text) => Cow::Borrowed(text),
            Input::Value(value) => Cow::Owned(serde_json::to_string(value).unwrap_or_default()),
        }
    }
}

pub(crate) struct Context<'p> {
    parser: &'p SegmentParser,
    depth: usize,
}

impl Context<'_> {
    fn patterns(&self) -> &CompiledPatterns {
        &self.parser.patterns
    }

    fn config(&self) -> &ParserConfig {
        &self.parser.config
    }

    /// Re-runs the structural strategies on a nested value. Fallbacks are
    /// skipped so an empty wrapper never turns into a raw-text record.
    fn recurse(&self, value: &Value) -> Vec<SegmentDraft> {
        if self.depth >= self.parser.config.max_depth {
            tracing::debug!(depth = self.depth, "nesting limit reached");
            return Vec::new();
        }
        self.parser.dispatch(value, self.depth + 1, false)
    }
}

/// One step of the cascade.
pub(crate) trait SegmentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fallbacks only run at the top level.
    fn is_fallback(&self) -> bool {
        false
    }

    /// `None` (or an empty list) hands the input to the next strategy.
    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>>;
}

pub struct SegmentParser {
    config: ParserConfig,
    patterns: CompiledPatterns,
    strategies: Vec<Box<dyn SegmentStrategy>>,
}

impl Default for SegmentParser {
    fn default() -> Self {
        Self::new(ParserConfig::default(), &PatternTable::default())
    }
}

impl fmt::Debug for SegmentParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("SegmentParser")
            .field("config", &self.config)
            .field("strategies", &names)
            .finish()
    }
}

impl SegmentParser {
    pub fn new(config: ParserConfig, table: &PatternTable) -> Self {
        let strategies: Vec<Box<dyn SegmentStrategy>> = vec![
            Box::new(json::CorruptedFragments),
            Box::new(json::DirectJson),
            Box::new(json::StructuredValue),
            Box::new(json::EmbeddedJson),
            Box::new(free_text::FreeTextBlocks),
            Box::new(free_text::KeywordFallback),
            Box::new(free_text::SingleSegmentFallback),
        ];

        Self {
            config,
            patterns: table.compile(),
            strategies,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse(&self, input: &Value) -> Vec<ParsedSegment> {
        let drafts = self.dispatch(input, 0, true);
        self.finalize(drafts)
    }

    pub fn parse_str(&self, input: &str) -> Vec<ParsedSegment> {
        let drafts = self.run(&Input::Text(input), 0, true);
        self.finalize(drafts)
    }

    fn dispatch(&self, input: &Value, depth: usize, allow_fallback: bool) -> Vec<SegmentDraft> {
        match input {
            Value::Null => Vec::new(),
            Value::String(text) => self.run(&Input::Text(text), depth, allow_fallback),
            Value::Bool(_) | Value::Number(_) => {
                let text = input.to_string();
                self.run(&Input::Text(&text), depth, allow_fallback)
            }
            Value::Array(_) | Value::Object(_) => {
                self.run(&Input::Value(input), depth, allow_fallback)
            }
        }
    }

    fn run(&self, input: &Input<'_>, depth: usize, allow_fallback: bool) -> Vec<SegmentDraft> {
        let ctx = Context {
            parser: self,
            depth,
        };

        for strategy in &self.strategies {
            if strategy.is_fallback() && !allow_fallback {
                continue;
            }
            let Some(mut drafts) = strategy.apply(input, &ctx) else {
                tracing::trace!(strategy = strategy.name(), depth, "no match");
                continue;
            };
            drafts.retain(|draft| !draft.is_empty());
            if drafts.is_empty() {
                tracing::trace!(strategy = strategy.name(), depth, "matched nothing usable");
                continue;
            }
            tracing::debug!(strategy = strategy.name(), depth, count = drafts.len(), "segments extracted");
            return drafts;
        }

        Vec::new()
    }

    /// Drops empty drafts, fills missing titles and numbers the batch from 1.
    fn finalize(&self, drafts: Vec<SegmentDraft>) -> Vec<ParsedSegment> {
        drafts
            .into_iter()
            .filter(|draft| !draft.is_empty())
            .enumerate()
            .map(|(idx, draft)| {
                let id = idx + 1;
                let title = if draft.title.trim().is_empty() {
                    self.patterns.placeholder(id)
                } else {
                    truncate_chars(draft.title.trim(), self.config.title_max_chars)
                };
                ParsedSegment {
                    id,
                    title,
                    description: truncate_chars(draft.description.trim(), self.config.description_max_chars),
                }
            })
            .collect()
    }
}
