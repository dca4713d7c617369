//! Locale tables for the free-text heuristics.
//!
//! Everything language-specific the parser looks for (block headers, field
//! labels, fallback keywords, placeholder titles) lives here so another
//! phrasing can be loaded from JSON instead of edited into the code.

use crate::utils::text::TextCleaner;
use anyhow::{Context as _, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a free-text block start marker relates to the text after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// `Сегмент 1: ...` style headers; the text up to the next header is one segment.
    Header,
    /// `1. ...` list items.
    Numbered,
    /// `Label: text` lines; the capture group `label` holds the title.
    KeyValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPattern {
    pub name: String,
    pub kind: BlockKind,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTable {
    /// Tried in order; the first one yielding enough segments wins.
    pub block_patterns: Vec<BlockPattern>,
    pub title_labels: Vec<String>,
    pub description_labels: Vec<String>,
    /// Known audience phrases for the last-resort keyword scan.
    pub keywords: Vec<String>,
    /// `{n}` is replaced with the 1-based position.
    pub placeholder_title: String,
    pub fallback_title: String,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::russian()
    }
}

impl PatternTable {
    pub fn russian() -> Self {
        let block_patterns = vec![
            BlockPattern {
                name: "segment_header".to_string(),
                kind: BlockKind::Header,
                pattern: r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?(?:сегмент|segment|#)[ \t]*№?[ \t]*\d{1,3}(?:\*\*)?[ \t]*[:.)\-–—]?(?:\*\*)?[ \t]*".to_string(),
            },
            BlockPattern {
                name: "numbered_list".to_string(),
                kind: BlockKind::Numbered,
                pattern: r"(?m)^[ \t]*(?:\*\*)?\d{1,3}[.)](?:\*\*)?[ \t]+".to_string(),
            },
            BlockPattern {
                name: "label_value".to_string(),
                kind: BlockKind::KeyValue,
                pattern: r"(?m)^[ \t]*(?:[-*•][ \t]+)?(?:\*\*)?(?P<label>[^\n:*\[\]{}]{2,60}?)(?:\*\*)?[ \t]*:(?:\*\*)?[ \t]*".to_string(),
            },
        ];

        Self {
            block_patterns,
            title_labels: strings(&[
                "Название аудитории",
                "Название сегмента",
                "Название",
                "Сегмент",
                "title",
                "name",
                "segment_name",
            ]),
            description_labels: strings(&[
                "Пояснение",
                "Описание",
                "Характеристика",
                "description",
                "details",
                "explanation",
                "content",
            ]),
            keywords: strings(&[
                "Корпоративные клиенты",
                "Молодожены",
                "Малый бизнес",
                "Молодые родители",
                "Студенты",
                "Пенсионеры",
                "Фрилансеры",
                "IT-специалисты",
            ]),
            placeholder_title: "Сегмент {n}".to_string(),
            fallback_title: "Результат анализа".to_string(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading pattern table {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing pattern table {}", path.display()))
    }

    pub fn compile(&self) -> CompiledPatterns {
        // Skip patterns that fail to compile instead of giving up on free text.
        let blocks = self
            .block_patterns
            .iter()
            .filter_map(|block| match Regex::new(&block.pattern) {
                Ok(regex) => Some(CompiledBlock {
                    name: block.name.clone(),
                    kind: block.kind,
                    regex,
                }),
                Err(e) => {
                    tracing::warn!(pattern = %block.name, "skipping block pattern: {}", e);
                    None
                }
            })
            .collect();

        let keywords = self
            .keywords
            .iter()
            .filter(|keyword| !keyword.trim().is_empty())
            .filter_map(|keyword| {
                Regex::new(&format!("(?i){}", regex::escape(keyword.trim())))
                    .ok()
                    .map(|regex| (keyword.trim().to_string(), regex))
            })
            .collect();

        let all_labels: Vec<&str> = self
            .title_labels
            .iter()
            .chain(self.description_labels.iter())
            .map(String::as_str)
            .collect();

        CompiledPatterns {
            blocks,
            keywords,
            title_labels: lowercase_all(&self.title_labels),
            description_labels: lowercase_all(&self.description_labels),
            title_label_line: label_line_regex(&self.title_labels),
            description_label_line: label_line_regex(&self.description_labels),
            cleaner: TextCleaner::new(&all_labels),
            placeholder_title: self.placeholder_title.clone(),
            fallback_title: self.fallback_title.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledBlock {
    pub name: String,
    pub kind: BlockKind,
    pub regex: Regex,
}

/// A [`PatternTable`] with every regex built once.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub blocks: Vec<CompiledBlock>,
    pub keywords: Vec<(String, Regex)>,
    title_labels: Vec<String>,
    description_labels: Vec<String>,
    /// Matches `Название: value` anywhere in a block, capturing `value`.
    pub title_label_line: Option<Regex>,
    pub description_label_line: Option<Regex>,
    pub cleaner: TextCleaner,
    placeholder_title: String,
    pub fallback_title: String,
}

impl CompiledPatterns {
    pub fn is_title_label(&self, label: &str) -> bool {
        self.title_labels.contains(&label.trim().to_lowercase())
    }

    pub fn is_description_label(&self, label: &str) -> bool {
        self.description_labels.contains(&label.trim().to_lowercase())
    }

    pub fn placeholder(&self, position: usize) -> String {
        self.placeholder_title.replace("{n}", &position.to_string())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.trim().to_lowercase()).collect()
}

fn label_line_regex(labels: &[String]) -> Option<Regex> {
    let mut escaped: Vec<String> = labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return None;
    }
    escaped.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    Regex::new(&format!(
        r"(?im)^[ \t]*(?:[-*•][ \t]+)?(?:\*\*)?(?:{})(?:\*\*)?[ \t]*:(?:\*\*)?[ \t]*(?P<value>.*)$",
        escaped.join("|")
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_compiles_every_pattern() {
        let table = PatternTable::russian();
        let compiled = table.compile();
        assert_eq!(compiled.blocks.len(), table.block_patterns.len());
        assert_eq!(compiled.keywords.len(), table.keywords.len());
        assert!(compiled.title_label_line.is_some());
        assert!(compiled.description_label_line.is_some());
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let mut table = PatternTable::russian();
        table.block_patterns.insert(
            0,
            BlockPattern {
                name: "broken".to_string(),
                kind: BlockKind::Header,
                pattern: "(unclosed".to_string(),
            },
        );
        let compiled = table.compile();
        assert_eq!(compiled.blocks.len(), 3);
        assert_eq!(compiled.blocks[0].name, "segment_header");
    }

    #[test]
    fn labels_match_case_insensitively() {
        let compiled = PatternTable::russian().compile();
        assert!(compiled.is_title_label("название"));
        assert!(compiled.is_description_label(" Пояснение "));
        assert!(!compiled.is_title_label("Пояснение"));
        assert_eq!(compiled.placeholder(3), "Сегмент 3");
    }

    #[test]
    fn table_round_trips_through_json() {
        let json = serde_json::to_string(&PatternTable::russian()).unwrap();
        let table: PatternTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table.block_patterns[2].kind, BlockKind::KeyValue);
        assert_eq!(table.fallback_title, "Результат анализа");
    }
}
