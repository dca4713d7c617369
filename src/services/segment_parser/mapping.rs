//! Turning loosely-typed JSON elements into segment drafts.

use super::SegmentDraft;
use crate::utils::text::{TextCleaner, split_at_first, split_sentences};
use serde_json::{Map, Value};

pub const TITLE_KEYS: &[&str] = &["title", "name", "segment_name"];
pub const DESCRIPTION_KEYS: &[&str] = &["description", "details", "explanation", "content"];
pub const WRAPPER_KEYS: &[&str] = &[
    "segments",
    "results",
    "data",
    "items",
    "audiences",
    "generated_segments",
];

/// Titles longer than this that contain a period carry the description too.
const LONG_TITLE_CHARS: usize = 50;
/// Beyond this a title with no description is split into sentences.
const RUN_ON_TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    /// Arrays and objects that parsed as JSON directly.
    Standard,
    /// Arrays dug out of surrounding prose; titles there tend to be whole sentences.
    Embedded,
}

/// First alias whose value is present and not an empty string.
pub fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| obj.get(*key)).find(|value| match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => join_items(items),
        other => other.to_string(),
    }
}

fn join_items(items: &[Value]) -> String {
    items
        .iter()
        .map(value_to_text)
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Description text with serialized arrays (`"[\"a\", \"b\"]"`) flattened.
pub fn description_text(value: &Value) -> String {
    match value {
        Value::String(s) if looks_like_array(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(Value::Array(items)) => join_items(&items),
            _ => s.clone(),
        },
        other => value_to_text(other),
    }
}

fn looks_like_array(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('[') && trimmed.ends_with(']')
}

/// A description that is an array, or a string holding one, marks output the
/// model mangled; such batches go through [`recover_corrupted`].
pub fn is_corrupted(item: &Value) -> bool {
    let Some(obj) = item.as_object() else {
        return false;
    };
    match field(obj, DESCRIPTION_KEYS) {
        Some(Value::Array(_)) => true,
        Some(Value::String(s)) => looks_like_array(s),
        _ => false,
    }
}

pub fn map_array(items: &[Value], cleaner: &TextCleaner, mode: MappingMode) -> Vec<SegmentDraft> {
    if items.iter().any(is_corrupted) {
        tracing::debug!(len = items.len(), "corrupted structure detected, recovering");
        return recover_corrupted(items, cleaner);
    }
    items
        .iter()
        .filter_map(|item| draft_from_value(item, cleaner, mode))
        .collect()
}

/// Salvages every element; anything that is not an object becomes a record
/// with only a description so the batch keeps its length and order.
pub fn recover_corrupted(items: &[Value], cleaner: &TextCleaner) -> Vec<SegmentDraft> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => draft_from_object(obj, cleaner, MappingMode::Standard),
            other => SegmentDraft::new(String::new(), cleaner.clean(&value_to_text(other))),
        })
        .collect()
}

pub fn draft_from_value(item: &Value, cleaner: &TextCleaner, mode: MappingMode) -> Option<SegmentDraft> {
    match item {
        Value::Object(obj) => Some(draft_from_object(obj, cleaner, mode)),
        Value::String(s) => Some(draft_from_text(s, cleaner)),
        _ => None,
    }
}

pub fn draft_from_object(obj: &Map<String, Value>, cleaner: &TextCleaner, mode: MappingMode) -> SegmentDraft {
    let title = field(obj, TITLE_KEYS).map(value_to_text).unwrap_or_default();
    let description = field(obj, DESCRIPTION_KEYS)
        .map(description_text)
        .unwrap_or_default();

    let title = cleaner.clean(&title);
    let description = cleaner.clean(&description);

    match mode {
        MappingMode::Standard => split_long_title(title, description, cleaner),
        MappingMode::Embedded => split_embedded_title(title, description, cleaner),
    }
}

/// A bare string in a list: `"Студенты: учатся в вузах"`.
pub fn draft_from_text(text: &str, cleaner: &TextCleaner) -> SegmentDraft {
    let text = cleaner.clean(text);
    if let Some((head, rest)) = split_at_first(&text, &[": ", ". "]) {
        if !head.is_empty() {
            return SegmentDraft::new(cleaner.clean(head), cleaner.clean(rest));
        }
    }
    split_run_on_title(text, String::new(), cleaner)
}

fn split_long_title(title: String, description: String, cleaner: &TextCleaner) -> SegmentDraft {
    if title.chars().count() > LONG_TITLE_CHARS {
        if let Some(idx) = title.find('.') {
            let head = title[..idx].trim();
            if !head.is_empty() {
                let rest = title[idx + 1..].trim();
                return SegmentDraft::new(cleaner.clean(head), prepend(rest, &description, cleaner));
            }
        }
    }
    SegmentDraft::new(title, description)
}

fn split_embedded_title(title: String, description: String, cleaner: &TextCleaner) -> SegmentDraft {
    if let Some((head, rest)) = split_at_first(&title, &[". ", ": "]) {
        if !head.is_empty() {
            return SegmentDraft::new(cleaner.clean(head), prepend(rest, &description, cleaner));
        }
    }
    split_run_on_title(title, description, cleaner)
}

/// First sentence becomes the title, its closing mark dropped.
pub fn split_run_on_title(title: String, description: String, cleaner: &TextCleaner) -> SegmentDraft {
    if description.is_empty() && title.chars().count() > RUN_ON_TITLE_CHARS {
        let sentences = split_sentences(&title);
        if sentences.len() > 1 {
            let head = sentences[0].trim_end_matches(['.', '!', '?', '…']);
            return SegmentDraft::new(cleaner.clean(head), cleaner.clean(&sentences[1..].join(" ")));
        }
    }
    SegmentDraft::new(title, description)
}

fn prepend(rest: &str, description: &str, cleaner: &TextCleaner) -> String {
    let joined = match (rest.trim().is_empty(), description.is_empty()) {
        (true, _) => description.to_string(),
        (false, true) => rest.to_string(),
        (false, false) => format!("{} {}", rest.trim(), description),
    };
    cleaner.clean(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(&["title", "description", "Название аудитории", "Пояснение"])
    }

    #[test]
    fn field_skips_empty_aliases() {
        let obj = json!({"title": "", "name": "Студенты", "segment_name": "x"});
        let value = field(obj.as_object().unwrap(), TITLE_KEYS);
        assert_eq!(value, Some(&json!("Студенты")));
    }

    #[test]
    fn detects_corrupted_descriptions() {
        assert!(is_corrupted(&json!({"title": "A", "description": ["x", "y"]})));
        assert!(is_corrupted(&json!({"title": "A", "description": " [\"x\"] "})));
        assert!(!is_corrupted(&json!({"title": "A", "description": "x"})));
        assert!(!is_corrupted(&json!("[x]")));
    }

    #[test]
    fn recovery_joins_serialized_arrays() {
        let items = vec![json!({"title": "A", "description": "[\"x\", \"y\"]"})];
        let drafts = recover_corrupted(&items, &cleaner());
        assert_eq!(drafts, vec![SegmentDraft::new("A".into(), "x y".into())]);
    }

    #[test]
    fn recovery_keeps_non_object_elements_as_descriptions() {
        let items = vec![
            json!({"title": "A", "description": ["x"]}),
            json!(42),
            json!("свободный текст"),
        ];
        let drafts = recover_corrupted(&items, &cleaner());
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[1], SegmentDraft::new(String::new(), "42".into()));
        assert_eq!(drafts[2].description, "свободный текст");
    }

    #[test]
    fn long_title_with_period_is_split() {
        let obj = json!({
            "title": "Корпоративные клиенты. Обладают высоким бюджетом и готовы платить за качество.",
            "description": "Крупные компании"
        });
        let draft = draft_from_object(obj.as_object().unwrap(), &cleaner(), MappingMode::Standard);
        assert_eq!(draft.title, "Корпоративные клиенты");
        assert_eq!(
            draft.description,
            "Обладают высоким бюджетом и готовы платить за качество. Крупные компании"
        );
    }

    #[test]
    fn short_title_with_period_is_kept() {
        let obj = json!({"title": "ООО т.д.", "description": "x"});
        let draft = draft_from_object(obj.as_object().unwrap(), &cleaner(), MappingMode::Standard);
        assert_eq!(draft.title, "ООО т.д.");
    }

    #[test]
    fn embedded_titles_split_on_separator() {
        let obj = json!({"name": "Студенты: учатся и подрабатывают"});
        let draft = draft_from_object(obj.as_object().unwrap(), &cleaner(), MappingMode::Embedded);
        assert_eq!(draft.title, "Студенты");
        assert_eq!(draft.description, "учатся и подрабатывают");
    }

    #[test]
    fn string_elements_become_drafts() {
        let draft = draft_from_text("Пенсионеры. Много свободного времени", &cleaner());
        assert_eq!(draft.title, "Пенсионеры");
        assert_eq!(draft.description, "Много свободного времени");
    }

    #[test]
    fn run_on_string_element_splits_into_sentences() {
        let text = "Молодые родители в декрете, которые ищут доставку детских товаров без лишних поездок! Они ценят скорость и готовы платить за подписку";
        let draft = draft_from_text(text, &cleaner());
        assert_eq!(
            draft.title,
            "Молодые родители в декрете, которые ищут доставку детских товаров без лишних поездок"
        );
        assert_eq!(draft.description, "Они ценят скорость и готовы платить за подписку");

        let short = draft_from_text("Студенты! Учатся", &cleaner());
        assert_eq!(short, SegmentDraft::new("Студенты! Учатся".into(), String::new()));
    }

    #[test]
    fn description_aliases_are_read() {
        let obj = json!({"segment_name": "Фрилансеры", "explanation": "Работают из дома"});
        let draft = draft_from_object(obj.as_object().unwrap(), &cleaner(), MappingMode::Standard);
        assert_eq!(draft, SegmentDraft::new("Фрилансеры".into(), "Работают из дома".into()));
    }
}
