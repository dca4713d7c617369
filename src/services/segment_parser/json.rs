use super::mapping::{
    DESCRIPTION_KEYS, MappingMode, TITLE_KEYS, WRAPPER_KEYS, draft_from_object, field, map_array,
};
use super::{Context, Input, SegmentDraft, SegmentStrategy};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Flat objects mentioning a segment field, wherever they sit in the text.
/// Only those holding both a title and a description count as fragments.
static FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"(?:title|name|segment_name|description)"\s*:[^{}]*\}"#)
        .expect("valid fragment regex")
});

/// Candidate JSON spans in prose, most specific last so a bare array wins.
static EMBEDDED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)\[.*\]",
        r"(?s)\{.*\}",
        r"(?s)```json\s*(.*?)```",
        r"(?s)```[A-Za-z]*\s*(.*?)```",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Responses cut off mid-array still hold complete objects; salvage those.
pub(crate) struct CorruptedFragments;

impl SegmentStrategy for CorruptedFragments {
    fn name(&self) -> &'static str {
        "corrupted_fragments"
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        let Input::Text(text) = input else {
            return None;
        };
        if !text.contains("description\":") && !text.contains("title\":") {
            return None;
        }

        let fragments: Vec<Value> = FRAGMENT
            .find_iter(text)
            .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
            .filter(is_segment_fragment)
            .collect();
        tracing::trace!(count = fragments.len(), "json fragments recovered");

        if fragments.is_empty() {
            return None;
        }
        Some(map_array(&fragments, &ctx.patterns().cleaner, MappingMode::Standard))
    }
}

fn is_segment_fragment(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        field(obj, TITLE_KEYS).is_some() && field(obj, DESCRIPTION_KEYS).is_some()
    })
}

pub(crate) struct DirectJson;

impl SegmentStrategy for DirectJson {
    fn name(&self) -> &'static str {
        "direct_json"
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        let Input::Text(text) = input else {
            return None;
        };
        let trimmed = text.trim();
        if !(trimmed.starts_with('[') || trimmed.starts_with('{') || trimmed.starts_with('"')) {
            return None;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => {
                Some(map_array(&items, &ctx.patterns().cleaner, MappingMode::Standard))
            }
            // Objects and doubly-encoded strings go back through the cascade.
            Ok(other) => Some(ctx.recurse(&other)),
            Err(e) => {
                tracing::trace!("direct json parse failed: {}", e);
                None
            }
        }
    }
}

/// Input that arrived already parsed: arrays, wrappers, or a lone segment.
pub(crate) struct StructuredValue;

impl SegmentStrategy for StructuredValue {
    fn name(&self) -> &'static str {
        "structured_value"
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        match input {
            Input::Value(Value::Array(items)) => {
                Some(map_array(items, &ctx.patterns().cleaner, MappingMode::Standard))
            }
            Input::Value(Value::Object(obj)) => structured_object(obj, ctx),
            _ => None,
        }
    }
}

fn structured_object(obj: &Map<String, Value>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
    for key in WRAPPER_KEYS {
        if let Some(inner @ (Value::Array(_) | Value::Object(_))) = obj.get(*key) {
            let drafts = ctx.recurse(inner);
            if !drafts.is_empty() {
                tracing::trace!(wrapper = *key, "unwrapped segment list");
                return Some(drafts);
            }
        }
    }

    for (key, value) in obj {
        let Value::String(text) = value else {
            continue;
        };
        if let Some(items) = extract_array(text) {
            let drafts = ctx.recurse(&items);
            if !drafts.is_empty() {
                tracing::trace!(field = %key, "segment list found inside string field");
                return Some(drafts);
            }
        }
    }

    let looks_like_segment = TITLE_KEYS
        .iter()
        .chain(DESCRIPTION_KEYS.iter())
        .any(|key| obj.contains_key(*key));
    if looks_like_segment {
        return Some(vec![draft_from_object(
            obj,
            &ctx.patterns().cleaner,
            MappingMode::Standard,
        )]);
    }
    None
}

/// The outermost `[...]` span of a string, if it parses as a JSON array.
fn extract_array(text: &str) -> Option<Value> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Array(_)) => Some(value),
        _ => None,
    }
}

/// JSON buried in prose or markdown code fences.
pub(crate) struct EmbeddedJson;

impl SegmentStrategy for EmbeddedJson {
    fn name(&self) -> &'static str {
        "embedded_json"
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        let text = input.text();
        let cleaner = &ctx.patterns().cleaner;

        for pattern in EMBEDDED.iter() {
            for caps in pattern.captures_iter(&text) {
                let candidate = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();

                let items = match serde_json::from_str::<Value>(candidate) {
                    Ok(Value::Array(items)) => items,
                    Ok(Value::Object(obj)) => match wrapped_array(&obj) {
                        Some(items) => items.clone(),
                        None => continue,
                    },
                    _ => continue,
                };
                if items.is_empty() {
                    continue;
                }

                let drafts = map_array(&items, cleaner, MappingMode::Embedded);
                if drafts.iter().any(|draft| !draft.is_empty()) {
                    return Some(drafts);
                }
            }
        }
        None
    }
}

fn wrapped_array(obj: &Map<String, Value>) -> Option<&Vec<Value>> {
    WRAPPER_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
}
