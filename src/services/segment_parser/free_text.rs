use super::mapping::split_run_on_title;
use super::patterns::{BlockKind, CompiledBlock, CompiledPatterns};
use super::{Context, Input, SegmentDraft, SegmentStrategy};
use crate::utils::text::{split_at_first, truncate_chars};
use regex::Regex;
use std::sync::LazyLock;

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid blank line regex"));

const INLINE_SEPARATORS: &[&str] = &[" — ", " – ", " - ", ": ", ". "];

/// Repeating `Сегмент N`, `1.` or `Label:` blocks in prose.
pub(crate) struct FreeTextBlocks;

impl SegmentStrategy for FreeTextBlocks {
    fn name(&self) -> &'static str {
        "free_text_blocks"
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        let config = ctx.config();
        let text = truncate_chars(&input.text(), config.max_input_chars);
        let patterns = ctx.patterns();

        for block in &patterns.blocks {
            let drafts: Vec<SegmentDraft> = split_blocks(&text, block, patterns)
                .into_iter()
                .filter(|draft| !draft.is_empty())
                .collect();
            // A single match is usually a stray line, not a list.
            if drafts.len() >= config.min_free_text_segments {
                return Some(drafts);
            }
            tracing::trace!(pattern = %block.name, found = drafts.len(), "too few blocks");
        }
        None
    }
}

fn split_blocks(text: &str, block: &CompiledBlock, patterns: &CompiledPatterns) -> Vec<SegmentDraft> {
    let markers: Vec<(usize, usize, Option<String>)> = block
        .regex
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps
                .name("label")
                .map(|label| label.as_str().trim().trim_matches('"').trim().to_string());
            Some((whole.start(), whole.end(), label))
        })
        .collect();

    let mut drafts = Vec::new();
    for (idx, (_, end, label)) in markers.iter().enumerate() {
        let stop = markers
            .get(idx + 1)
            .map(|(start, _, _)| *start)
            .unwrap_or(text.len());
        let body = &text[*end..stop];

        match block.kind {
            BlockKind::KeyValue => {
                push_key_value(&mut drafts, label.as_deref().unwrap_or_default(), body, patterns)
            }
            BlockKind::Header | BlockKind::Numbered => drafts.push(draft_from_block(body, patterns)),
        }
    }
    drafts
}

fn push_key_value(drafts: &mut Vec<SegmentDraft>, label: &str, body: &str, patterns: &CompiledPatterns) {
    let cleaner = &patterns.cleaner;

    if patterns.is_title_label(label) {
        let (title, description) = first_line_and_rest(body);
        drafts.push(SegmentDraft::new(cleaner.clean(title), cleaner.clean(&description)));
    } else if patterns.is_description_label(label) {
        let description = cleaner.clean(body);
        match drafts.last_mut() {
            Some(last) if last.description.is_empty() => last.description = description,
            _ => drafts.push(SegmentDraft::new(String::new(), description)),
        }
    } else {
        drafts.push(SegmentDraft::new(cleaner.clean(label), cleaner.clean(body)));
    }
}

/// Prefers an inner `Название: ... Пояснение: ...` pair, else first line / rest.
fn draft_from_block(body: &str, patterns: &CompiledPatterns) -> SegmentDraft {
    let cleaner = &patterns.cleaner;

    let labelled_title = patterns
        .title_label_line
        .as_ref()
        .and_then(|re| re.captures(body))
        .and_then(|caps| caps.name("value").map(|value| (caps.get(0), value.as_str())));

    if let Some((Some(line), title)) = labelled_title {
        let description = match patterns
            .description_label_line
            .as_ref()
            .and_then(|re| re.captures(body))
            .and_then(|caps| caps.name("value"))
        {
            Some(value) => body[value.start()..].to_string(),
            None => format!("{} {}", &body[..line.start()], &body[line.end()..]),
        };
        return SegmentDraft::new(cleaner.clean(title), cleaner.clean(&description));
    }

    let (title, description) = first_line_and_rest(body);
    let title = cleaner.clean(title);
    let description = cleaner.clean(&description);

    // "Владельцы кофеен — ищут лояльность" on the marker line
    if let Some((head, rest)) = split_at_first(&title, INLINE_SEPARATORS) {
        if !head.is_empty() {
            let description = if description.is_empty() {
                rest.to_string()
            } else {
                format!("{} {}", rest, description)
            };
            return SegmentDraft::new(cleaner.clean(head), cleaner.clean(&description));
        }
    }
    split_run_on_title(title, description, cleaner)
}

fn first_line_and_rest(body: &str) -> (&str, String) {
    let mut lines = body.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next().unwrap_or_default();
    let rest = lines.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// Known audience phrases, for legacy answers with no list structure at all.
pub(crate) struct KeywordFallback;

impl SegmentStrategy for KeywordFallback {
    fn name(&self) -> &'static str {
        "keyword_fallback"
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        let text = truncate_chars(&input.text(), ctx.config().max_input_chars);
        let patterns = ctx.patterns();

        let mut found: Vec<(usize, SegmentDraft)> = patterns
            .keywords
            .iter()
            .filter_map(|(keyword, regex)| {
                let hit = regex.find(&text)?;
                let rest = &text[hit.end()..];
                let paragraph_end = BLANK_LINE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
                let description = rest[..paragraph_end].trim_start_matches(|c: char| {
                    c.is_whitespace() || matches!(c, ':' | '—' | '–' | '-' | ',' | '.' | '*')
                });
                Some((
                    hit.start(),
                    SegmentDraft::new(keyword.clone(), patterns.cleaner.clean(description)),
                ))
            })
            .collect();

        if found.is_empty() {
            return None;
        }
        found.sort_by_key(|(position, _)| *position);
        Some(found.into_iter().map(|(_, draft)| draft).collect())
    }
}

/// The whole text as one record, when nothing structural was found.
pub(crate) struct SingleSegmentFallback;

impl SegmentStrategy for SingleSegmentFallback {
    fn name(&self) -> &'static str {
        "single_segment_fallback"
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn apply(&self, input: &Input<'_>, ctx: &Context<'_>) -> Option<Vec<SegmentDraft>> {
        // Structured input without recognizable fields has no prose to keep.
        let Input::Text(text) = input else {
            return None;
        };
        let config = ctx.config();
        let patterns = ctx.patterns();

        let cleaned = patterns
            .cleaner
            .clean(&truncate_chars(text, config.max_input_chars));
        if !cleaned.chars().any(char::is_alphanumeric) {
            return None;
        }
        Some(vec![SegmentDraft::new(
            patterns.fallback_title.clone(),
            truncate_chars(&cleaned, config.description_max_chars),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::services::segment_parser::SegmentParser;
    use crate::services::segment_parser::patterns::PatternTable;

    fn with_ctx<T>(f: impl FnOnce(&Context<'_>) -> T) -> T {
        let parser = SegmentParser::new(ParserConfig::default(), &PatternTable::default());
        let ctx = Context {
            parser: &parser,
            depth: 0,
        };
        f(&ctx)
    }

    #[test]
    fn header_blocks_with_nested_labels() {
        let text = "Вот что получилось.\n\n### Сегмент 1\nНазвание: Владельцы кофеен\nПояснение: Ищут программу лояльности\nи удобную кассу\n\n### Сегмент 2\nНазвание: Фитнес-клубы\nПояснение: Продают абонементы";
        let drafts = with_ctx(|ctx| FreeTextBlocks.apply(&Input::Text(text), ctx)).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "Владельцы кофеен");
        assert_eq!(drafts[0].description, "Ищут программу лояльности и удобную кассу");
        assert_eq!(drafts[1].title, "Фитнес-клубы");
    }

    #[test]
    fn header_line_carries_inline_description() {
        let text = "Сегмент 1: Владельцы кофеен — ищут лояльность\nСегмент 2: Фитнес-клубы — продают абонементы";
        let drafts = with_ctx(|ctx| FreeTextBlocks.apply(&Input::Text(text), ctx)).unwrap();
        assert_eq!(drafts[0], SegmentDraft::new("Владельцы кофеен".into(), "ищут лояльность".into()));
        assert_eq!(drafts[1].title, "Фитнес-клубы");
    }

    #[test]
    fn run_on_block_title_drops_closing_mark() {
        let text = "1. Молодые родители в декрете, которые ищут доставку детских товаров без лишних поездок! Они ценят скорость\n2. Студенты";
        let drafts = with_ctx(|ctx| FreeTextBlocks.apply(&Input::Text(text), ctx)).unwrap();
        assert_eq!(
            drafts[0],
            SegmentDraft::new(
                "Молодые родители в декрете, которые ищут доставку детских товаров без лишних поездок".into(),
                "Они ценят скорость".into(),
            )
        );
    }

    #[test]
    fn numbered_list_items() {
        let text = "1. **Владельцы кофеен**\n   Ищут программу лояльности\n2. **Фитнес-клубы**\n   Продают абонементы\n3. Автосервисы";
        let drafts = with_ctx(|ctx| FreeTextBlocks.apply(&Input::Text(text), ctx)).unwrap();
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0], SegmentDraft::new("Владельцы кофеен".into(), "Ищут программу лояльности".into()));
        assert_eq!(drafts[2], SegmentDraft::new("Автосервисы".into(), String::new()));
    }

    #[test]
    fn label_value_blocks_pair_title_and_description() {
        let text = "Название: Владельцы кофеен\nПояснение: Ищут лояльность\nНазвание: Фитнес-клубы\nПояснение: Продают абонементы";
        let drafts = with_ctx(|ctx| FreeTextBlocks.apply(&Input::Text(text), ctx)).unwrap();
        assert_eq!(
            drafts,
            vec![
                SegmentDraft::new("Владельцы кофеен".into(), "Ищут лояльность".into()),
                SegmentDraft::new("Фитнес-клубы".into(), "Продают абонементы".into()),
            ]
        );
    }

    #[test]
    fn single_block_is_not_a_list() {
        let text = "Сегмент 1: Владельцы кофеен, которым нужна программа лояльности";
        let drafts = with_ctx(|ctx| FreeTextBlocks.apply(&Input::Text(text), ctx));
        assert!(drafts.is_none());
    }

    #[test]
    fn keywords_in_order_of_appearance() {
        let text = "Стоит обратить внимание на студентов.\n\nТакже Молодожены: пары перед свадьбой\n\nИ наконец Студенты — учатся и подрабатывают";
        let drafts = with_ctx(|ctx| KeywordFallback.apply(&Input::Text(text), ctx)).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "Молодожены");
        assert_eq!(drafts[0].description, "пары перед свадьбой");
        assert_eq!(drafts[1].title, "Студенты");
    }

    #[test]
    fn fallback_needs_real_text() {
        let drafts = with_ctx(|ctx| SingleSegmentFallback.apply(&Input::Text(" {}, \n "), ctx));
        assert!(drafts.is_none());

        let drafts = with_ctx(|ctx| SingleSegmentFallback.apply(&Input::Text("Просто мысль"), ctx)).unwrap();
        assert_eq!(drafts[0], SegmentDraft::new("Результат анализа".into(), "Просто мысль".into()));
    }
}
