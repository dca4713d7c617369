use regex::Regex;
use std::sync::LazyLock;

static LEADING_DEBRIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s{},]+").expect("valid leading debris regex"));
static TRAILING_DEBRIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s{},]+$").expect("valid trailing debris regex"));
static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+").expect("valid heading regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Upper bound on cleaning passes; real inputs settle in two or three.
const MAX_PASSES: usize = 8;

/// Normalizes text pulled out of LLM responses: JSON debris, field-name
/// prefixes, markdown emphasis and escape sequences are removed and
/// whitespace is collapsed.
///
/// Cleaning is repeated until the text stops changing, so applying
/// [`TextCleaner::clean`] to its own output returns it unchanged.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    field_prefix: Option<Regex>,
}

impl TextCleaner {
    /// Builds a cleaner that strips the given field labels (`title:`,
    /// `Пояснение:` and so on) from the start of a value.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut escaped: Vec<String> = labels
            .iter()
            .map(|label| label.as_ref().trim())
            .filter(|label| !label.is_empty())
            .map(regex::escape)
            .collect();
        // Longest first so "Название аудитории" wins over "Название".
        escaped.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        let field_prefix = if escaped.is_empty() {
            None
        } else {
            let pattern = format!(
                r#"(?i)^(?:\*\*)?"?(?:{})"?(?:\*\*)?\s*:\s*(?:\*\*)?"#,
                escaped.join("|")
            );
            match Regex::new(&pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!("field label pattern rejected: {}", e);
                    None
                }
            }
        };

        Self { field_prefix }
    }

    pub fn clean(&self, raw: &str) -> String {
        let mut current = raw.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.clean_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn clean_once(&self, input: &str) -> String {
        let text = LEADING_DEBRIS.replace(input.trim(), "");
        let text = strip_wrapping_quotes(&text);
        let text = MARKDOWN_HEADING.replace(text, "");
        let text = match &self.field_prefix {
            Some(prefix) => prefix.replace(&text, "").into_owned(),
            None => text.into_owned(),
        };
        let text = BOLD.replace_all(&text, "$1").replace("**", "");
        let text = text
            .replace("\\\"", "\"")
            .replace("\\n", " ")
            .replace("\\r", " ")
            .replace("\\t", " ");
        let text = WHITESPACE.replace_all(&text, " ");
        let text = TRAILING_DEBRIS.replace(text.trim(), "");
        strip_unmatched_quote(&text).to_string()
    }
}

/// Strips a quote pair only when the closing quote is the first one after
/// the opening, so `'a' 'b'` stays intact.
fn strip_wrapping_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('«', '»'), ('“', '”')] {
        if text.chars().count() < 2 || !text.starts_with(open) || !text.ends_with(close) {
            continue;
        }
        let inner = &text[open.len_utf8()..text.len() - close.len_utf8()];
        if !inner.contains(close) {
            return inner.trim();
        }
    }
    text
}

fn strip_unmatched_quote(text: &str) -> &str {
    if text.matches('"').count() % 2 == 0 {
        return text;
    }
    if text.ends_with('"') && !text.starts_with('"') {
        text[..text.len() - 1].trim_end()
    } else if text.starts_with('"') && !text.ends_with('"') {
        text[1..].trim_start()
    } else {
        text
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Splits at the earliest occurrence of any separator. Both halves are trimmed
/// and the separator itself is dropped.
pub fn split_at_first<'a>(text: &'a str, separators: &[&str]) -> Option<(&'a str, &'a str)> {
    separators
        .iter()
        .filter_map(|sep| text.find(sep).map(|idx| (idx, sep.len())))
        .min_by_key(|(idx, _)| *idx)
        .map(|(idx, len)| (text[..idx].trim(), text[idx + len..].trim()))
}

/// Splits prose into sentences after `.`, `!`, `?` or `…` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?' | '…') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..next_idx].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_idx;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
