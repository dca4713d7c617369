use crate::models::{GenerateRequest, GenerationResult, ParsedSegment, SegmentSource};
use crate::services::llm::Completion;
use crate::services::segment_parser::SegmentParser;
use anyhow::{Context, Result, bail};
use uuid::Uuid;

pub const DEFAULT_COUNT: usize = 10;
pub const MAX_COUNT: usize = 20;

/// Trimmed idea and clamped segment count, or an error for an empty idea.
pub fn normalize_request(request: &GenerateRequest) -> Result<(String, usize)> {
    let idea = request.idea.trim();
    if idea.is_empty() {
        bail!("idea must not be empty");
    }
    let count = request.count.unwrap_or(DEFAULT_COUNT).clamp(1, MAX_COUNT);
    Ok((idea.to_string(), count))
}

fn draft_prompt(idea: &str, count: usize) -> String {
    format!(
        "Ты маркетолог-аналитик. Предложи {count} целевых сегментов аудитории для бизнес-идеи:\n\n{idea}\n\nДля каждого сегмента напиши две строки:\nНазвание аудитории: ...\nПояснение: ..."
    )
}

fn structure_prompt(draft: &str, count: usize) -> String {
    format!(
        "Преобразуй список сегментов ниже в JSON-массив из {count} объектов вида {{\"title\": string, \"description\": string}}. Верни только JSON без пояснений.\n\n{draft}"
    )
}

/// Drafts segments in prose, asks the model to restate them as JSON, and
/// parses whichever of the two answers yields more segments.
pub async fn generate_segments<C: Completion>(
    completion: &C,
    parser: &SegmentParser,
    request: &GenerateRequest,
) -> Result<GenerationResult> {
    let (idea, count) = normalize_request(request)?;
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, count, "generating segments");

    let draft = completion
        .complete(&draft_prompt(&idea, count))
        .await
        .context("drafting segments")?;

    let (segments, source) = match completion.complete(&structure_prompt(&draft, count)).await {
        Ok(structured) => {
            let segments = parser.parse_str(&structured);
            if segments.len() >= count {
                (segments, SegmentSource::Structured)
            } else {
                pick_better(segments, parser.parse_str(&draft))
            }
        }
        Err(e) => {
            tracing::warn!(%run_id, "structuring pass failed, parsing the draft: {:#}", e);
            (parser.parse_str(&draft), SegmentSource::Draft)
        }
    };

    let incomplete = segments.len() < count;
    if incomplete {
        tracing::warn!(%run_id, requested = count, got = segments.len(), "fewer segments than requested");
    }

    Ok(GenerationResult {
        run_id,
        requested: count,
        source,
        incomplete,
        segments,
    })
}

fn pick_better(
    structured: Vec<ParsedSegment>,
    draft: Vec<ParsedSegment>,
) -> (Vec<ParsedSegment>, SegmentSource) {
    if draft.len() > structured.len() {
        (draft, SegmentSource::Draft)
    } else {
        (structured, SegmentSource::Structured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Completion for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no scripted reply")))
        }
    }

    fn request(idea: &str, count: Option<usize>) -> GenerateRequest {
        GenerateRequest {
            idea: idea.to_string(),
            count,
        }
    }

    const DRAFT: &str = "Название аудитории: Владельцы кофеен\nПояснение: Ищут лояльность\nНазвание аудитории: Фитнес-клубы\nПояснение: Продают абонементы";

    #[test]
    fn count_is_clamped() {
        assert_eq!(normalize_request(&request("x", None)).unwrap().1, DEFAULT_COUNT);
        assert_eq!(normalize_request(&request("x", Some(0))).unwrap().1, 1);
        assert_eq!(normalize_request(&request("x", Some(500))).unwrap().1, MAX_COUNT);
        assert!(normalize_request(&request("   ", Some(3))).is_err());
    }

    #[tokio::test]
    async fn structured_answer_is_preferred() {
        let completion = ScriptedCompletion::new(vec![
            Ok(DRAFT.to_string()),
            Ok(r#"[{"title":"Владельцы кофеен","description":"Ищут лояльность"},{"title":"Фитнес-клубы","description":"Продают абонементы"}]"#.to_string()),
        ]);
        let result = generate_segments(&completion, &SegmentParser::default(), &request("Касса для кафе", Some(2)))
            .await
            .unwrap();

        assert_eq!(result.source, SegmentSource::Structured);
        assert!(!result.incomplete);
        assert_eq!(result.segments[1].title, "Фитнес-клубы");

        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("Касса для кафе"));
        assert!(prompts[1].contains(DRAFT));
    }

    #[tokio::test]
    async fn falls_back_to_draft_when_structuring_fails() {
        let completion = ScriptedCompletion::new(vec![Ok(DRAFT.to_string()), Err(anyhow!("timeout"))]);
        let result = generate_segments(&completion, &SegmentParser::default(), &request("Касса", Some(2)))
            .await
            .unwrap();

        assert_eq!(result.source, SegmentSource::Draft);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].title, "Владельцы кофеен");
    }

    #[tokio::test]
    async fn flags_short_batches() {
        let completion = ScriptedCompletion::new(vec![
            Ok(DRAFT.to_string()),
            Ok(r#"[{"title":"Владельцы кофеен","description":"Ищут лояльность"}]"#.to_string()),
        ]);
        let result = generate_segments(&completion, &SegmentParser::default(), &request("Касса", Some(5)))
            .await
            .unwrap();

        assert!(result.incomplete);
        assert_eq!(result.requested, 5);
        assert_eq!(result.source, SegmentSource::Draft);
        assert_eq!(result.segments.len(), 2);
    }

    #[tokio::test]
    async fn draft_failure_is_an_error() {
        let completion = ScriptedCompletion::new(vec![Err(anyhow!("connection refused"))]);
        let err = generate_segments(&completion, &SegmentParser::default(), &request("Касса", None))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }
}
