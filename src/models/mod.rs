use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A normalized audience segment. `id` is the 1-based position in its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSegment {
    pub id: usize,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub count: usize,
    pub segments: Vec<ParsedSegment>,
}

impl From<Vec<ParsedSegment>> for ParseResponse {
    fn from(segments: Vec<ParsedSegment>) -> Self {
        Self {
            count: segments.len(),
            segments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Business idea the audiences are generated for.
    pub idea: String,
    #[serde(default)]
    pub count: Option<usize>,
}

/// Which completion the returned segments were parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSource {
    Structured,
    Draft,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub run_id: Uuid,
    pub requested: usize,
    pub source: SegmentSource,
    /// Fewer segments than requested; callers may want to re-run.
    pub incomplete: bool,
    pub segments: Vec<ParsedSegment>,
}
