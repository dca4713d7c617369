use crate::models::{GenerateRequest, GenerationResult, ParseResponse};
use crate::services::llm::LLMClient;
use crate::services::pipeline;
use crate::services::segment_parser::SegmentParser;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::{Html, Json},
    routing::{get, post},
};
use http::StatusCode;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<LLMClient>,
    pub parser: Arc<SegmentParser>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/parse", post(parse_segments))
        .route("/segments", post(generate_segments))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(AllowMethods::any())
                .allow_headers(AllowHeaders::any()),
        )
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Segment Intake Service</title>
        <meta charset="utf-8">
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
            .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
        </style>
    </head>
    <body>
        <h1>Segment Intake Service</h1>

        <div class="info-box">
            <h2>Service Information</h2>
            <p>Turns raw LLM answers into numbered audience segments with a title and a description.</p>
            <p>Accepts JSON, JSON cut off mid-array, JSON inside prose or code fences, and plain numbered text.</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET / - This information page</div>
        <div class="endpoint">GET /health - Health check</div>
        <div class="endpoint">POST /parse - Parse a raw LLM answer (text or JSON body)</div>
        <div class="endpoint">POST /segments - Generate segments for {"idea": "...", "count": 10}</div>
    </body>
    </html>
    "#,
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn parse_segments(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ParseResponse>, StatusCode> {
    // Skip the UTF-8 BOM if present
    let bytes = body.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(&body[..]);
    let text = std::str::from_utf8(bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    let segments = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => state.parser.parse(&value),
        Err(_) => state.parser.parse_str(text),
    };
    tracing::info!(count = segments.len(), bytes = bytes.len(), "parsed segments");

    Ok(Json(segments.into()))
}

async fn generate_segments(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationResult>, StatusCode> {
    if let Err(e) = pipeline::normalize_request(&request) {
        tracing::warn!("rejected generate request: {}", e);
        return Err(StatusCode::BAD_REQUEST);
    }

    let result = pipeline::generate_segments(state.llm_client.as_ref(), &state.parser, &request)
        .await
        .map_err(|e| {
            tracing::error!("segment generation failed: {:#}", e);
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(result))
}
