use segment_intake::config::AppConfig;
use segment_intake::server::{self, AppState};
use segment_intake::services::llm::LLMClient;
use segment_intake::SegmentParser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::from_env()?;
    let parser = SegmentParser::new(config.parser.clone(), &config.pattern_table()?);
    tracing::debug!(?parser, "segment parser ready");

    let app_state = AppState {
        llm_client: Arc::new(LLMClient::new(config.llm.clone())?),
        parser: Arc::new(parser),
    };
    let app = server::router(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
