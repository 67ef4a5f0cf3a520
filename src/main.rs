use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plotgpt::cli::Cli;
use plotgpt::config::Config;
use plotgpt::llm::{GeminiClient, GenerativeEngine};
use plotgpt::server::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plotgpt=info,tower_http=info")),
        )
        .init();

    let args = Cli::parse();
    let cfg = Config::load();

    // Resolve model: CLI overrides config; fall back to DEFAULT_MODEL
    let model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "gemini-1.5-flash".to_string());

    // A missing credential disables the endpoint instead of crashing
    // per-request; every call then reports "not configured".
    let engine: Option<Arc<dyn GenerativeEngine>> = if cfg.api_key().is_some() {
        let client = GeminiClient::from_config(&cfg, &model)?;
        info!(model = %model, "generation engine configured");
        Some(Arc::new(client))
    } else {
        warn!("GOOGLE_API_KEY is not set; /generate-plot will report not configured");
        None
    };

    let host = args
        .host
        .or_else(|| cfg.get("SERVER_HOST"))
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.port.or_else(|| cfg.get_u16("SERVER_PORT")).unwrap_or(8000);

    let router = app(AppState { engine }, &cfg.allowed_origins());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, router)
        .await
        .context("server terminated")?;
    Ok(())
}
