mod config;
mod errors;
mod interview;
mod llm_client;
mod retrieval;
mod routes;
mod session;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::interview::engine::InterviewEngine;
use crate::llm_client::LlmClient;
use crate::retrieval::{default_question_bank, InMemoryQuestionIndex, QuestionRetriever};
use crate::routes::build_router;
use crate::state::AppState;

/// Cadence of the background session-eviction sweep.
const EVICTION_SWEEP_SECS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Parley API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.model_timeout_secs);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Shared retrieval index, seeded with the built-in question bank
    let index = Arc::new(InMemoryQuestionIndex::new());
    index.add_documents(default_question_bank()).await;
    info!("Question index seeded ({} documents)", index.len());

    // Build the interview engine
    let engine = Arc::new(InterviewEngine::new(
        Arc::new(llm),
        Duration::from_secs(config.model_timeout_secs),
        index,
        config.limits,
        config.policy.clone(),
        config.session_ttl_minutes,
        StdRng::from_entropy(),
    ));

    // Periodic eviction sweep for idle sessions
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(EVICTION_SWEEP_SECS));
            loop {
                ticker.tick().await;
                engine.store.evict_expired();
            }
        });
    }

    // Build router
    let app = build_router(AppState { engine })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
