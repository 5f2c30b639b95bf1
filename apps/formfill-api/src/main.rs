//! FormFill API Server - fill PDF forms from natural-language instructions
//!
//! Provides REST endpoints for:
//! - Field detection (`/api/analyze`)
//! - One-shot filling and preview (`/api/fill`, `/api/fill/preview`)
//! - Multi-turn form-filling sessions (`/api/session/...`)

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod error;
mod handlers;
mod mapper;
mod models;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("formfill_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing FormFill API...");
    let state = AppState::new()?;
    let state = Arc::new(state);

    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Stateless analysis and one-shot fill
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/fill", post(handlers::fill))
        .route("/api/fill/preview", post(handlers::fill_preview))
        // Multi-turn session endpoints
        .route("/api/session", post(handlers::create_session))
        .route("/api/session/:id/fields", get(handlers::session_fields))
        .route("/api/session/:id/turn", post(handlers::session_turn))
        .route("/api/session/:id/stage", post(handlers::session_stage))
        .route("/api/session/:id/pending", get(handlers::session_pending))
        .route("/api/session/:id/commit", post(handlers::session_commit))
        .route("/api/session/:id/document", get(handlers::session_document))
        .route("/api/session/:id", delete(handlers::delete_session))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting FormFill API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
