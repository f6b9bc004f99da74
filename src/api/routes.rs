use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handlers::query;
use crate::config::Config;
use crate::services::{GoogleTranslator, LanguageProcessor, NlQueryService, Translator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub service: NlQueryService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let translator: Option<Arc<dyn Translator>> = if config.translation.enabled {
            Some(Arc::new(GoogleTranslator::new(&config.translation)))
        } else {
            info!("Translation disabled; non-English queries are processed as-is");
            None
        };

        let service = NlQueryService::new(LanguageProcessor::new(translator), config.nlp.validate_sql);

        Self { config, service }
    }
}

/// Create router with application state
pub fn create_router(config: Config) -> Router {
    create_router_with_state(AppState::new(config))
}

pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/process-query", post(query::process_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
