use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::{QueryRequest, QueryResponse};

/// Translate a natural language query into SQL against the caller's schema.
///
/// Pipeline failures are reported inside the response body; only a body that
/// does not deserialize into a request is an HTTP error.
pub async fn process_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = payload?;
    tracing::info!(
        "Received query with {} table(s) and {} relationship(s)",
        request.schema.len(),
        request.relationships.len()
    );

    Ok(Json(state.service.process(&request).await))
}
