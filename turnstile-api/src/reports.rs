use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use turnstile_core::model::{EventStats, OverallReport};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/report", get(overall_report))
        .route("/report/event/{event_id}", get(event_report))
}

/// Aggregate totals across all events.
async fn overall_report(State(state): State<AppState>) -> Result<Json<OverallReport>, ApiError> {
    let report = state.admission.overall_report().await?;
    Ok(Json(report))
}

async fn event_report(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventStats>, ApiError> {
    let stats = state.admission.event_stats(event_id).await?;
    Ok(Json(stats))
}
