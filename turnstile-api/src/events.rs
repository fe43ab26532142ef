use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use turnstile_core::model::{Event, EventStats};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub capacity: i32,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: Uuid,
    pub name: String,
    pub total_capacity: i32,
    pub available_capacity: i32,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            name: event.name,
            total_capacity: event.total_capacity,
            available_capacity: event.available_capacity,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/event", post(create_event))
        .route("/event/{event_id}/stats", get(event_stats))
}

async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<EventView>, ApiError> {
    let event = state.admission.create_event(&req.name, req.capacity).await?;
    Ok(Json(event.into()))
}

async fn event_stats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventStats>, ApiError> {
    let stats = state.admission.event_stats(event_id).await?;
    Ok(Json(stats))
}
