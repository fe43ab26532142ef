use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use turnstile_core::model::{Booking, BookingStatus};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub event_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingView {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            event_id: booking.event_id,
            quantity: booking.quantity,
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/book", post(book_ticket))
        .route("/booking/{booking_id}", get(get_booking))
}

async fn book_ticket(
    State(state): State<AppState>,
    Json(req): Json<BookRequest>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = state
        .admission
        .create_booking(req.event_id, req.quantity)
        .await?;
    Ok(Json(booking.into()))
}

/// Callers poll here to observe the finalization outcome; admission
/// never surfaces it synchronously.
async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = state.admission.get_booking(booking_id).await?;
    Ok(Json(booking.into()))
}
