use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use turnstile_core::error::StoreError;
use turnstile_core::model::{Booking, BookingStatus, Event, EventStats, OverallReport};
use turnstile_core::store::InventoryStore;

/// Postgres-backed inventory store.
///
/// The admission-critical piece is `commit_booking`: the conditional
/// capacity decrement and the booking insert share one transaction, and
/// the `available_capacity >= quantity` predicate makes the decrement
/// refuse to oversell even without the distributed lock in front of it.
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    total_capacity: i32,
    available_capacity: i32,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            name: row.name,
            total_capacity: row.total_capacity,
            available_capacity: row.available_capacity,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    event_id: Uuid,
    quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = BookingStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown booking status: {}", self.status)))?;
        Ok(Booking {
            id: self.id,
            event_id: self.event_id,
            quantity: self.quantity,
            status,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn create_event(&self, name: &str, total_capacity: i32) -> Result<Event, StoreError> {
        let event = Event::new(name.to_string(), total_capacity);

        sqlx::query(
            r#"
            INSERT INTO events (id, name, total_capacity, available_capacity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.total_capacity)
        .bind(event.available_capacity)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            "SELECT id, name, total_capacity, available_capacity, created_at FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Event::from)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))
    }

    async fn commit_booking(&self, event_id: Uuid, quantity: i32) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Conditional decrement: zero rows affected means either the
        // event is missing or the remaining capacity is short.
        let updated = sqlx::query(
            r#"
            UPDATE events
            SET available_capacity = available_capacity - $1
            WHERE id = $2 AND available_capacity >= $1
            "#,
        )
        .bind(quantity)
        .bind(event_id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if updated.rows_affected() != 1 {
            let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events WHERE id = $1")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
            return Err(if exists == 0 {
                StoreError::NotFound(format!("event {}", event_id))
            } else {
                StoreError::Conflict
            });
        }

        let booking = Booking::new(event_id, quantity);
        sqlx::query(
            r#"
            INSERT INTO bookings (id, event_id, quantity, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.quantity)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(booking)
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        // Guarded update: only PENDING rows move, and re-applying the
        // same terminal status matches the guard, keeping the call
        // idempotent for redeliveries.
        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1
            WHERE id = $2 AND (status = $3 OR status = $1)
            "#,
        )
        .bind(status.as_str())
        .bind(booking_id)
        .bind(BookingStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        let current =
            sqlx::query_scalar::<_, String>("SELECT status FROM bookings WHERE id = $1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        match current {
            None => Err(StoreError::NotFound(format!("booking {}", booking_id))),
            // Row exists but is already in a different terminal state.
            Some(_) => Err(StoreError::Conflict),
        }
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, event_id, quantity, status, created_at FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?
            .into_booking()
    }

    async fn pending_bookings_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, event_id, quantity, status, created_at
            FROM bookings
            WHERE status = $1 AND created_at < $2
            ORDER BY created_at
            "#,
        )
        .bind(BookingStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn event_stats(&self, event_id: Uuid) -> Result<EventStats, StoreError> {
        let event = self.get_event(event_id).await?;

        let (finalized, failed) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COALESCE(SUM(quantity) FILTER (WHERE status = 'FINALIZED'), 0),
                COALESCE(SUM(quantity) FILTER (WHERE status = 'FAILED'), 0)
            FROM bookings
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(EventStats {
            event_id,
            total_capacity: event.total_capacity,
            available_capacity: event.available_capacity,
            booked: event.total_capacity - event.available_capacity,
            finalized: finalized as i32,
            failed: failed as i32,
        })
    }

    async fn overall_report(&self) -> Result<OverallReport, StoreError> {
        let (total_capacity, total_reserved) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COALESCE(SUM(total_capacity), 0),
                COALESCE(SUM(total_capacity - available_capacity), 0)
            FROM events
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        let total_finalized = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM bookings WHERE status = 'FINALIZED'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(OverallReport {
            total_capacity,
            total_reserved,
            total_finalized,
        })
    }
}
