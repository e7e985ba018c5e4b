//! `PostgreSQL` implementation of the event store port.

use crate::map_sqlx_error;
use gather_core::environment::{Clock, SystemClock};
use gather_core::event_store::{EventStore, Mutation, Precondition, StoreFuture, UpdateOutcome};
use gather_core::{Event, EventId, EventQuery, ImageRef, StoreError, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::sync::Arc;

const EVENT_COLUMNS: &str = "id, title, description, date, location, max_attendees, attendees, \
                             image_file_name, image_content_type, created_at, updated_at";

/// Event store backed by the `events` table.
///
/// `conditional_update` runs in one transaction that locks the event row with
/// `SELECT ... FOR UPDATE`. Concurrent updates on the same event queue up on
/// that lock and each sees the state the previous one committed; updates on
/// different events take different row locks and never wait on each other.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresEventStore {
    /// Connect to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the connection cannot be established.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::from_pool(pool))
    }

    /// Use an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp `updated_at` with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `%value%` with LIKE wildcards in `value` escaped.
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn row_to_event(row: &PgRow) -> Result<Event, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Serialization(e.to_string());

    let max_attendees: i32 = row.try_get("max_attendees").map_err(decode)?;
    let max_attendees = u32::try_from(max_attendees)
        .map_err(|_| StoreError::Serialization(format!("negative max_attendees {max_attendees}")))?;
    let attendees: Vec<String> = row.try_get("attendees").map_err(decode)?;

    let file_name: Option<String> = row.try_get("image_file_name").map_err(decode)?;
    let content_type: Option<String> = row.try_get("image_content_type").map_err(decode)?;
    let image = match (file_name, content_type) {
        (Some(file_name), Some(content_type)) => Some(ImageRef {
            file_name,
            content_type,
        }),
        _ => None,
    };

    Ok(Event {
        id: EventId::from_uuid(row.try_get("id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        date: row.try_get("date").map_err(decode)?,
        location: row.try_get("location").map_err(decode)?,
        max_attendees,
        attendees: attendees.into_iter().map(UserId::from).collect(),
        image,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn attendee_strings(event: &Event) -> Vec<String> {
    event.attendees.iter().map(|u| u.as_str().to_owned()).collect()
}

fn max_attendees_param(event: &Event) -> Result<i32, StoreError> {
    i32::try_from(event.max_attendees)
        .map_err(|_| StoreError::Database(format!("max_attendees {} out of range", event.max_attendees)))
}

impl EventStore for PostgresEventStore {
    fn find<'a>(&'a self, query: &'a EventQuery) -> StoreFuture<'a, Vec<Event>> {
        Box::pin(async move {
            let mut sql: QueryBuilder<'_, Postgres> =
                QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));

            if let Some(start) = query.starts_on_or_after {
                sql.push(" AND date >= ").push_bind(start);
            }
            if let Some(end) = query.starts_before {
                sql.push(" AND date < ").push_bind(end);
            }
            if let Some(title) = &query.title_contains {
                sql.push(" AND title ILIKE ")
                    .push_bind(contains_pattern(title))
                    .push(" ESCAPE '\\'");
            }
            if let Some(location) = &query.location_contains {
                sql.push(" AND location ILIKE ")
                    .push_bind(contains_pattern(location))
                    .push(" ESCAPE '\\'");
            }
            if let Some(attendee) = &query.attendee {
                sql.push(" AND ")
                    .push_bind(attendee.as_str().to_owned())
                    .push(" = ANY(attendees)");
            }
            sql.push(" ORDER BY date ASC, id ASC");

            let rows = sql
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            rows.iter().map(row_to_event).collect()
        })
    }

    fn find_by_id(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            row.as_ref().map(row_to_event).transpose()
        })
    }

    fn create(&self, event: Event) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            let (file_name, content_type) = event
                .image
                .as_ref()
                .map(|i| (i.file_name.clone(), i.content_type.clone()))
                .unzip();

            sqlx::query(
                r"
                INSERT INTO events (
                    id, title, description, date, location, max_attendees, attendees,
                    image_file_name, image_content_type, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(*event.id.as_uuid())
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.location)
            .bind(max_attendees_param(&event)?)
            .bind(attendee_strings(&event))
            .bind(file_name)
            .bind(content_type)
            .bind(event.created_at)
            .bind(event.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            tracing::debug!(event_id = %event.id, "Event inserted");
            Ok(event)
        })
    }

    fn conditional_update(
        &self,
        id: EventId,
        preconditions: Vec<Precondition>,
        mutation: Mutation,
    ) -> StoreFuture<'_, UpdateOutcome> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            let row = sqlx::query(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
            ))
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let Some(row) = row else {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Ok(UpdateOutcome::NotFound);
            };
            let mut event = row_to_event(&row)?;

            if let Some(failed) = Precondition::first_failing(&preconditions, &event) {
                let failed = failed.clone();
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Ok(UpdateOutcome::Rejected {
                    failed,
                    current: event,
                });
            }

            mutation.apply(&mut event, self.clock.now());

            sqlx::query(
                r"
                UPDATE events
                SET title = $2,
                    description = $3,
                    date = $4,
                    location = $5,
                    attendees = $6,
                    updated_at = $7
                WHERE id = $1
                ",
            )
            .bind(*event.id.as_uuid())
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.location)
            .bind(attendee_strings(&event))
            .bind(event.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(UpdateOutcome::Applied(event))
        })
    }

    fn delete_by_id(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(*id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(result.rows_affected() > 0)
        })
    }
}
