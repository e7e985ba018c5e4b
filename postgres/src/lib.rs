//! `PostgreSQL` storage for the Gather event service.
//!
//! This crate provides:
//!
//! - [`PostgresEventStore`]: the `EventStore` port, with conditional updates
//!   serialized per event by a row lock
//! - [`PostgresUserDirectory`]: the `UserDirectory` port over the `users` table
//! - [`migrate`]: the embedded schema migrations
//!
//! # Example
//!
//! ```no_run
//! use gather_postgres::{PostgresEventStore, PostgresUserDirectory, migrate};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/gather").await?;
//! migrate(&pool).await?;
//!
//! let events = PostgresEventStore::from_pool(pool.clone());
//! let users = PostgresUserDirectory::new(pool);
//! # Ok(())
//! # }
//! ```

mod directory;
mod event_store;

pub use directory::PostgresUserDirectory;
pub use event_store::PostgresEventStore;

use gather_core::StoreError;
use sqlx::PgPool;

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Classify a driver error.
///
/// Connection-level failures are reported as `Unavailable` so callers can
/// tell a retryable outage from a bad query or a corrupt row.
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(error.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Serialization(error.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}
