//! `PostgreSQL` user directory.

use gather_core::directory::UserDirectory;
use gather_core::{DirectoryError, User, UserId};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// Reads users from the `users` table.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Create a directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for PostgresUserDirectory {
    fn find_users<'a>(
        &'a self,
        ids: &'a [UserId],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<User>, DirectoryError>> + Send + 'a>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_owned()).collect();

            let rows = sqlx::query("SELECT id, email, display_name FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DirectoryError::Lookup(e.to_string()))?;

            rows.iter()
                .map(|row| {
                    let decode = |e: sqlx::Error| DirectoryError::Lookup(e.to_string());
                    Ok(User {
                        id: UserId::new(row.try_get::<String, _>("id").map_err(decode)?),
                        email: row.try_get("email").map_err(decode)?,
                        display_name: row.try_get("display_name").map_err(decode)?,
                    })
                })
                .collect()
        })
    }
}
