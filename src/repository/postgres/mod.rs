//! PostgreSQL-backed repository.
//!
//! Queries are built at runtime (`sqlx::query_as` and `QueryBuilder` with bound
//! parameters), so the crate compiles without a live database. Multi-row writes run in a
//! transaction and lock the rows whose counters they change with `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::AdminRepository;
use crate::{
    error::{AppError, AppResult},
    models::PlatformStats,
    pagination::Page,
};

mod applications;
mod attendance;
mod jobs;
mod locations;
mod shifts;
mod users;
mod wallet;

/// PostgresRepository
///
/// The concrete implementation of the repository traits, backed by a connection pool.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends `ORDER BY <column> <dir>, id` and the page window. `column` always comes
/// from a sort enum, never from user input.
pub(crate) fn push_order_and_page(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    direction: &str,
    page: Page,
) {
    builder.push(format!(" ORDER BY {column} {direction}, id {direction}"));
    builder.push(" LIMIT ");
    builder.push_bind(page.limit);
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
}

/// Turns a unique-index violation into a `Conflict` carrying `message`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(message.to_string());
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl AdminRepository for PostgresRepository {
    async fn platform_stats(&self) -> AppResult<PlatformStats> {
        let stats = sqlx::query_as::<_, PlatformStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'guard') AS total_guards,
                (SELECT COUNT(*) FROM users WHERE role = 'agency') AS total_agencies,
                (SELECT COUNT(*) FROM users WHERE status = 'pending') AS pending_users,
                (SELECT COUNT(*) FROM jobs WHERE status IN ('open', 'hiring')) AS open_jobs,
                (SELECT COUNT(*) FROM shifts WHERE status = 'open') AS open_shifts,
                (SELECT COALESCE(SUM(e.amount_cents), 0)::BIGINT
                   FROM transactions e
                  WHERE e.type = 'escrow'
                    AND e.status = 'success'
                    AND NOT EXISTS (
                        SELECT 1 FROM transactions r
                         WHERE r.type = 'release' AND r.reference_id = e.id
                    )) AS escrow_held_cents
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
