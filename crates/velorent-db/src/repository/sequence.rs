//! # Sequence Repository
//!
//! Gap-free counters behind contract numbers, one per `(code, year)`.
//!
//! ```text
//! sequences
//! ┌──────────────┬──────┬────────────┐
//! │ code         │ year │ next_value │
//! ├──────────────┼──────┼────────────┤
//! │ rental.order │ 2024 │ 42         │  → next contract RENT/2024/00042
//! │ rental.order │ 2025 │ 3          │
//! └──────────────┴──────┴────────────┘
//! ```
//!
//! Allocation is a single `INSERT .. ON CONFLICT DO UPDATE .. RETURNING`
//! statement. Run inside the reservation's transaction, a rollback gives the
//! number back.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for contract number counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next number for `code` in `year`, starting at 1.
    pub async fn next_value(&self, code: &str, year: i32) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        next_value_in(&mut conn, code, year).await
    }

    /// Returns the number the next allocation would get, without taking it.
    pub async fn peek(&self, code: &str, year: i32) -> DbResult<i64> {
        let next: Option<i64> =
            sqlx::query_scalar("SELECT next_value FROM sequences WHERE code = ?1 AND year = ?2")
                .bind(code)
                .bind(year)
                .fetch_optional(&self.pool)
                .await?;

        Ok(next.unwrap_or(1))
    }
}

/// Allocates the next number on an open connection or transaction.
pub(crate) async fn next_value_in(conn: &mut SqliteConnection, code: &str, year: i32) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequences (code, year, next_value)
        VALUES (?1, ?2, 2)
        ON CONFLICT (code, year) DO UPDATE SET next_value = next_value + 1
        RETURNING next_value - 1
        "#,
    )
    .bind(code)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    debug!(code = %code, year = year, value = value, "Allocated sequence number");
    Ok(value)
}
