//! # Change Log Repository
//!
//! Append-only record of what happened to bikes and reservations.
//!
//! ## Same-Transaction Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.reservations().confirm(id)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE reservations SET state = 'confirmed' WHERE id = ?    │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO change_log (entity_type, entity_id, event, ..)  │   │
//! │  │     VALUES ('reservation', ?, 'confirm', <JSON payload>)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← the change and its log entry exist together or not at all    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Entity type of reservation entries.
pub const ENTITY_RESERVATION: &str = "reservation";
/// Entity type of bike entries.
pub const ENTITY_BIKE: &str = "bike";
/// Entity type of category entries.
pub const ENTITY_CATEGORY: &str = "category";

/// One change log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    /// What happened (`created`, `rescheduled`, `confirm`, ...).
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ChangeLogRow {
    id: String,
    entity_type: String,
    entity_id: String,
    event: String,
    payload: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChangeLogRow> for ChangeLogEntry {
    type Error = DbError;

    fn try_from(row: ChangeLogRow) -> DbResult<Self> {
        let payload = serde_json::from_str(&row.payload).map_err(|e| DbError::Corrupt {
            table: "change_log",
            reason: e.to_string(),
        })?;

        Ok(ChangeLogEntry {
            id: row.id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            event: row.event,
            payload,
            created_at: row.created_at,
        })
    }
}

/// Repository for the change log.
#[derive(Debug, Clone)]
pub struct ChangeLogRepository {
    pool: SqlitePool,
}

impl ChangeLogRepository {
    /// Creates a new ChangeLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ChangeLogRepository { pool }
    }

    /// Appends an entry outside of any other write.
    pub async fn append(
        &self,
        entity_type: &str,
        entity_id: &str,
        event: &str,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    ) -> DbResult<ChangeLogEntry> {
        let mut conn = self.pool.acquire().await?;
        append_in(&mut conn, entity_type, entity_id, event, payload, at).await
    }

    /// Entries of one entity, in insertion order.
    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> DbResult<Vec<ChangeLogEntry>> {
        let rows = sqlx::query_as::<_, ChangeLogRow>(
            r#"
            SELECT id, entity_type, entity_id, event, payload, created_at
            FROM change_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY rowid ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChangeLogEntry::try_from).collect()
    }

    /// Number of entries (all entities).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM change_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Appends an entry on an open connection or transaction.
pub(crate) async fn append_in(
    conn: &mut SqliteConnection,
    entity_type: &str,
    entity_id: &str,
    event: &str,
    payload: serde_json::Value,
    at: DateTime<Utc>,
) -> DbResult<ChangeLogEntry> {
    let entry = ChangeLogEntry {
        id: Uuid::new_v4().to_string(),
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        event: event.to_string(),
        payload,
        created_at: at,
    };

    debug!(
        entity_type = %entry.entity_type,
        entity_id = %entry.entity_id,
        event = %entry.event,
        "Appending change log entry"
    );

    sqlx::query(
        r#"
        INSERT INTO change_log (id, entity_type, entity_id, event, payload, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.event)
    .bind(serde_json::to_string(&entry.payload)?)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = db.change_log();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        log.append(ENTITY_BIKE, "b1", "created", json!({"name": "C-07"}), t)
            .await
            .unwrap();
        log.append(ENTITY_BIKE, "b1", "maintenance", json!({}), t).await.unwrap();
        log.append(ENTITY_BIKE, "b2", "created", json!({}), t).await.unwrap();

        let entries = log.list_for_entity(ENTITY_BIKE, "b1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "created");
        assert_eq!(entries[0].payload["name"], "C-07");
        assert_eq!(entries[1].event, "maintenance");
        assert_eq!(log.count().await.unwrap(), 3);
    }
}
