//! # Bike Repository
//!
//! Database operations for bikes.
//!
//! ## Key Operations
//! - Create with rate inheritance from the category
//! - Availability actions (available / maintenance / retired)
//! - Condition updates
//! - Rental statistics
//!
//! ## Rate Inheritance
//! ```text
//! category "City"     hourly 5.00  daily 25.00  weekly 100.00  monthly 300.00
//! new bike rates      hourly 0     daily 30.00  weekly 0       monthly 0
//!                       │            │            │              │
//!                       ▼            ▼            ▼              ▼
//! stored bike rates   hourly 5.00  daily 30.00  weekly 100.00  monthly 300.00
//! ```
//! Inheritance happens once, at creation. A zero rate means "take the
//! category's".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use velorent_core::lifecycle::{mark_available, retire, send_to_maintenance};
use velorent_core::validation::{validate_bike, validate_condition_state};
use velorent_core::{Bike, BikeCondition, Clock, CoreResult, FrameSize, Money, RateTable, ResourceState};

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::change_log::{append_in, ENTITY_BIKE};

// =============================================================================
// Input / Output Types
// =============================================================================

/// Input for [`BikeRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewBike {
    pub name: String,
    pub category_id: Option<String>,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub frame_size: Option<FrameSize>,
    pub color: Option<String>,
    pub condition: BikeCondition,
    /// Zero rates are inherited from the category.
    pub rates: RateTable,
    pub description: Option<String>,
}

impl NewBike {
    pub fn named(name: impl Into<String>) -> Self {
        NewBike {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }

    pub fn condition(mut self, condition: BikeCondition) -> Self {
        self.condition = condition;
        self
    }
}

/// Rental statistics of one bike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeStats {
    /// Reservations of the bike, in any state.
    pub rental_count: i64,
    /// Sum of `duration_days` over confirmed, ongoing and done reservations.
    pub total_rental_days: f64,
    /// Latest start among confirmed, ongoing and done reservations.
    pub last_rental_date: Option<DateTime<Utc>>,
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct BikeRow {
    id: String,
    name: String,
    category_id: Option<String>,
    serial_number: Option<String>,
    brand: Option<String>,
    model: Option<String>,
    year: Option<i64>,
    frame_size: Option<FrameSize>,
    color: Option<String>,
    state: ResourceState,
    condition: BikeCondition,
    hourly_rate_cents: i64,
    daily_rate_cents: i64,
    weekly_rate_cents: i64,
    monthly_rate_cents: i64,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BikeRow> for Bike {
    fn from(row: BikeRow) -> Self {
        Bike {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            serial_number: row.serial_number,
            brand: row.brand,
            model: row.model,
            year: row.year,
            frame_size: row.frame_size,
            color: row.color,
            state: row.state,
            condition: row.condition,
            rates: RateTable::new(
                Money::from_cents(row.hourly_rate_cents),
                Money::from_cents(row.daily_rate_cents),
                Money::from_cents(row.weekly_rate_cents),
                Money::from_cents(row.monthly_rate_cents),
            ),
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_BIKE: &str = r#"
    SELECT id, name, category_id, serial_number, brand, model, year, frame_size, color,
           state, condition,
           hourly_rate_cents, daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
           description, is_active, created_at, updated_at
    FROM bikes
"#;

/// Loads a bike on an open connection or transaction.
pub(crate) async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Bike>> {
    let row = sqlx::query_as::<_, BikeRow>(&format!("{SELECT_BIKE} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Bike::from))
}

/// Persists the bike's state (and `updated_at`) on an open transaction.
pub(crate) async fn save_state_in(conn: &mut SqliteConnection, bike: &Bike) -> DbResult<()> {
    sqlx::query("UPDATE bikes SET state = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&bike.id)
        .bind(bike.state)
        .bind(bike.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for bike database operations.
///
/// ## Usage
/// ```rust,ignore
/// let bike = db.bikes().create(NewBike::named("C-07").category(&city.id)).await?;
/// db.bikes().set_maintenance(&bike.id).await?;
/// let stats = db.bikes().stats(&bike.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BikeRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl BikeRepository {
    /// Creates a new BikeRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        BikeRepository { pool, clock }
    }

    /// Creates a bike in the `available` state.
    ///
    /// ## Steps
    /// 1. Load the category (if any) and inherit its rates into zero rates
    /// 2. Validate every field rule (a poor bike cannot start available)
    /// 3. INSERT; a duplicate serial number is a [`DbError::UniqueViolation`]
    pub async fn create(&self, input: NewBike) -> DbResult<Bike> {
        let now = self.clock.now();
        let mut tx = begin_write(&self.pool).await?;

        let rates = match input.category_id.as_deref() {
            Some(category_id) => {
                let category_rates = category_rates_in(&mut tx, category_id).await?;
                input.rates.inherit_from(&category_rates)
            }
            None => input.rates,
        };

        let bike = Bike {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            category_id: input.category_id,
            serial_number: input
                .serial_number
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            brand: input.brand,
            model: input.model,
            year: input.year,
            frame_size: input.frame_size,
            color: input.color,
            state: ResourceState::Available,
            condition: input.condition,
            rates,
            description: input.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        validate_bike(&bike)?;

        debug!(id = %bike.id, name = %bike.name, "Creating bike");

        sqlx::query(
            r#"
            INSERT INTO bikes (
                id, name, category_id, serial_number, brand, model, year, frame_size, color,
                state, condition,
                hourly_rate_cents, daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
                description, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19
            )
            "#,
        )
        .bind(&bike.id)
        .bind(&bike.name)
        .bind(&bike.category_id)
        .bind(&bike.serial_number)
        .bind(&bike.brand)
        .bind(&bike.model)
        .bind(bike.year)
        .bind(bike.frame_size)
        .bind(&bike.color)
        .bind(bike.state)
        .bind(bike.condition)
        .bind(bike.rates.hourly_cents)
        .bind(bike.rates.daily_cents)
        .bind(bike.rates.weekly_cents)
        .bind(bike.rates.monthly_cents)
        .bind(&bike.description)
        .bind(bike.is_active)
        .bind(bike.created_at)
        .bind(bike.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("serial number", bike.serial_number.clone().unwrap_or_default())
            }
            other => other,
        })?;

        append_in(
            &mut tx,
            ENTITY_BIKE,
            &bike.id,
            "created",
            json!({ "name": bike.name, "category_id": bike.category_id, "rates": bike.rates }),
            now,
        )
        .await?;

        tx.commit().await?;

        info!(id = %bike.id, name = %bike.name, "Bike created");
        Ok(bike)
    }

    /// Gets a bike by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Bike>> {
        let mut conn = self.pool.acquire().await?;
        find_in(&mut conn, id).await
    }

    /// Active bikes that can be booked right now, by name.
    pub async fn list_available(&self) -> DbResult<Vec<Bike>> {
        let rows = sqlx::query_as::<_, BikeRow>(&format!(
            "{SELECT_BIKE} WHERE is_active = 1 AND state = 'available' ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Bike::from).collect())
    }

    /// Active bikes of a category, by name.
    pub async fn list_by_category(&self, category_id: &str) -> DbResult<Vec<Bike>> {
        let rows = sqlx::query_as::<_, BikeRow>(&format!(
            "{SELECT_BIKE} WHERE is_active = 1 AND category_id = ?1 ORDER BY name ASC"
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Bike::from).collect())
    }

    /// Puts the bike back in the rental pool. Fails for a poor bike.
    pub async fn set_available(&self, id: &str) -> DbResult<Bike> {
        self.change_state(id, "available", mark_available).await
    }

    /// Sends the bike to maintenance.
    pub async fn set_maintenance(&self, id: &str) -> DbResult<Bike> {
        self.change_state(id, "maintenance", send_to_maintenance).await
    }

    /// Retires the bike from the fleet.
    pub async fn retire(&self, id: &str) -> DbResult<Bike> {
        self.change_state(id, "retired", retire).await
    }

    async fn change_state(
        &self,
        id: &str,
        event: &str,
        action: fn(&mut Bike) -> CoreResult<()>,
    ) -> DbResult<Bike> {
        let mut tx = begin_write(&self.pool).await?;

        let mut bike = find_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Bike", id))?;
        let from = bike.state;

        action(&mut bike)?;
        bike.updated_at = self.clock.now();

        save_state_in(&mut tx, &bike).await?;
        append_in(
            &mut tx,
            ENTITY_BIKE,
            &bike.id,
            event,
            json!({ "from": from, "to": bike.state }),
            bike.updated_at,
        )
        .await?;

        tx.commit().await?;

        info!(id = %bike.id, from = %from, to = %bike.state, "Bike state changed");
        Ok(bike)
    }

    /// Records a new condition. A poor bike cannot stay available.
    pub async fn update_condition(&self, id: &str, condition: BikeCondition) -> DbResult<Bike> {
        let mut tx = begin_write(&self.pool).await?;

        let mut bike = find_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Bike", id))?;

        validate_condition_state(&bike.name, condition, bike.state)?;

        let from = bike.condition;
        bike.condition = condition;
        bike.updated_at = self.clock.now();

        sqlx::query("UPDATE bikes SET condition = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&bike.id)
            .bind(bike.condition)
            .bind(bike.updated_at)
            .execute(&mut *tx)
            .await?;

        append_in(
            &mut tx,
            ENTITY_BIKE,
            &bike.id,
            "condition_changed",
            json!({ "from": from, "to": condition }),
            bike.updated_at,
        )
        .await?;

        tx.commit().await?;
        Ok(bike)
    }

    /// Rental statistics of the bike.
    pub async fn stats(&self, id: &str) -> DbResult<BikeStats> {
        let (rental_count, total_rental_days, last_rental_date): (i64, f64, Option<DateTime<Utc>>) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    CAST(COALESCE(SUM(CASE WHEN state IN ('confirmed', 'ongoing', 'done')
                                           THEN duration_days END), 0) AS REAL),
                    MAX(CASE WHEN state IN ('confirmed', 'ongoing', 'done') THEN start_at END)
                FROM reservations
                WHERE bike_id = ?1
                "#,
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(BikeStats {
            rental_count,
            total_rental_days,
            last_rental_date,
        })
    }
}

async fn category_rates_in(conn: &mut SqliteConnection, category_id: &str) -> DbResult<RateTable> {
    let rates: Option<(i64, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT hourly_rate_cents, daily_rate_cents, weekly_rate_cents, monthly_rate_cents
        FROM categories
        WHERE id = ?1
        "#,
    )
    .bind(category_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (hourly, daily, weekly, monthly) = rates.ok_or_else(|| DbError::not_found("Category", category_id))?;

    Ok(RateTable::new(
        Money::from_cents(hourly),
        Money::from_cents(daily),
        Money::from_cents(weekly),
        Money::from_cents(monthly),
    ))
}
