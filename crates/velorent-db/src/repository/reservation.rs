//! # Reservation Repository
//!
//! Database operations for reservations and their lifecycle.
//!
//! ## Reservation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Reservation Lifecycle                             │
//! │                                                                         │
//! │  1. CREATE DRAFT                                                       │
//! │     └── create() → RENT/2024/00001 { state: draft }                   │
//! │         (number allocated, prices computed, overlap checked)           │
//! │                                                                         │
//! │  2. EDIT (draft)                                                       │
//! │     └── reschedule() / change_rate_unit() / change_bike()             │
//! │     └── override_unit_price()                                          │
//! │                                                                         │
//! │  3. CONFIRM        bike must be available, unit price frozen          │
//! │  4. START          bike → rented                                      │
//! │  5. FINISH         bike → available, actual return recorded           │
//! │                                                                         │
//! │  (OPTIONAL) CANCEL from draft or confirmed                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Check-Then-Write
//! Every write loads the reservation, its bike and the bike's holding
//! (confirmed / ongoing) reservations, runs the pure rule from
//! `velorent-core`, then writes the result and a change log entry, all in
//! one transaction. SQLite serializes write transactions, so the overlap
//! check never runs against a stale snapshot.

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

use velorent_core::compute::{
    change_rate_unit, change_resource, override_unit_price, recompute_all, reschedule,
};
use velorent_core::lifecycle::{self, Action, TransitionOutcome};
use velorent_core::scheduler::{validate, validate_interval, Interval};
use velorent_core::sequence::{ContractSequence, RENTAL_SEQUENCE_CODE};
use velorent_core::validation::{validate_customer_name, validate_email};
use velorent_core::{
    Bike, Clock, CoreError, LifecyclePolicy, Money, RateUnit, Reservation, ReservationState,
};

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::bike::{find_in as find_bike_in, save_state_in as save_bike_state_in};
use crate::repository::change_log::{append_in, ENTITY_BIKE, ENTITY_RESERVATION};
use crate::repository::sequence::next_value_in;

// =============================================================================
// Input Type
// =============================================================================

/// Input for [`ReservationRepository::create`].
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub resource_id: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub interval: Interval,
    /// Defaults to the repository's default unit.
    pub rate_unit: Option<RateUnit>,
    pub unit_price: Option<Money>,
    pub notes: Option<String>,
}

impl NewReservation {
    pub fn new(resource_id: impl Into<String>, customer_name: impl Into<String>, interval: Interval) -> Self {
        NewReservation {
            resource_id: resource_id.into(),
            customer_name: customer_name.into(),
            customer_phone: None,
            customer_email: None,
            interval,
            rate_unit: None,
            unit_price: None,
            notes: None,
        }
    }

    pub fn rate_unit(mut self, rate_unit: RateUnit) -> Self {
        self.rate_unit = Some(rate_unit);
        self
    }

    /// Forces the unit price instead of the bike's rate.
    pub fn unit_price(mut self, price: Money) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    pub fn customer_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer_phone = Some(phone.into());
        self
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct ReservationRow {
    id: String,
    contract_number: String,
    bike_id: String,
    customer_name: String,
    customer_phone: Option<String>,
    customer_email: Option<String>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    actual_return_at: Option<DateTime<Utc>>,
    rate_unit: RateUnit,
    unit_price_override_cents: Option<i64>,
    unit_price_cents: i64,
    quantity: f64,
    subtotal_cents: i64,
    duration_hours: f64,
    duration_days: f64,
    state: ReservationState,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            id: row.id,
            contract_number: row.contract_number,
            resource_id: row.bike_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            start: row.start_at,
            end: row.end_at,
            actual_return: row.actual_return_at,
            rate_unit: row.rate_unit,
            unit_price_override_cents: row.unit_price_override_cents,
            unit_price_cents: row.unit_price_cents,
            quantity: row.quantity,
            subtotal_cents: row.subtotal_cents,
            duration_hours: row.duration_hours,
            duration_days: row.duration_days,
            state: row.state,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_RESERVATION: &str = r#"
    SELECT id, contract_number, bike_id, customer_name, customer_phone, customer_email,
           start_at, end_at, actual_return_at, rate_unit,
           unit_price_override_cents, unit_price_cents, quantity, subtotal_cents,
           duration_hours, duration_days, state, notes, created_at, updated_at
    FROM reservations
"#;

async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Reservation>> {
    let row = sqlx::query_as::<_, ReservationRow>(&format!("{SELECT_RESERVATION} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Reservation::from))
}

async fn require_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Reservation> {
    find_in(conn, id)
        .await?
        .ok_or_else(|| CoreError::ReservationNotFound(id.to_string()).into())
}

async fn require_bike_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Bike> {
    find_bike_in(conn, id)
        .await?
        .ok_or_else(|| CoreError::ResourceNotFound(id.to_string()).into())
}

/// Confirmed and ongoing reservations of a bike.
async fn holding_in(conn: &mut SqliteConnection, bike_id: &str) -> DbResult<Vec<Reservation>> {
    let rows = sqlx::query_as::<_, ReservationRow>(&format!(
        "{SELECT_RESERVATION} WHERE bike_id = ?1 AND state IN ('confirmed', 'ongoing') ORDER BY start_at ASC"
    ))
    .bind(bike_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Reservation::from).collect())
}

async fn insert_in(conn: &mut SqliteConnection, r: &Reservation) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations (
            id, contract_number, bike_id, customer_name, customer_phone, customer_email,
            start_at, end_at, actual_return_at, rate_unit,
            unit_price_override_cents, unit_price_cents, quantity, subtotal_cents,
            duration_hours, duration_days, state, notes, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19, ?20
        )
        "#,
    )
    .bind(&r.id)
    .bind(&r.contract_number)
    .bind(&r.resource_id)
    .bind(&r.customer_name)
    .bind(&r.customer_phone)
    .bind(&r.customer_email)
    .bind(r.start)
    .bind(r.end)
    .bind(r.actual_return)
    .bind(r.rate_unit)
    .bind(r.unit_price_override_cents)
    .bind(r.unit_price_cents)
    .bind(r.quantity)
    .bind(r.subtotal_cents)
    .bind(r.duration_hours)
    .bind(r.duration_days)
    .bind(r.state)
    .bind(&r.notes)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes every mutable column back.
async fn save_in(conn: &mut SqliteConnection, r: &Reservation) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE reservations SET
            bike_id = ?2,
            start_at = ?3,
            end_at = ?4,
            actual_return_at = ?5,
            rate_unit = ?6,
            unit_price_override_cents = ?7,
            unit_price_cents = ?8,
            quantity = ?9,
            subtotal_cents = ?10,
            duration_hours = ?11,
            duration_days = ?12,
            state = ?13,
            notes = ?14,
            updated_at = ?15
        WHERE id = ?1
        "#,
    )
    .bind(&r.id)
    .bind(&r.resource_id)
    .bind(r.start)
    .bind(r.end)
    .bind(r.actual_return)
    .bind(r.rate_unit)
    .bind(r.unit_price_override_cents)
    .bind(r.unit_price_cents)
    .bind(r.quantity)
    .bind(r.subtotal_cents)
    .bind(r.duration_hours)
    .bind(r.duration_days)
    .bind(r.state)
    .bind(&r.notes)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn pricing_payload(r: &Reservation) -> serde_json::Value {
    json!({
        "start": r.start,
        "end": r.end,
        "rate_unit": r.rate_unit,
        "unit_price_cents": r.unit_price_cents,
        "quantity": r.quantity,
        "subtotal_cents": r.subtotal_cents,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reservation database operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
    policy: LifecyclePolicy,
    contract_sequence: ContractSequence,
    default_rate_unit: RateUnit,
    clock: Arc<dyn Clock>,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(
        pool: SqlitePool,
        policy: LifecyclePolicy,
        contract_sequence: ContractSequence,
        default_rate_unit: RateUnit,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ReservationRepository {
            pool,
            policy,
            contract_sequence,
            default_rate_unit,
            clock,
        }
    }

    /// Creates a draft reservation.
    ///
    /// ## Steps (one transaction)
    /// 1. Validate customer fields and the interval
    /// 2. Load the bike ([`CoreError::ResourceNotFound`] if missing)
    /// 3. Compute duration, unit price, quantity, subtotal
    /// 4. Check overlap against the bike's confirmed / ongoing reservations
    /// 5. Allocate the contract number, INSERT, log, COMMIT
    ///
    /// ## Example
    /// ```rust,ignore
    /// let draft = db.reservations()
    ///     .create(NewReservation::new(&bike.id, "Ada", Interval::new(start, end)))
    ///     .await?;
    /// assert_eq!(draft.contract_number, "RENT/2024/00001");
    /// ```
    pub async fn create(&self, input: NewReservation) -> DbResult<Reservation> {
        validate_customer_name(&input.customer_name)?;
        validate_email(input.customer_email.as_deref())?;
        validate_interval(&input.interval)?;

        let now = self.clock.now();
        let mut tx = begin_write(&self.pool).await?;

        let bike = require_bike_in(&mut tx, &input.resource_id).await?;

        let mut reservation = Reservation::draft(
            input.resource_id,
            input.customer_name.trim(),
            input.interval,
            input.rate_unit.unwrap_or(self.default_rate_unit),
            now,
        );
        reservation.customer_phone = input.customer_phone;
        reservation.customer_email = input.customer_email;
        reservation.notes = input.notes;

        if let Some(price) = input.unit_price {
            override_unit_price(&mut reservation, Some(price), Some(&bike))?;
        }
        recompute_all(&mut reservation, Some(&bike));

        let holding = holding_in(&mut tx, &bike.id).await?;
        validate(&reservation, &holding)?;

        let number = next_value_in(&mut tx, RENTAL_SEQUENCE_CODE, now.year()).await?;
        reservation.contract_number = self.contract_sequence.format(number, now);

        debug!(
            id = %reservation.id,
            contract_number = %reservation.contract_number,
            bike_id = %bike.id,
            "Creating reservation"
        );

        insert_in(&mut tx, &reservation).await?;
        append_in(
            &mut tx,
            ENTITY_RESERVATION,
            &reservation.id,
            "created",
            json!({
                "contract_number": reservation.contract_number,
                "bike_id": reservation.resource_id,
                "pricing": pricing_payload(&reservation),
            }),
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            contract_number = %reservation.contract_number,
            subtotal = %reservation.subtotal(),
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Gets a reservation by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Reservation>> {
        let mut conn = self.pool.acquire().await?;
        find_in(&mut conn, id).await
    }

    /// Gets a reservation by contract number.
    pub async fn get_by_contract_number(&self, contract_number: &str) -> DbResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "{SELECT_RESERVATION} WHERE contract_number = ?1"
        ))
        .bind(contract_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Reservation::from))
    }

    /// All reservations of a bike, by start.
    pub async fn list_for_bike(&self, bike_id: &str) -> DbResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "{SELECT_RESERVATION} WHERE bike_id = ?1 ORDER BY start_at ASC"
        ))
        .bind(bike_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    /// Reservations in one state, by start.
    pub async fn list_by_state(&self, state: ReservationState) -> DbResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "{SELECT_RESERVATION} WHERE state = ?1 ORDER BY start_at ASC"
        ))
        .bind(state)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    // =========================================================================
    // Field Edits
    // =========================================================================

    /// Moves the reservation to new dates. Re-bills at the current (or
    /// frozen) unit price and re-checks overlap.
    pub async fn reschedule(&self, id: &str, interval: Interval) -> DbResult<Reservation> {
        self.edit(id, "rescheduled", |r, bike| reschedule(r, interval, bike))
            .await
    }

    /// Changes the billing unit. Draft only.
    pub async fn change_rate_unit(&self, id: &str, rate_unit: RateUnit) -> DbResult<Reservation> {
        self.edit(id, "rate_unit_changed", |r, bike| change_rate_unit(r, rate_unit, bike))
            .await
    }

    /// Forces the unit price, or goes back to the bike's rate with `None`.
    /// Draft only.
    pub async fn override_unit_price(&self, id: &str, price: Option<Money>) -> DbResult<Reservation> {
        self.edit(id, "unit_price_overridden", |r, bike| override_unit_price(r, price, bike))
            .await
    }

    /// Moves the reservation to another bike. Draft only.
    pub async fn change_bike(&self, id: &str, bike_id: &str) -> DbResult<Reservation> {
        let now = self.clock.now();
        let mut tx = begin_write(&self.pool).await?;

        let mut reservation = require_in(&mut tx, id).await?;
        let bike = require_bike_in(&mut tx, bike_id).await?;

        change_resource(&mut reservation, &bike.id, Some(&bike))?;

        let holding = holding_in(&mut tx, &bike.id).await?;
        validate(&reservation, &holding)?;

        reservation.updated_at = now;
        save_in(&mut tx, &reservation).await?;
        append_in(
            &mut tx,
            ENTITY_RESERVATION,
            &reservation.id,
            "bike_changed",
            json!({ "bike_id": bike.id, "pricing": pricing_payload(&reservation) }),
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn edit<F>(&self, id: &str, event: &str, apply: F) -> DbResult<Reservation>
    where
        F: FnOnce(&mut Reservation, Option<&Bike>) -> Result<(), CoreError>,
    {
        let now = self.clock.now();
        let mut tx = begin_write(&self.pool).await?;

        let mut reservation = require_in(&mut tx, id).await?;
        let bike = find_bike_in(&mut tx, &reservation.resource_id).await?;

        apply(&mut reservation, bike.as_ref())?;

        let holding = holding_in(&mut tx, &reservation.resource_id).await?;
        validate(&reservation, &holding)?;

        reservation.updated_at = now;
        save_in(&mut tx, &reservation).await?;
        append_in(
            &mut tx,
            ENTITY_RESERVATION,
            &reservation.id,
            event,
            pricing_payload(&reservation),
            now,
        )
        .await?;

        tx.commit().await?;

        debug!(contract_number = %reservation.contract_number, event = %event, "Reservation edited");
        Ok(reservation)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// `draft → confirmed`. The bike must be available; the unit price is
    /// frozen.
    pub async fn confirm(&self, id: &str) -> DbResult<TransitionOutcome> {
        let policy = self.policy;
        self.transition(id, Action::Confirm, |r, bike, holding, _| {
            let bike = bike.ok_or_else(|| CoreError::ResourceNotFound(r.resource_id.clone()))?;
            lifecycle::confirm(r, bike, holding, policy)
        })
        .await
    }

    /// `confirmed → ongoing`. The bike becomes rented.
    pub async fn start(&self, id: &str) -> DbResult<TransitionOutcome> {
        let policy = self.policy;
        self.transition(id, Action::Start, |r, bike, holding, _| {
            let bike = bike.ok_or_else(|| CoreError::ResourceNotFound(r.resource_id.clone()))?;
            lifecycle::start(r, bike, holding, policy)
        })
        .await
    }

    /// `ongoing → done`. The bike is available again; the return time is
    /// the clock's now.
    pub async fn finish(&self, id: &str) -> DbResult<TransitionOutcome> {
        let policy = self.policy;
        self.transition(id, Action::Finish, |r, bike, _, now| {
            let bike = bike.ok_or_else(|| CoreError::ResourceNotFound(r.resource_id.clone()))?;
            lifecycle::finish(r, bike, now, policy)
        })
        .await
    }

    /// `draft | confirmed → cancelled`.
    pub async fn cancel(&self, id: &str) -> DbResult<TransitionOutcome> {
        let policy = self.policy;
        self.transition(id, Action::Cancel, |r, bike, _, _| lifecycle::cancel(r, bike, policy))
            .await
    }

    /// Runs one lifecycle action in a transaction.
    ///
    /// Skipped transitions write nothing and roll back.
    async fn transition<F>(&self, id: &str, action: Action, apply: F) -> DbResult<TransitionOutcome>
    where
        F: FnOnce(
            &mut Reservation,
            Option<&mut Bike>,
            &[Reservation],
            DateTime<Utc>,
        ) -> Result<TransitionOutcome, CoreError>,
    {
        let now = self.clock.now();
        let mut tx = begin_write(&self.pool).await?;

        let mut reservation = require_in(&mut tx, id).await?;
        let mut bike = find_bike_in(&mut tx, &reservation.resource_id).await?;
        let bike_state_before = bike.as_ref().map(|b| b.state);
        let holding = holding_in(&mut tx, &reservation.resource_id).await?;

        let outcome = apply(&mut reservation, bike.as_mut(), holding.as_slice(), now)?;

        let (from, to) = match outcome {
            TransitionOutcome::Applied { from, to } => (from, to),
            TransitionOutcome::Skipped { state } => {
                debug!(
                    contract_number = %reservation.contract_number,
                    action = action.as_str(),
                    state = %state,
                    "Transition skipped"
                );
                return Ok(outcome);
            }
        };

        reservation.updated_at = now;
        save_in(&mut tx, &reservation).await?;
        append_in(
            &mut tx,
            ENTITY_RESERVATION,
            &reservation.id,
            action.as_str(),
            json!({
                "from": from,
                "to": to,
                "unit_price_cents": reservation.unit_price_cents,
                "subtotal_cents": reservation.subtotal_cents,
                "actual_return": reservation.actual_return,
            }),
            now,
        )
        .await?;

        if let Some(bike) = bike.as_mut() {
            if Some(bike.state) != bike_state_before {
                bike.updated_at = now;
                save_bike_state_in(&mut tx, bike).await?;
                append_in(
                    &mut tx,
                    ENTITY_BIKE,
                    &bike.id,
                    bike.state.as_str(),
                    json!({
                        "from": bike_state_before,
                        "to": bike.state,
                        "contract_number": reservation.contract_number,
                    }),
                    now,
                )
                .await?;
            }
        }

        tx.commit().await?;

        if let Some(bike) = bike.as_ref().filter(|b| Some(b.state) != bike_state_before) {
            info!(
                id = %bike.id,
                state = %bike.state,
                condition = %bike.condition,
                contract_number = %reservation.contract_number,
                "Bike state changed"
            );
        }
        info!(
            contract_number = %reservation.contract_number,
            action = action.as_str(),
            from = %from,
            to = %to,
            "Reservation transition applied"
        );
        Ok(outcome)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::bike::NewBike;
    use chrono::TimeZone;
    use velorent_core::{BikeCondition, FixedClock, RateTable, ResourceState};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    async fn setup(policy: LifecyclePolicy) -> (Database, Bike) {
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_policy(policy)
            .with_clock(FixedClock(at(1, 8)));
        let bike = db
            .bikes()
            .create(NewBike::named("R").rates(RateTable::category_default()))
            .await
            .unwrap();
        (db, bike)
    }

    async fn draft(db: &Database, bike: &Bike, start: DateTime<Utc>, end: DateTime<Utc>) -> Reservation {
        db.reservations()
            .create(NewReservation::new(&bike.id, "Ada", Interval::new(start, end)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_numbers_and_prices() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;

        let first = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        let second = draft(&db, &bike, at(10, 10), at(11, 10)).await;

        assert_eq!(first.contract_number, "RENT/2024/00001");
        assert_eq!(second.contract_number, "RENT/2024/00002");
        assert_eq!(first.state, ReservationState::Draft);
        assert_eq!(first.quantity, 2.0);
        assert_eq!(first.subtotal_cents, 5000);

        let loaded = db.reservations().get(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded.start, first.start);
        assert_eq!(loaded.end, first.end);
        assert_eq!(loaded.subtotal_cents, 5000);
        assert_eq!(loaded.rate_unit, RateUnit::Daily);

        let by_number = db
            .reservations()
            .get_by_contract_number("RENT/2024/00002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_number.id, second.id);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_interval_and_missing_bike() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;

        let err = db
            .reservations()
            .create(NewReservation::new(&bike.id, "Ada", Interval::new(at(2, 10), at(2, 10))))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidInterval { .. })));

        let err = db
            .reservations()
            .create(NewReservation::new("ghost", "Ada", Interval::new(at(2, 10), at(3, 10))))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ResourceNotFound(_))));

        // Neither attempt consumed a contract number
        let ok = draft(&db, &bike, at(2, 10), at(3, 10)).await;
        assert_eq!(ok.contract_number, "RENT/2024/00001");
    }

    /// Second booking inside a confirmed one is rejected and names the first.
    #[tokio::test]
    async fn test_overlap_with_confirmed_reservation() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;

        let first = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        db.reservations().confirm(&first.id).await.unwrap();

        let err = db
            .reservations()
            .create(NewReservation::new(&bike.id, "Bob", Interval::new(at(2, 0), at(2, 12))))
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::Overlap { contract_number, start, end, .. }) => {
                assert_eq!(contract_number, first.contract_number);
                assert_eq!(start, first.start);
                assert_eq!(end, first.end);
            }
            other => panic!("expected overlap, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drafts_do_not_block_but_confirm_rechecks() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;

        let a = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        let b = draft(&db, &bike, at(2, 10), at(4, 10)).await;

        db.reservations().confirm(&a.id).await.unwrap();
        let err = db.reservations().confirm(&b.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Overlap { .. })));

        let b = db.reservations().get(&b.id).await.unwrap().unwrap();
        assert_eq!(b.state, ReservationState::Draft);
    }

    #[tokio::test]
    async fn test_back_to_back_reservations() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;

        let a = draft(&db, &bike, at(1, 10), at(1, 12)).await;
        let b = draft(&db, &bike, at(1, 12), at(1, 14)).await;
        db.reservations().confirm(&a.id).await.unwrap();
        assert!(db.reservations().confirm(&b.id).await.unwrap().is_applied());
    }

    /// Draft → confirmed → ongoing → done drives the bike state.
    #[tokio::test]
    async fn test_full_lifecycle_updates_bike() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        let repo = db.reservations();

        repo.confirm(&r.id).await.unwrap();
        assert_eq!(db.bikes().get(&bike.id).await.unwrap().unwrap().state, ResourceState::Available);

        repo.start(&r.id).await.unwrap();
        assert_eq!(db.bikes().get(&bike.id).await.unwrap().unwrap().state, ResourceState::Rented);

        repo.finish(&r.id).await.unwrap();
        let bike_after = db.bikes().get(&bike.id).await.unwrap().unwrap();
        assert_eq!(bike_after.state, ResourceState::Available);

        let done = repo.get(&r.id).await.unwrap().unwrap();
        assert_eq!(done.state, ReservationState::Done);
        assert_eq!(done.actual_return, Some(at(1, 8)));

        let events: Vec<String> = db
            .change_log()
            .list_for_entity(crate::repository::change_log::ENTITY_RESERVATION, &r.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(events, vec!["created", "confirm", "start", "finish"]);

        let stats = db.bikes().stats(&bike.id).await.unwrap();
        assert_eq!(stats.rental_count, 1);
        assert_eq!(stats.total_rental_days, 2.0);
        assert_eq!(stats.last_rental_date, Some(at(1, 10)));
    }

    #[tokio::test]
    async fn test_finish_with_bike_damaged_during_rental() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        let repo = db.reservations();
        repo.confirm(&r.id).await.unwrap();
        repo.start(&r.id).await.unwrap();
        db.bikes().update_condition(&bike.id, BikeCondition::Poor).await.unwrap();

        assert!(repo.finish(&r.id).await.unwrap().is_applied());

        let bike_after = db.bikes().get(&bike.id).await.unwrap().unwrap();
        assert_eq!(bike_after.state, ResourceState::Maintenance);
        assert_eq!(bike_after.condition, BikeCondition::Poor);
        assert_eq!(repo.get(&r.id).await.unwrap().unwrap().state, ReservationState::Done);

        let events: Vec<String> = db
            .change_log()
            .list_for_entity(crate::repository::change_log::ENTITY_BIKE, &bike.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert!(events.contains(&"condition_changed".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("maintenance"));

        // Still poor: the workshop has to fix it before it is rentable
        assert!(db.bikes().set_available(&bike.id).await.is_err());
    }

    #[tokio::test]
    async fn test_confirm_on_ongoing_is_noop() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        let repo = db.reservations();
        repo.confirm(&r.id).await.unwrap();
        repo.start(&r.id).await.unwrap();

        let outcome = repo.confirm(&r.id).await.unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Skipped {
                state: ReservationState::Ongoing
            }
        );
        let r = repo.get(&r.id).await.unwrap().unwrap();
        assert_eq!(r.state, ReservationState::Ongoing);
        assert_eq!(db.bikes().get(&bike.id).await.unwrap().unwrap().state, ResourceState::Rented);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_wrong_state() {
        let policy = LifecyclePolicy {
            strict_transitions: true,
            reserve_on_confirm: false,
        };
        let (db, bike) = setup(policy).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;

        let err = db.reservations().finish(&r.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_confirm_requires_available_bike() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        db.bikes().set_maintenance(&bike.id).await.unwrap();

        let err = db.reservations().confirm(&r.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ResourceUnavailable { .. })));
        let r = db.reservations().get(&r.id).await.unwrap().unwrap();
        assert_eq!(r.state, ReservationState::Draft);
    }

    #[tokio::test]
    async fn test_reserve_on_confirm_policy() {
        let policy = LifecyclePolicy {
            strict_transitions: false,
            reserve_on_confirm: true,
        };
        let (db, bike) = setup(policy).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;

        db.reservations().confirm(&r.id).await.unwrap();
        assert_eq!(db.bikes().get(&bike.id).await.unwrap().unwrap().state, ResourceState::Reserved);

        // The shop cannot pull a reserved bike from under its reservation
        let err = db.bikes().set_maintenance(&bike.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ResourceUnavailable {
                state: ResourceState::Reserved,
                ..
            })
        ));
        assert!(db.bikes().retire(&bike.id).await.is_err());
        assert_eq!(db.bikes().get(&bike.id).await.unwrap().unwrap().state, ResourceState::Reserved);

        db.reservations().cancel(&r.id).await.unwrap();
        assert_eq!(db.bikes().get(&bike.id).await.unwrap().unwrap().state, ResourceState::Available);
    }

    #[tokio::test]
    async fn test_price_frozen_after_confirm() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let r = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        let repo = db.reservations();

        let r = repo.override_unit_price(&r.id, Some(Money::from_cents(2000))).await.unwrap();
        assert_eq!(r.subtotal_cents, 4000);

        repo.confirm(&r.id).await.unwrap();

        let err = repo.change_rate_unit(&r.id, RateUnit::Hourly).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ReservationLocked { .. })));

        // Extending a confirmed rental re-bills at the frozen price
        let r = repo.reschedule(&r.id, Interval::new(at(1, 10), at(4, 10))).await.unwrap();
        assert_eq!(r.unit_price_cents, 2000);
        assert_eq!(r.subtotal_cents, 6000);
    }

    #[tokio::test]
    async fn test_edits_reprice_draft() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let r = draft(&db, &bike, at(1, 10), at(1, 12)).await;
        let repo = db.reservations();

        assert_eq!(r.quantity, 1.0);
        let r = repo.change_rate_unit(&r.id, RateUnit::Hourly).await.unwrap();
        assert_eq!(r.quantity, 2.0);
        assert_eq!(r.subtotal_cents, 1000);

        let other = db
            .bikes()
            .create(NewBike::named("S").rates(RateTable {
                hourly_cents: 800,
                ..RateTable::category_default()
            }))
            .await
            .unwrap();
        let r = repo.change_bike(&r.id, &other.id).await.unwrap();
        assert_eq!(r.resource_id, other.id);
        assert_eq!(r.subtotal_cents, 1600);

        assert_eq!(repo.list_for_bike(&other.id).await.unwrap().len(), 1);
        assert!(repo.list_for_bike(&bike.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_reservation_frees_the_slot() {
        let (db, bike) = setup(LifecyclePolicy::default()).await;
        let a = draft(&db, &bike, at(1, 10), at(3, 10)).await;
        db.reservations().confirm(&a.id).await.unwrap();
        db.reservations().cancel(&a.id).await.unwrap();

        let b = draft(&db, &bike, at(2, 10), at(4, 10)).await;
        assert!(db.reservations().confirm(&b.id).await.unwrap().is_applied());
        assert_eq!(db.reservations().list_by_state(ReservationState::Cancelled).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_reservation() {
        let (db, _) = setup(LifecyclePolicy::default()).await;
        let err = db.reservations().confirm("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ReservationNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("velorent.db")).max_connections(5))
            .await
            .unwrap()
            .with_clock(FixedClock(at(1, 8)));
        let a = db.bikes().create(NewBike::named("A").rates(RateTable::category_default())).await.unwrap();
        let b = db.bikes().create(NewBike::named("B").rates(RateTable::category_default())).await.unwrap();

        let confirm = |db: &Database, id: String| {
            let db = db.clone();
            tokio::spawn(async move { db.reservations().confirm(&id).await })
        };

        // Different bikes never contend on the overlap check
        for day in 1..=20 {
            let ra = draft(&db, &a, at(day, 10), at(day, 12)).await;
            let rb = draft(&db, &b, at(day, 10), at(day, 12)).await;

            let (x, y) = tokio::join!(confirm(&db, ra.id), confirm(&db, rb.id));
            assert!(x.unwrap().unwrap().is_applied(), "day {day}: bike A");
            assert!(y.unwrap().unwrap().is_applied(), "day {day}: bike B");
        }

        // Overlapping drafts on one bike: exactly one wins
        for day in 21..=30 {
            let first = draft(&db, &a, at(day, 10), at(day, 12)).await;
            let second = draft(&db, &a, at(day, 11), at(day, 13)).await;

            let (x, y) = tokio::join!(confirm(&db, first.id), confirm(&db, second.id));
            let results = [x.unwrap(), y.unwrap()];
            let applied = results
                .iter()
                .filter(|r| matches!(r, Ok(outcome) if outcome.is_applied()))
                .count();
            let overlaps = results
                .iter()
                .filter(|r| matches!(r, Err(DbError::Domain(CoreError::Overlap { .. }))))
                .count();
            assert_eq!((applied, overlaps), (1, 1), "day {day}: {results:?}");
        }

        assert_eq!(
            db.reservations().list_by_state(ReservationState::Confirmed).await.unwrap().len(),
            50
        );
    }
}
