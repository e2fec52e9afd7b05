//! # Report Repository
//!
//! Read-only access to the reporting views created by `002_reports.sql`.
//!
//! ```text
//! rental_report            one row per reservation (any state)
//! bike_occupancy_report    one row per bike; confirmed, ongoing and done
//!                          reservations only
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use velorent_core::{Money, RateUnit, ReservationState};

use crate::error::DbResult;

/// One row of `rental_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RentalReportRow {
    pub id: String,
    pub contract_number: String,
    pub customer_name: String,
    pub bike_id: String,
    pub category_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub rate_unit: RateUnit,
    pub state: ReservationState,
    pub duration_days: f64,
    pub subtotal_cents: i64,
    pub total_cents: i64,
}

impl RentalReportRow {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One row of `bike_occupancy_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OccupancyRow {
    pub bike_id: String,
    pub category_id: Option<String>,
    pub total_rentals: i64,
    pub total_days_rented: f64,
    pub total_revenue_cents: i64,
    /// Zero for a bike never rented.
    pub avg_rental_duration: f64,
}

impl OccupancyRow {
    pub fn total_revenue(&self) -> Money {
        Money::from_cents(self.total_revenue_cents)
    }
}

const SELECT_RENTAL: &str = r#"
    SELECT id, contract_number, customer_name, bike_id, category_id,
           start_at, end_at, rate_unit, state, duration_days,
           subtotal_cents, total_cents
    FROM rental_report
"#;

const SELECT_OCCUPANCY: &str = r#"
    SELECT bike_id, category_id, total_rentals, total_days_rented,
           total_revenue_cents, avg_rental_duration
    FROM bike_occupancy_report
"#;

/// Repository for the reporting views.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Every reservation, latest start first.
    pub async fn rentals(&self) -> DbResult<Vec<RentalReportRow>> {
        let rows = sqlx::query_as::<_, RentalReportRow>(&format!(
            "{SELECT_RENTAL} ORDER BY start_at DESC, contract_number DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Reservations of one bike, latest start first.
    pub async fn rentals_for_bike(&self, bike_id: &str) -> DbResult<Vec<RentalReportRow>> {
        let rows = sqlx::query_as::<_, RentalReportRow>(&format!(
            "{SELECT_RENTAL} WHERE bike_id = ?1 ORDER BY start_at DESC, contract_number DESC"
        ))
        .bind(bike_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Occupancy of every bike, busiest first.
    pub async fn occupancy(&self) -> DbResult<Vec<OccupancyRow>> {
        let rows = sqlx::query_as::<_, OccupancyRow>(&format!(
            "{SELECT_OCCUPANCY} ORDER BY total_days_rented DESC, bike_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Occupancy of one bike; `None` if the bike does not exist.
    pub async fn occupancy_for_bike(&self, bike_id: &str) -> DbResult<Option<OccupancyRow>> {
        let row = sqlx::query_as::<_, OccupancyRow>(&format!("{SELECT_OCCUPANCY} WHERE bike_id = ?1"))
            .bind(bike_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::bike::NewBike;
    use crate::repository::category::NewCategory;
    use crate::repository::reservation::NewReservation;
    use chrono::TimeZone;
    use velorent_core::scheduler::Interval;
    use velorent_core::FixedClock;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_reports_count_only_holding_and_done() {
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(FixedClock(at(1, 8)));
        let city = db.categories().create(NewCategory::named("City")).await.unwrap();
        let bike = db.bikes().create(NewBike::named("C-01").category(&city.id)).await.unwrap();
        let idle = db.bikes().create(NewBike::named("C-02").category(&city.id)).await.unwrap();
        let repo = db.reservations();

        // Done: 2 days at 25.00
        let a = repo
            .create(NewReservation::new(&bike.id, "Ada", Interval::new(at(1, 10), at(3, 10))))
            .await
            .unwrap();
        repo.confirm(&a.id).await.unwrap();
        repo.start(&a.id).await.unwrap();
        repo.finish(&a.id).await.unwrap();

        // Confirmed: 4 days at 25.00
        let b = repo
            .create(NewReservation::new(&bike.id, "Bob", Interval::new(at(10, 10), at(14, 10))))
            .await
            .unwrap();
        repo.confirm(&b.id).await.unwrap();

        // Draft and cancelled are listed but not counted
        repo.create(NewReservation::new(&bike.id, "Cy", Interval::new(at(20, 10), at(21, 10))))
            .await
            .unwrap();
        let d = repo
            .create(NewReservation::new(&bike.id, "Di", Interval::new(at(25, 10), at(26, 10))))
            .await
            .unwrap();
        repo.cancel(&d.id).await.unwrap();

        let rentals = db.reports().rentals().await.unwrap();
        assert_eq!(rentals.len(), 4);
        assert_eq!(rentals[0].customer_name, "Di");
        assert_eq!(rentals[0].state, ReservationState::Cancelled);
        assert_eq!(rentals[3].contract_number, a.contract_number);
        assert_eq!(rentals[3].category_id.as_deref(), Some(city.id.as_str()));
        assert_eq!(rentals[3].total(), Money::from_cents(5000));
        assert!(db.reports().rentals_for_bike(&idle.id).await.unwrap().is_empty());

        let busy = db.reports().occupancy_for_bike(&bike.id).await.unwrap().unwrap();
        assert_eq!(busy.total_rentals, 2);
        assert_eq!(busy.total_days_rented, 6.0);
        assert_eq!(busy.total_revenue(), Money::from_cents(15000));
        assert_eq!(busy.avg_rental_duration, 3.0);

        let all = db.reports().occupancy().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].bike_id, bike.id);
        assert_eq!(all[1].total_rentals, 0);
        assert_eq!(all[1].avg_rental_duration, 0.0);

        assert!(db.reports().occupancy_for_bike("ghost").await.unwrap().is_none());
    }
}
