//! # Category Repository
//!
//! Bike families and the default rates their bikes inherit.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use velorent_core::validation::{validate_category_name, validate_rate_table};
use velorent_core::{Category, Clock, Money, RateTable};

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::change_log::{append_in, ENTITY_CATEGORY};

/// Input for [`CategoryRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    /// Defaults to 10.
    pub sequence: Option<i64>,
    pub description: Option<String>,
    /// Defaults to the configured category rates.
    pub rates: Option<RateTable>,
}

impl NewCategory {
    pub fn named(name: impl Into<String>) -> Self {
        NewCategory {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn rates(mut self, rates: RateTable) -> Self {
        self.rates = Some(rates);
        self
    }

    pub fn sequence(mut self, sequence: i64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CategoryRow {
    id: String,
    name: String,
    sequence: i64,
    description: Option<String>,
    hourly_rate_cents: i64,
    daily_rate_cents: i64,
    weekly_rate_cents: i64,
    monthly_rate_cents: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            sequence: row.sequence,
            description: row.description,
            rates: RateTable::new(
                Money::from_cents(row.hourly_rate_cents),
                Money::from_cents(row.daily_rate_cents),
                Money::from_cents(row.weekly_rate_cents),
                Money::from_cents(row.monthly_rate_cents),
            ),
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const SELECT_CATEGORY: &str = r#"
    SELECT id, name, sequence, description,
           hourly_rate_cents, daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
           is_active, created_at
    FROM categories
"#;

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    default_rates: RateTable,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, default_rates: RateTable) -> Self {
        CategoryRepository {
            pool,
            clock,
            default_rates,
        }
    }

    /// Creates a category. Names are unique.
    pub async fn create(&self, input: NewCategory) -> DbResult<Category> {
        validate_category_name(&input.name)?;
        let rates = input.rates.unwrap_or(self.default_rates);
        validate_rate_table(&rates)?;

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            sequence: input.sequence.unwrap_or(10),
            description: input.description,
            rates,
            is_active: true,
            created_at: self.clock.now(),
        };

        debug!(id = %category.id, name = %category.name, "Creating category");

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO categories (
                id, name, sequence, description,
                hourly_rate_cents, daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.sequence)
        .bind(&category.description)
        .bind(category.rates.hourly_cents)
        .bind(category.rates.daily_cents)
        .bind(category.rates.weekly_cents)
        .bind(category.rates.monthly_cents)
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("category name", &category.name),
            other => other,
        })?;

        append_in(
            &mut tx,
            ENTITY_CATEGORY,
            &category.id,
            "created",
            json!({ "name": category.name, "rates": category.rates }),
            category.created_at,
        )
        .await?;

        tx.commit().await?;

        info!(id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Gets a category by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT_CATEGORY} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Category::from))
    }

    /// Gets a category by its (unique) name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT_CATEGORY} WHERE name = ?1"))
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Category::from))
    }

    /// Active categories in display order.
    pub async fn list_active(&self) -> DbResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "{SELECT_CATEGORY} WHERE is_active = 1 ORDER BY sequence ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Replaces the category's rates.
    ///
    /// Existing bikes keep the rates they inherited at creation.
    pub async fn update_rates(&self, id: &str, rates: RateTable) -> DbResult<Category> {
        validate_rate_table(&rates)?;

        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE categories SET
                hourly_rate_cents = ?2,
                daily_rate_cents = ?3,
                weekly_rate_cents = ?4,
                monthly_rate_cents = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(rates.hourly_cents)
        .bind(rates.daily_cents)
        .bind(rates.weekly_cents)
        .bind(rates.monthly_cents)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        append_in(
            &mut tx,
            ENTITY_CATEGORY,
            id,
            "rates_changed",
            json!({ "rates": rates }),
            self.clock.now(),
        )
        .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Hides the category from [`Self::list_active`].
    pub async fn archive(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE categories SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_with_default_rates() {
        let db = db().await;
        let city = db.categories().create(NewCategory::named("City")).await.unwrap();

        assert_eq!(city.rates, RateTable::category_default());
        assert_eq!(city.sequence, 10);

        let loaded = db.categories().get(&city.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "City");
        assert_eq!(loaded.rates.daily_cents, 2500);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = db().await;
        db.categories().create(NewCategory::named("Road")).await.unwrap();

        let err = db.categories().create(NewCategory::named("Road")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_negative_rate_rejected() {
        let db = db().await;
        let rates = RateTable {
            hourly_cents: -5,
            ..RateTable::category_default()
        };
        assert!(db.categories().create(NewCategory::named("X").rates(rates)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_active_ordering_and_archive() {
        let db = db().await;
        let repo = db.categories();
        repo.create(NewCategory::named("Road").sequence(20)).await.unwrap();
        let city = repo.create(NewCategory::named("City").sequence(5)).await.unwrap();
        repo.create(NewCategory::named("Mountain").sequence(20)).await.unwrap();

        let names: Vec<String> = repo.list_active().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["City", "Mountain", "Road"]);

        repo.archive(&city.id).await.unwrap();
        assert_eq!(repo.list_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_rates() {
        let db = db().await;
        let road = db.categories().create(NewCategory::named("Road")).await.unwrap();

        let rates = RateTable {
            daily_cents: 3500,
            ..road.rates
        };
        let updated = db.categories().update_rates(&road.id, rates).await.unwrap();
        assert_eq!(updated.rates.daily_cents, 3500);

        assert!(db.categories().update_rates("missing", rates).await.is_err());
    }
}
