//! # Database Pool Management
//!
//! Connection pool creation and the [`Database`] handle that hands out
//! repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  RentalConfig::load(..)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::from_config(&config).await ← pool + migrations + policy     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.reservations().confirm(id)   ── one write transaction ──►          │
//! │  db.reports().occupancy()        ── readers run in parallel (WAL)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so report queries do not
//! block reservation writes. Writers are still serialized, which is what
//! keeps two confirmations of the same bike from both passing the overlap
//! check.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use velorent_core::{Clock, ContractSequence, LifecyclePolicy, RateTable, RateUnit, SystemClock};

use crate::config::RentalConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::bike::BikeRepository;
use crate::repository::category::CategoryRepository;
use crate::repository::change_log::ChangeLogRepository;
use crate::repository::report::ReportRepository;
use crate::repository::reservation::ReservationRepository;
use crate::repository::sequence::SequenceRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/velorent.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits for another writer's lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a writer waits for the write lock.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Single connection: an in-memory database lives and dies with it.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Besides the pool it carries what the repositories need: the lifecycle
/// policy, the contract number format, the pricing defaults and the clock.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::in_memory()).await?;
/// let bike = db.bikes().create(NewBike::named("C-07")).await?;
/// let draft = db.reservations().create(NewReservation::new(&bike.id, "Ada", interval)).await?;
/// db.reservations().confirm(&draft.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    policy: LifecyclePolicy,

    contract_sequence: ContractSequence,

    /// Rates of categories created without their own.
    default_rates: RateTable,

    /// Unit of reservations created without one.
    default_rate_unit: RateUnit,

    clock: Arc<dyn Clock>,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    ///
    /// Policy, contract format, pricing and clock start at their defaults;
    /// see the `with_*` methods.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            policy: LifecyclePolicy::default(),
            contract_sequence: ContractSequence::default(),
            default_rates: RateTable::category_default(),
            default_rate_unit: RateUnit::default(),
            clock: Arc::new(SystemClock),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Opens the database described by a loaded [`RentalConfig`] and applies
    /// its lifecycle policy, contract format and pricing defaults.
    pub async fn from_config(config: &RentalConfig) -> DbResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        Ok(db
            .with_policy(config.policy())
            .with_contract_sequence(config.contract_sequence())
            .with_pricing(config.pricing.category_rates(), config.pricing.default_rate_unit))
    }

    /// Replaces the lifecycle policy.
    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the contract number format.
    pub fn with_contract_sequence(mut self, sequence: ContractSequence) -> Self {
        self.contract_sequence = sequence;
        self
    }

    /// Replaces the default category rates and reservation unit.
    pub fn with_pricing(mut self, default_rates: RateTable, default_rate_unit: RateUnit) -> Self {
        self.default_rates = default_rates;
        self.default_rate_unit = default_rate_unit;
        self
    }

    /// Replaces the clock (tests pin time with `FixedClock`).
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the lifecycle policy in effect.
    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Returns the category repository.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone(), self.clock.clone(), self.default_rates)
    }

    /// Returns the bike repository.
    pub fn bikes(&self) -> BikeRepository {
        BikeRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Returns the reservation repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let outcome = db.reservations().confirm(&reservation_id).await?;
    /// ```
    pub fn reservations(&self) -> ReservationRepository {
        ReservationRepository::new(
            self.pool.clone(),
            self.policy,
            self.contract_sequence.clone(),
            self.default_rate_unit,
            self.clock.clone(),
        )
    }

    /// Returns the contract number counter repository.
    pub fn sequences(&self) -> SequenceRepository {
        SequenceRepository::new(self.pool.clone())
    }

    /// Returns the change log repository.
    pub fn change_log(&self) -> ChangeLogRepository {
        ChangeLogRepository::new(self.pool.clone())
    }

    /// Returns the report repository.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Write Transactions
// =============================================================================

/// Opens a write transaction with `BEGIN IMMEDIATE`.
///
/// The write lock is taken before the first read, so concurrent writers
/// queue on the busy timeout. A deferred `BEGIN` that reads first fails
/// with `SQLITE_BUSY` on the lock upgrade once another writer committed.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
    }

    #[tokio::test]
    async fn test_policy_builder() {
        let policy = LifecyclePolicy {
            strict_transitions: true,
            reserve_on_confirm: false,
        };
        let db = Database::new(DbConfig::in_memory()).await.unwrap().with_policy(policy);
        assert_eq!(db.policy(), policy);
    }

    #[tokio::test]
    async fn test_pricing_defaults_reach_repositories() {
        let rates = RateTable {
            daily_cents: 4000,
            ..RateTable::category_default()
        };
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_pricing(rates, RateUnit::Hourly);

        let category = db
            .categories()
            .create(crate::repository::category::NewCategory::named("Cargo"))
            .await
            .unwrap();
        assert_eq!(category.rates.daily_cents, 4000);
    }
}
