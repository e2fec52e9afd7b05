//! # Rental Configuration
//!
//! Settings for the record layer: where the database lives, how contract
//! numbers look, which lifecycle policy applies and the default rates for
//! new categories.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VELORENT_DB_PATH=./rental.db                                       │
//! │     VELORENT_STRICT_TRANSITIONS=true                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/velorent/velorent.toml (Linux)                           │
//! │     ~/Library/Application Support/com.velorent.velorent/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./velorent.db, RENT/ prefix, lenient lifecycle                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./velorent.db"
//! max_connections = 5
//!
//! [contracts]
//! prefix = "RENT/"
//! padding = 5
//!
//! [lifecycle]
//! strict_transitions = false
//! reserve_on_confirm = false
//!
//! [pricing]
//! default_rate_unit = "daily"
//! hourly_rate_cents = 500
//! daily_rate_cents = 2500
//! weekly_rate_cents = 10000
//! monthly_rate_cents = 30000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use velorent_core::sequence::ContractSequence;
use velorent_core::validation::validate_rate_table;
use velorent_core::{LifecyclePolicy, Money, RateTable, RateUnit};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the SQLite file lives and how many connections to open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./velorent.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Contract Settings
// =============================================================================

/// Contract number format, `{prefix}{year}/{counter}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSettings {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Minimum digits of the counter.
    #[serde(default = "default_padding")]
    pub padding: usize,
}

fn default_prefix() -> String {
    "RENT/".to_string()
}

fn default_padding() -> usize {
    5
}

impl Default for ContractSettings {
    fn default() -> Self {
        ContractSettings {
            prefix: default_prefix(),
            padding: default_padding(),
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

/// Defaults applied to new categories and new reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default)]
    pub default_rate_unit: RateUnit,

    #[serde(default = "default_hourly")]
    pub hourly_rate_cents: i64,

    #[serde(default = "default_daily")]
    pub daily_rate_cents: i64,

    #[serde(default = "default_weekly")]
    pub weekly_rate_cents: i64,

    #[serde(default = "default_monthly")]
    pub monthly_rate_cents: i64,
}

fn default_hourly() -> i64 {
    RateTable::category_default().hourly_cents
}
fn default_daily() -> i64 {
    RateTable::category_default().daily_cents
}
fn default_weekly() -> i64 {
    RateTable::category_default().weekly_cents
}
fn default_monthly() -> i64 {
    RateTable::category_default().monthly_cents
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            default_rate_unit: RateUnit::default(),
            hourly_rate_cents: default_hourly(),
            daily_rate_cents: default_daily(),
            weekly_rate_cents: default_weekly(),
            monthly_rate_cents: default_monthly(),
        }
    }
}

impl PricingSettings {
    /// Rates given to a category created without explicit rates.
    pub fn category_rates(&self) -> RateTable {
        RateTable::new(
            Money::from_cents(self.hourly_rate_cents),
            Money::from_cents(self.daily_rate_cents),
            Money::from_cents(self.weekly_rate_cents),
            Money::from_cents(self.monthly_rate_cents),
        )
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete record layer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RentalConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub contracts: ContractSettings,

    #[serde(default)]
    pub lifecycle: LifecyclePolicy,

    #[serde(default)]
    pub pricing: PricingSettings,
}

impl RentalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (velorent.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading rental config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load rental config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        self.contract_sequence()
            .validate()
            .map_err(|e| DbError::Config(e.to_string()))?;

        validate_rate_table(&self.pricing.category_rates())
            .map_err(|e| DbError::Config(e.to_string()))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("VELORENT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("VELORENT_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid VELORENT_MAX_CONNECTIONS"),
            }
        }

        if let Ok(prefix) = std::env::var("VELORENT_CONTRACT_PREFIX") {
            self.contracts.prefix = prefix;
        }

        if let Ok(strict) = std::env::var("VELORENT_STRICT_TRANSITIONS") {
            match parse_flag(&strict) {
                Some(flag) => self.lifecycle.strict_transitions = flag,
                None => warn!(value = %strict, "Ignoring invalid VELORENT_STRICT_TRANSITIONS"),
            }
        }

        if let Ok(reserve) = std::env::var("VELORENT_RESERVE_ON_CONFIRM") {
            match parse_flag(&reserve) {
                Some(flag) => self.lifecycle.reserve_on_confirm = flag,
                None => warn!(value = %reserve, "Ignoring invalid VELORENT_RESERVE_ON_CONFIRM"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "velorent", "velorent")
            .map(|dirs| dirs.config_dir().join("velorent.toml"))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    /// Contract number format.
    pub fn contract_sequence(&self) -> ContractSequence {
        ContractSequence {
            prefix: self.contracts.prefix.clone(),
            padding: self.contracts.padding,
        }
    }

    /// Lifecycle policy for reservation transitions.
    pub fn policy(&self) -> LifecyclePolicy {
        self.lifecycle
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RentalConfig::default();
        assert_eq!(config.contracts.prefix, "RENT/");
        assert_eq!(config.contracts.padding, 5);
        assert!(!config.lifecycle.strict_transitions);
        assert!(!config.lifecycle.reserve_on_confirm);
        assert_eq!(config.pricing.default_rate_unit, RateUnit::Daily);
        assert_eq!(config.pricing.category_rates(), RateTable::category_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RentalConfig::from_toml(
            r#"
            [contracts]
            prefix = "LOC/"

            [lifecycle]
            strict_transitions = true

            [pricing]
            default_rate_unit = "hourly"
            daily_rate_cents = 3000
            "#,
        )
        .unwrap();

        assert_eq!(config.contracts.prefix, "LOC/");
        assert_eq!(config.contracts.padding, 5);
        assert!(config.lifecycle.strict_transitions);
        assert!(!config.lifecycle.reserve_on_confirm);
        assert_eq!(config.pricing.default_rate_unit, RateUnit::Hourly);
        assert_eq!(config.pricing.daily_rate_cents, 3000);
        assert_eq!(config.pricing.hourly_rate_cents, 500);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RentalConfig::default();
        config.contracts.prefix = String::new();
        assert!(config.validate().is_err());

        let mut config = RentalConfig::default();
        config.pricing.weekly_rate_cents = -1;
        assert!(config.validate().is_err());

        let mut config = RentalConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = RentalConfig::from_toml("[contracts]\npadding = \"five\"").unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_conversions() {
        let config = RentalConfig::default();
        assert_eq!(config.db_config().max_connections, 5);
        assert_eq!(config.contract_sequence(), ContractSequence::default());
        assert_eq!(config.policy(), LifecyclePolicy::default());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_toml_serialization() {
        let config = RentalConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[lifecycle]"));
    }
}
