//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAIXA_DB_PATH=/var/lib/caixa/ledger.db                             │
//! │     CAIXA_MAX_INSTALLMENTS=12                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/caixa-ledger/ledger.toml (Linux)                         │
//! │     ~/Library/Application Support/com.caixa.ledger/ledger.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ledger.toml
//! [database]
//! path = "/var/lib/caixa/ledger.db"
//! max_connections = 5
//!
//! [sales]
//! max_installments = 12
//! first_due_offset_months = 1
//! record_cash_sales = true
//!
//! [currency]
//! code = "BRL"
//! symbol = "R$"
//! decimals = 2
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use caixa_core::MAX_INSTALLMENTS;
use caixa_db::pool::IN_MEMORY_PATH;
use caixa_db::DbConfig;

use crate::error::ConfigError;

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "ledger.toml";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:` for an ephemeral database.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "caixa", "ledger")
        .map(|dirs| dirs.data_dir().join("ledger.db"))
        .unwrap_or_else(|| PathBuf::from("./caixa_ledger.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    /// Builds the pool configuration for these settings.
    pub fn to_db_config(&self) -> DbConfig {
        if self.path.as_os_str() == IN_MEMORY_PATH {
            return DbConfig::in_memory();
        }
        DbConfig::new(self.path.clone()).max_connections(self.max_connections)
    }
}

// =============================================================================
// Sales Settings
// =============================================================================

/// Rules applied by the sale commit engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Store-level cap on installments per credit sale, at most 60.
    #[serde(default = "default_max_installments")]
    pub max_installments: u32,

    /// Months between the sale date and the first due date, when the
    /// caller does not pick one. Zero makes the first installment due on
    /// the sale date.
    #[serde(default = "default_first_due_offset")]
    pub first_due_offset_months: u32,

    /// Write a `sale_cash` ledger entry for cash and pix sales.
    #[serde(default = "default_record_cash_sales")]
    pub record_cash_sales: bool,
}

fn default_max_installments() -> u32 {
    MAX_INSTALLMENTS
}

fn default_first_due_offset() -> u32 {
    1
}

fn default_record_cash_sales() -> bool {
    true
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            max_installments: default_max_installments(),
            first_due_offset_months: default_first_due_offset(),
            record_cash_sales: default_record_cash_sales(),
        }
    }
}

// =============================================================================
// Currency Settings
// =============================================================================

/// Presentation of amounts. Storage is always integer cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// ISO 4217 code.
    #[serde(default = "default_currency_code")]
    pub code: String,

    #[serde(default = "default_currency_symbol")]
    pub symbol: String,

    #[serde(default = "default_currency_decimals")]
    pub decimals: u8,
}

fn default_currency_code() -> String {
    "BRL".to_string()
}

fn default_currency_symbol() -> String {
    "R$".to_string()
}

fn default_currency_decimals() -> u8 {
    2
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: default_currency_code(),
            symbol: default_currency_symbol(),
            decimals: default_currency_decimals(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub currency: CurrencySettings,
}

impl LedgerConfig {
    /// Configuration for tests and throwaway runs: in-memory database,
    /// defaults everywhere else.
    pub fn in_memory() -> Self {
        LedgerConfig {
            database: DatabaseSettings {
                path: PathBuf::from(IN_MEMORY_PATH),
                max_connections: 1,
            },
            ..Self::default()
        }
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`ledger.toml`), when it exists
    /// 3. `CAIXA_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Reads a TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(?path, "Loading ledger config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.sales.max_installments == 0 || self.sales.max_installments > MAX_INSTALLMENTS {
            return Err(ConfigError::Invalid(format!(
                "sales.max_installments must be between 1 and {}, got {}",
                MAX_INSTALLMENTS, self.sales.max_installments
            )));
        }

        if self.sales.first_due_offset_months > 12 {
            return Err(ConfigError::Invalid(format!(
                "sales.first_due_offset_months must be at most 12, got {}",
                self.sales.first_due_offset_months
            )));
        }

        if self.currency.code.len() != 3 || !self.currency.code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid(format!(
                "currency.code must be a 3-letter ISO 4217 code, got '{}'",
                self.currency.code
            )));
        }

        if self.currency.decimals > 4 {
            return Err(ConfigError::Invalid("currency.decimals must be at most 4".into()));
        }

        Ok(())
    }

    /// Applies `CAIXA_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("CAIXA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("CAIXA_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid CAIXA_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(max) = var("CAIXA_MAX_INSTALLMENTS") {
            match max.parse::<u32>() {
                Ok(n) => self.sales.max_installments = n,
                Err(_) => warn!(value = %max, "Ignoring invalid CAIXA_MAX_INSTALLMENTS"),
            }
        }

        if let Some(offset) = var("CAIXA_FIRST_DUE_OFFSET_MONTHS") {
            match offset.parse::<u32>() {
                Ok(n) => self.sales.first_due_offset_months = n,
                Err(_) => warn!(value = %offset, "Ignoring invalid CAIXA_FIRST_DUE_OFFSET_MONTHS"),
            }
        }

        if let Some(flag) = var("CAIXA_RECORD_CASH_SALES") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sales.record_cash_sales = true,
                "0" | "false" | "no" => self.sales.record_cash_sales = false,
                _ => warn!(value = %flag, "Ignoring invalid CAIXA_RECORD_CASH_SALES"),
            }
        }

        if let Some(code) = var("CAIXA_CURRENCY_CODE") {
            self.currency.code = code;
        }

        if let Some(symbol) = var("CAIXA_CURRENCY_SYMBOL") {
            self.currency.symbol = symbol;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "caixa", "ledger")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Formats a cent amount as a currency string.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_ledger::config::LedgerConfig;
    ///
    /// let config = LedgerConfig::default();
    /// assert_eq!(config.format_currency(123_456), "R$ 1234.56");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let decimals = self.currency.decimals as u32;
        let divisor = 10_i64.pow(decimals);
        let whole = (cents / divisor).abs();
        let frac = (cents % divisor).abs();
        let sign = if cents < 0 { "-" } else { "" };

        if decimals == 0 {
            format!("{}{} {}", sign, self.currency.symbol, whole)
        } else {
            format!(
                "{}{} {}.{:0width$}",
                sign,
                self.currency.symbol,
                whole,
                frac,
                width = decimals as usize
            )
        }
    }
}
