use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_QUOTE_VALIDITY_DAYS: i64 = 7;
const DEFAULT_ON_SITE_FEE: &str = "50.00";
const DEFAULT_TICKET_PREFIX: &str = "WO";
const DEFAULT_QUOTE_PREFIX: &str = "QT";

/// Business policy knobs of the repair lifecycle.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RepairPolicy {
    /// How long a quote stays approvable, in days
    #[serde(default = "default_quote_validity_days")]
    #[validate(range(min = 1, max = 90))]
    pub quote_validity_days: i64,

    /// Flat fee charged for on-site visits
    #[serde(default = "default_on_site_fee")]
    #[validate(custom = "validate_fee")]
    pub on_site_fee: Decimal,

    /// When set, bookings must be approved before they can be converted
    #[serde(default)]
    pub require_booking_approval: bool,

    /// Prefix of work order ticket numbers
    #[serde(default = "default_ticket_prefix")]
    #[validate(length(min = 1, max = 8))]
    pub ticket_prefix: String,

    /// Prefix of quote numbers
    #[serde(default = "default_quote_prefix")]
    #[validate(length(min = 1, max = 8))]
    pub quote_prefix: String,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            quote_validity_days: DEFAULT_QUOTE_VALIDITY_DAYS,
            on_site_fee: default_on_site_fee(),
            require_booking_approval: false,
            ticket_prefix: default_ticket_prefix(),
            quote_prefix: default_quote_prefix(),
        }
    }
}

impl RepairPolicy {
    pub fn quote_validity(&self) -> Duration {
        Duration::days(self.quote_validity_days)
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Repair lifecycle policy
    #[serde(default)]
    #[validate]
    pub repair: RepairPolicy,
}

impl AppConfig {
    /// Builds a configuration with defaults for everything but the essentials.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            repair: RepairPolicy::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_quote_validity_days() -> i64 {
    DEFAULT_QUOTE_VALIDITY_DAYS
}

fn default_on_site_fee() -> Decimal {
    DEFAULT_ON_SITE_FEE.parse().unwrap_or(Decimal::ZERO)
}

fn default_ticket_prefix() -> String {
    DEFAULT_TICKET_PREFIX.to_string()
}

fn default_quote_prefix() -> String {
    DEFAULT_QUOTE_PREFIX.to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_fee(fee: &Decimal) -> Result<(), ValidationError> {
    if *fee < Decimal::ZERO {
        let mut err = ValidationError::new("on_site_fee");
        err.message = Some("on_site_fee cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("repairdesk_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same as [`load_config`] with an explicit config directory and profile.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://repairdesk.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    fn config_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn defaults_apply_without_files() {
        let dir = config_dir(&[]);
        let config = load_config_from(dir.path(), "test").unwrap();

        assert_eq!(config.environment, "test");
        assert_eq!(config.repair.quote_validity_days, 7);
        assert_eq!(config.repair.on_site_fee, dec!(50));
        assert!(!config.repair.require_booking_approval);
        assert_eq!(config.repair.ticket_prefix, "WO");
        assert_eq!(config.repair.quote_validity(), Duration::days(7));
    }

    #[test]
    fn profile_file_overrides_default_file() {
        let dir = config_dir(&[
            (
                "default.toml",
                r#"
                database_url = "sqlite::memory:"
                port = 9000

                [repair]
                quote_validity_days = 14
                "#,
            ),
            (
                "staging.toml",
                r#"
                port = 9100

                [repair]
                require_booking_approval = true
                on_site_fee = 75.5
                "#,
            ),
        ]);

        let config = load_config_from(dir.path(), "staging").unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.port, 9100);
        assert_eq!(config.repair.quote_validity_days, 14);
        assert!(config.repair.require_booking_approval);
        assert_eq!(config.repair.on_site_fee, dec!(75.5));
    }

    #[test]
    fn out_of_range_policy_is_rejected() {
        let dir = config_dir(&[(
            "default.toml",
            r#"
            [repair]
            quote_validity_days = 0
            "#,
        )]);

        let result = load_config_from(dir.path(), "test");
        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "development".into(),
        );
        assert!(config.validate().is_ok());
        config.log_level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_on_site_fee_is_rejected() {
        let policy = RepairPolicy {
            on_site_fee: dec!(-1),
            ..RepairPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn zero_event_channel_capacity_is_rejected() {
        let mut config = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "development".into(),
        );
        config.event_channel_capacity = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("event_channel_capacity"));
    }
}
