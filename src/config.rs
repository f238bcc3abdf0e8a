use crate::constants::system;
use crate::error::{CadenceError, Result};

/// Runtime configuration for the sequence engine.
///
/// Values come from `Default`, optionally overridden by `CADENCE_*`
/// environment variables through [`EngineConfig::from_env`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_pool_size: u32,
    /// Maximum enrollments claimed per advancement run
    pub batch_size: i64,
    /// Claim lease duration in seconds
    pub claim_timeout_seconds: i64,
    /// Fallback sending window for sequences with invalid hours
    pub default_sending_hours_start: u32,
    pub default_sending_hours_end: u32,
    /// Currency code used when a deal carries none
    pub default_currency: String,
    /// Broadcast channel capacity for the event publisher
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/cadence_development".to_string(),
            max_pool_size: 10,
            batch_size: system::DEFAULT_BATCH_SIZE,
            claim_timeout_seconds: system::DEFAULT_CLAIM_TIMEOUT_SECONDS,
            default_sending_hours_start: system::DEFAULT_SENDING_HOURS_START,
            default_sending_hours_end: system::DEFAULT_SENDING_HOURS_END,
            default_currency: system::DEFAULT_CURRENCY.to_string(),
            event_capacity: system::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("CADENCE_DATABASE_URL") {
            config.database_url = db_url;
        } else if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(pool_size) = std::env::var("CADENCE_MAX_POOL_SIZE") {
            config.max_pool_size = pool_size.parse().map_err(|e| {
                CadenceError::ConfigurationError(format!("Invalid max_pool_size: {e}"))
            })?;
        }

        if let Ok(batch_size) = std::env::var("CADENCE_BATCH_SIZE") {
            config.batch_size = batch_size.parse().map_err(|e| {
                CadenceError::ConfigurationError(format!("Invalid batch_size: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("CADENCE_CLAIM_TIMEOUT_SECONDS") {
            config.claim_timeout_seconds = timeout.parse().map_err(|e| {
                CadenceError::ConfigurationError(format!("Invalid claim_timeout_seconds: {e}"))
            })?;
        }

        if let Ok(start) = std::env::var("CADENCE_SENDING_HOURS_START") {
            config.default_sending_hours_start = start.parse().map_err(|e| {
                CadenceError::ConfigurationError(format!("Invalid sending_hours_start: {e}"))
            })?;
        }

        if let Ok(end) = std::env::var("CADENCE_SENDING_HOURS_END") {
            config.default_sending_hours_end = end.parse().map_err(|e| {
                CadenceError::ConfigurationError(format!("Invalid sending_hours_end: {e}"))
            })?;
        }

        if let Ok(currency) = std::env::var("CADENCE_DEFAULT_CURRENCY") {
            config.default_currency = currency;
        }

        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: small batches, short leases
    pub fn for_testing() -> Self {
        Self {
            database_url: "postgresql://localhost/cadence_test".to_string(),
            batch_size: 10,
            claim_timeout_seconds: 30,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size <= 0 {
            return Err(CadenceError::ConfigurationError(format!(
                "batch_size must be positive, got {}",
                self.batch_size
            )));
        }
        if self.claim_timeout_seconds <= 0 {
            return Err(CadenceError::ConfigurationError(format!(
                "claim_timeout_seconds must be positive, got {}",
                self.claim_timeout_seconds
            )));
        }
        if self.default_sending_hours_start > 23 || self.default_sending_hours_end > 23 {
            return Err(CadenceError::ConfigurationError(format!(
                "sending hours must be within 0-23, got {}-{}",
                self.default_sending_hours_start, self.default_sending_hours_end
            )));
        }
        if self.default_sending_hours_start >= self.default_sending_hours_end {
            return Err(CadenceError::ConfigurationError(format!(
                "sending window start {} must precede end {}",
                self.default_sending_hours_start, self.default_sending_hours_end
            )));
        }
        Ok(())
    }
}
