//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging advancement runs and
//! step execution inside a host CRM process.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// The filter comes from `CADENCE_LOG`, falling back to `RUST_LOG`, falling
/// back to the level implied by the environment. Setting
/// `CADENCE_LOG_FORMAT=json` switches the console layer to JSON output for
/// log aggregation.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let default_level = get_log_level(&environment);

        let filter = EnvFilter::try_from_env("CADENCE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let json_output = std::env::var("CADENCE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json_output {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(filter),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_filter(filter),
                )
                .try_init()
        };

        // A host application may have installed its own subscriber already.
        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized, keeping existing one");
        }

        tracing::info!(
            environment = %environment,
            json_output = json_output,
            "structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CADENCE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get default log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
