//! # Database Operations
//!
//! Connection management and schema migrations for the engine's PostgreSQL
//! persistence.
//!
//! ## Key Components
//!
//! - [`connection`] - Connection management and pooling
//! - [`migrations`] - Additive schema migrations with advisory-lock
//!   concurrency control
//!
//! The queries themselves live in [`crate::store::PgStore`]; this module only
//! owns getting connected and keeping the schema current.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::config::EngineConfig;
//! use cadence_core::database::{DatabaseConnection, DatabaseMigrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let db = DatabaseConnection::from_config(&config).await?;
//! DatabaseMigrations::run_all(db.pool()).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::{DatabaseMigrations, Migration};
