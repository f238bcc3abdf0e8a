#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Cadence Core
//!
//! Rust execution core for CRM outreach sequences.
//!
//! ## Overview
//!
//! Cadence Core is the engine behind a host CRM's sequence automation: it
//! schedules steps inside sending windows, advances due enrollments in
//! claimed batches, stages the resulting emails and tasks as pending
//! activities for the host's delivery pipeline, and applies engagement-driven
//! exit policies. The host owns contacts, deals, and delivery; this crate
//! owns when and what.
//!
//! ## Architecture
//!
//! The engine is embedded, not a service. A host process constructs a
//! [`engine::SequenceEngine`] over the storage ports in [`store`] and drives
//! it from its own scheduler tick. Multiple processes can share one database:
//! due enrollments are claimed under a lease via `FOR UPDATE SKIP LOCKED`, so
//! no two runners ever advance the same enrollment.
//!
//! ## Key Guarantees
//!
//! - **Idempotent execution**: An append-only completion log with one row
//!   per (enrollment, step) makes re-running a claimed batch safe
//! - **Windowed scheduling**: Sends clamp into each sequence's sending hours
//!   and skip weekends unless allowed
//! - **Per-item isolation**: One broken enrollment never stalls the batch;
//!   failures release their claim and retry on the next run
//! - **Consistent counters**: `active_enrolled` tracks the number of active
//!   enrollments exactly, clamped at zero
//!
//! ## Module Organization
//!
//! - [`engine`] - Scheduler, executor, advancement loop, exit evaluation
//! - [`models`] - Sequences, steps, enrollments, activities, templates
//! - [`store`] - Storage ports plus PostgreSQL and in-memory implementations
//! - [`state_machine`] - Enrollment lifecycle transitions
//! - [`database`] - Connection management and migrations
//! - [`events`] - Broadcast lifecycle events for host subscribers
//! - [`config`] - Environment-driven engine configuration
//! - [`error`] - Top-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadence_core::config::EngineConfig;
//! use cadence_core::database::DatabaseConnection;
//! use cadence_core::engine::SequenceEngine;
//! use cadence_core::store::PgStore;
//! use std::sync::Arc;
//!
//! # struct HostCrmDirectory;
//! # #[async_trait::async_trait]
//! # impl cadence_core::store::CrmDirectory for HostCrmDirectory {
//! #     async fn contact_by_id(&self, _: i64) -> Result<Option<cadence_core::models::Contact>, cadence_core::store::StoreError> { Ok(None) }
//! #     async fn client_by_id(&self, _: i64) -> Result<Option<cadence_core::models::Client>, cadence_core::store::StoreError> { Ok(None) }
//! #     async fn deal_by_id(&self, _: i64) -> Result<Option<cadence_core::models::Deal>, cadence_core::store::StoreError> { Ok(None) }
//! #     async fn user_by_id(&self, _: i64) -> Result<Option<cadence_core::models::User>, cadence_core::store::StoreError> { Ok(None) }
//! # }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let db = DatabaseConnection::from_config(&config).await?;
//! let store = Arc::new(PgStore::new(db.pool().clone()));
//! let crm = Arc::new(HostCrmDirectory);
//!
//! let engine = SequenceEngine::new(
//!     store.clone(),
//!     store.clone(),
//!     crm,
//!     store.clone(),
//!     store,
//!     &config,
//! );
//!
//! // One advancement pass; hosts call this from a periodic tick.
//! let report = engine.run_once().await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod state_machine;
pub mod store;

pub use config::EngineConfig;
pub use engine::{
    AdvancementReport, EngineError, EnrollmentDisposition, EnrollmentRequest, SequenceEngine,
    StepOutcome,
};
pub use error::{CadenceError, Result};
// Re-export constants events with different name to avoid conflict
pub use constants::events as system_events;
pub use state_machine::{EngagementEvent, EnrollmentStatus, ExitEvent};
pub use store::{InMemoryStore, PgStore};
