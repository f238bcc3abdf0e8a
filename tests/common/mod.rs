//! Shared test infrastructure for cadence-core integration tests.
//!
//! Provides an in-memory engine harness plus data builders so tests can
//! assemble sequences, contacts, and enrollments without a database.

pub mod builders;
pub mod strategies;

pub use builders::*;
