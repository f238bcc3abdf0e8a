//! # Lifecycle Events
//!
//! In-process broadcast of enrollment lifecycle and engagement events. The
//! host application subscribes to drive notifications, webhooks, or analytics;
//! the engine publishes fire-and-forget and never blocks on listeners.
//!
//! Event names are the dotted constants in [`crate::constants::events`].
//!
//! ```rust
//! use cadence_core::events::EventPublisher;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::default();
//! let mut events = publisher.subscribe();
//!
//! publisher
//!     .publish("enrollment.created", json!({"enrollment_id": 42}))
//!     .await
//!     .unwrap();
//!
//! let event = events.recv().await.unwrap();
//! assert_eq!(event.enrollment_id(), Some(42));
//! # });
//! ```

pub mod publisher;

pub use publisher::{CadenceEvent, EventPublisher, PublishError};
