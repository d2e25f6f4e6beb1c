//! # RC Test Utilities
//!
//! Shared test utilities for the Room Controller (RC) service.
//!
//! This crate provides mock implementations and assertion helpers for
//! isolated RC testing without requiring real infrastructure.
//!
//! ## Modules
//!
//! - `memory_store` - In-memory session store for audit-trail assertions
//! - `event_sink` - Receiver wrapper for asserting on delivered events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     // Create a store that keeps every audit record in memory
//!     let store = MemorySessionStore::new();
//!     let (recorder, task) = SessionRecorder::spawn(store.clone(), token);
//!
//!     // Create a connection whose delivered events can be asserted on
//!     let (connection, mut sink) = connected_sink();
//!     registry.join(room_id, participant_id, connection, None).await?;
//!
//!     let event = sink.expect_kind("participant-joined").await;
//!
//!     // ... shut down, then inspect the audit trail
//!     assert_eq!(store.session_start_count(), 1);
//! }
//! ```
//!
//! ## Failure Injection
//!
//! ```rust,ignore
//! // Persistence failures must never surface to callers
//! let store = MemorySessionStore::new().with_failure("disk full");
//! ```

pub mod event_sink;
pub mod memory_store;

// Re-export commonly used items
pub use event_sink::*;
pub use memory_store::*;
