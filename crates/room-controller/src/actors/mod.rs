//! Actor model implementation for the Room Controller.
//!
//! This module implements the two-level actor hierarchy:
//!
//! ```text
//! RoomRegistryActor (singleton per RC instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per live room)
//!         ├── owns the roster and the screen-share arbiter
//!         └── relays signals between member connections
//! ```
//!
//! # Key Design Decisions
//!
//! - **One mailbox per room**: signaling within a room is serialized while
//!   independent rooms make progress concurrently
//! - **Registry owns the indexes**: participant-to-room uniqueness and
//!   transport-to-connection lookup live in the registry, so membership
//!   changes go through one actor and counts stay exact
//! - **CancellationToken propagation**: the registry hands each room a child
//!   token for graceful shutdown
//! - **Mailbox monitoring**: depth thresholds with metrics (Registry/Room: 100/500)
//!
//! # Modules
//!
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and registry metrics
//! - [`registry`] - `RoomRegistryActor` singleton that supervises rooms
//! - [`room`] - `RoomActor` per live room, owns roster and arbiter

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

// Re-export primary types
pub use messages::*;
pub use metrics::{ActorType, MailboxLevel, MailboxMonitor, MetricsSnapshot, RegistryMetrics};
pub use registry::{RoomRegistryActor, RoomRegistryHandle};
pub use room::{RoomActor, RoomActorHandle};
