//! Room Controller (RC) Service Library
//!
//! This library provides the core functionality for the Switchboard
//! Room Controller - a stateful WebSocket signaling server responsible for:
//!
//! - Room lifecycle and participant state management (capacity 10 per room)
//! - Validated relay of offer/answer/ICE signaling between room members
//! - Exclusive screen-share arbitration per room
//! - Fire-and-forget session audit recording
//! - Graceful shutdown with connection draining
//!
//! # Architecture
//!
//! The RC uses an actor model hierarchy:
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
//! - **One socket per participant**: each WebSocket session is one participant
//!   in exactly one room; participant ids are unique across all rooms
//! - **Per-room serialization**: each room actor owns its roster and arbiter,
//!   so ordering inside a room needs no locks and rooms never block each other
//! - **Registry-owned indexes**: membership and transport lookups go through
//!   the singleton registry, which keeps counts exact and cleanup O(1)
//! - **Fire-and-forget audit**: session records are queued to a recorder actor
//!   and never sit on the signaling path
//!
//! # Modules
//!
//! - [`actors`] - Actor model implementation (registry and room actors)
//! - [`arbiter`] - Exclusive screen-share lock per room
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with stable wire codes
//! - [`observability`] - Health probes and Prometheus metrics
//! - [`recorder`] - Session audit recorder actor and store trait
//! - [`rooms`] - Room and participant state
//! - [`transport`] - Outbound event delivery handles
//! - [`ws`] - WebSocket endpoint and session loop

pub mod actors;
pub mod arbiter;
pub mod config;
pub mod errors;
pub mod observability;
pub mod recorder;
pub mod rooms;
pub mod transport;
pub mod ws;
