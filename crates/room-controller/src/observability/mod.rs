//! Observability module for the Room Controller service.
//!
//! Implements health probes and Prometheus metrics for the signaling core.
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field allow-listing.
//! Metric labels are bounded to prevent cardinality explosion:
//! - `actor_type`: 3 values (registry, room, connection)
//! - `outcome`: bounded by join result codes (~6 values)
//! - `kind`: bounded by signal command kinds (~6 values)
//! - `code`: bounded by rejection codes (~10 values)
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `rc_rooms_active` | Gauge | none | Current live rooms |
//! | `rc_connections_active` | Gauge | none | Current registered transports |
//! | `rc_joins_total` | Counter | `outcome` | Join attempts by outcome |
//! | `rc_signals_relayed_total` | Counter | `kind` | Signals delivered to peers |
//! | `rc_signals_rejected_total` | Counter | `code` | Signals refused with an error code |
//! | `rc_screen_share_grants_total` | Counter | none | Fresh screen-share grants |
//! | `rc_messages_dropped_total` | Counter | `actor_type` | Events dropped on full mailboxes |
//! | `rc_actor_panics_total` | Counter | `actor_type` | Actor task panics |
//! | `rc_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator per actor type |

pub mod health;
pub mod metrics;

// Re-exports for convenience
pub use health::{health_router, HealthState};
pub use metrics::{
    init_metrics_recorder, record_actor_panic, record_event_dropped, record_join,
    record_share_grant, record_signal_rejected, record_signal_relayed, set_actor_mailbox_depth,
    set_connections_active, set_rooms_active,
};
