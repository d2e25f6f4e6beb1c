//! Metrics definitions for the Room Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Room Controller
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `actor_type`: 3 values max (registry, room, connection)
//! - `outcome`: "accepted" plus the join error codes (~6 values)
//! - `kind`: bounded by signal command kinds (~6 values)
//! - `code`: bounded by rejection codes (~10 values)
//!
//! Participant and room identifiers never appear as labels.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns an error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Connection Metrics (Gauges)
// ============================================================================

/// Set the number of live rooms.
///
/// Metric: `rc_rooms_active`
/// Labels: none
///
/// Updated by the registry whenever a room is created or removed.
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_rooms_active").set(count as f64);
}

/// Set the number of registered transports.
///
/// Metric: `rc_connections_active`
/// Labels: none
///
/// Updated by the registry whenever a transport joins or is removed.
pub fn set_connections_active(count: usize) {
    // usize to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_connections_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `rc_actor_mailbox_depth`
/// Labels: `actor_type` (registry, room)
///
/// Used for backpressure monitoring. High values indicate the actor is
/// falling behind in message processing.
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Join & Signal Metrics (Counters)
// ============================================================================

/// Record a join attempt by outcome.
///
/// Metric: `rc_joins_total`
/// Labels: `outcome` ("accepted" or an error code such as "room-full")
///
/// Cardinality: ~6 (bounded by the join result codes)
pub fn record_join(outcome: &str) {
    counter!("rc_joins_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a signal delivered to its destination.
///
/// Metric: `rc_signals_relayed_total`
/// Labels: `kind` (offer, answer, ice-candidate, toggle-mute, ...)
///
/// Cardinality: ~6 (bounded by the command kinds)
pub fn record_signal_relayed(kind: &str) {
    counter!("rc_signals_relayed_total", "kind" => kind.to_string()).increment(1);
}

/// Record a signal refused with an error code.
///
/// Metric: `rc_signals_rejected_total`
/// Labels: `code` (sender-mismatch, not-a-member, ...)
///
/// Cardinality: ~10 (bounded by the rejection codes)
///
/// A sustained rate here points at a misbehaving or malicious client.
pub fn record_signal_rejected(code: &str) {
    counter!("rc_signals_rejected_total", "code" => code.to_string()).increment(1);
}

/// Record a fresh screen-share grant.
///
/// Metric: `rc_screen_share_grants_total`
/// Labels: none
///
/// Re-grants to the current holder are not counted.
pub fn record_share_grant() {
    counter!("rc_screen_share_grants_total").increment(1);
}

// ============================================================================
// Additional Operational Metrics
// ============================================================================

/// Record an actor panic event.
///
/// Metric: `rc_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &str) {
    counter!("rc_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record an event dropped because a mailbox or outbound queue was full.
///
/// Metric: `rc_messages_dropped_total`
/// Labels: `actor_type` (room, connection)
///
/// Non-zero values indicate the system is overloaded or a client has
/// stopped reading its socket.
pub fn record_event_dropped(actor_type: &str) {
    counter!("rc_messages_dropped_total", "actor_type" => actor_type.to_string()).increment(1);
}
